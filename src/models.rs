use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::{role::Role, user::UserProfile};

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "rahim@example.com")]
    pub email: String,
    #[schema(example = "changeme")]
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub exp: usize,
    pub jti: String,
}
