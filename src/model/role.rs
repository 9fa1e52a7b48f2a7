use derive_more::Display;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Access level carried in the token. Derived from the user's job title.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[display(fmt = "admin")]
    Admin,
    #[display(fmt = "member")]
    Member,
}

impl Role {
    pub fn from_title(title: &str) -> Self {
        if title.trim().eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::Member
        }
    }
}
