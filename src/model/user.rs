use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::timestamp;

/// Stored user, including the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub email: String,
    /// Job title, e.g. "Admin" or "Tech".
    pub role: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub skillset: Vec<String>,
    pub password_hash: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// User as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: String,
    #[schema(example = "rahim")]
    pub username: String,
    #[schema(example = "Rahim Uddin")]
    pub name: String,
    #[schema(example = "rahim@example.com")]
    pub email: String,
    #[schema(example = "Tech")]
    pub role: String,
    pub contact: Option<String>,
    pub skillset: Vec<String>,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            name: user.name,
            email: user.email,
            role: user.role,
            contact: user.contact,
            skillset: user.skillset,
            created_at: user.created_at,
        }
    }
}

/// Insert shape for the users collection.
#[derive(Debug, Serialize)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub contact: Option<String>,
    pub skillset: Vec<String>,
    pub password_hash: String,
}

/// Profile update. The password hash is not reachable from here.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "rahim@example.com")]
    pub email: Option<String>,
    /// Job title; only admins may change it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skillset: Option<Vec<String>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.name.is_none()
            && self.email.is_none()
            && self.role.is_none()
            && self.contact.is_none()
            && self.skillset.is_none()
    }

    /// Trims the text fields and lowercases the email, the unique key.
    pub fn normalized(mut self) -> Self {
        let trim = |field: &mut Option<String>| {
            if let Some(value) = field.as_mut() {
                *value = value.trim().to_string();
            }
        };
        trim(&mut self.username);
        trim(&mut self.name);
        trim(&mut self.role);
        self.email = self.email.map(|email| email.trim().to_lowercase());
        self
    }
}
