use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::timestamp;

fn default_status() -> String {
    "todo".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: String,
    #[schema(example = "Website revamp")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    #[schema(example = "web")]
    pub kind: String,
    /// User ids; not checked against the users collection.
    #[serde(default)]
    pub assigned_members: Vec<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "date")]
    pub deadline: Option<NaiveDate>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub assigned_members: Vec<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "date")]
    pub deadline: Option<NaiveDate>,
    #[serde(skip_deserializing, default = "default_status")]
    pub status: String,
    #[serde(skip_deserializing)]
    pub progress: u8,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_members: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date")]
    pub deadline: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(maximum = 100)]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.kind.is_none()
            && self.assigned_members.is_none()
            && self.deadline.is_none()
            && self.status.is_none()
            && self.progress.is_none()
            && self.files.is_none()
    }
}
