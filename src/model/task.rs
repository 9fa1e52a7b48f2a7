use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::timestamp;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Task {
    #[schema(example = "7f0c1c9e-3a43-4f7e-9d1c-6a4f0c2b9a11")]
    pub id: String,
    pub project_id: String,
    #[schema(example = "Wire up the finance page")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub assigned_to: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "date", example = "2026-01-31")]
    pub due_date: Option<NaiveDate>,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// Create payload, stored as-is. `status` always starts at `todo`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewTask {
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub assigned_to: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "date")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_deserializing)]
    pub status: TaskStatus,
}

/// Fields an update may touch. Unknown keys are rejected.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date")]
    pub due_date: Option<NaiveDate>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.assigned_to.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }
}
