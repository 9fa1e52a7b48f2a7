use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrainingCourse {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub homework_tasks: Vec<String>,
    /// Kudos granted on first homework submission.
    #[serde(default)]
    pub kudos_reward: u32,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewTrainingCourse {
    #[schema(example = "Rust for backend devs")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    /// Attachment URLs.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub homework_tasks: Vec<String>,
    #[serde(default)]
    #[schema(example = 20)]
    pub kudos_reward: u32,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CoursePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homework_tasks: Option<Vec<String>>,
    /// Applies to completions from now on; past awards stay as granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kudos_reward: Option<u32>,
}

impl CoursePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.instructor.is_none()
            && self.video_url.is_none()
            && self.files.is_none()
            && self.homework_tasks.is_none()
            && self.kudos_reward.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrainingProgress {
    pub id: String,
    pub course_id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub homework_submitted: bool,
    #[serde(default)]
    pub homework_url: Option<String>,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct NewTrainingProgress<'a> {
    pub course_id: &'a str,
    pub user_id: &'a str,
    pub user_name: &'a str,
    pub progress: u8,
    pub completed: bool,
    pub homework_submitted: bool,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TrainingProgressUpdate {
    #[schema(maximum = 100, example = 80)]
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homework_submitted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homework_url: Option<String>,
    /// Set server-side on first homework submission.
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}
