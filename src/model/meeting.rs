use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::timestamp;

fn default_meeting_type() -> String {
    "team".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Meeting {
    pub id: String,
    #[schema(example = "Sprint review")]
    pub title: String,
    pub agenda: String,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = "date-time")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = "date-time")]
    pub end_time: DateTime<Utc>,
    pub organizer: String,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default = "default_meeting_type")]
    pub meeting_type: String,
    #[serde(default)]
    pub attendance_tracked: bool,
    #[serde(default)]
    pub penalties_applied: bool,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl Meeting {
    pub fn involves(&self, user_id: &str) -> bool {
        self.organizer == user_id || self.attendees.iter().any(|a| a == user_id)
    }
}

/// Meeting to schedule; the organizer is the caller.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewMeeting {
    pub title: String,
    pub agenda: String,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = "date-time", example = "2026-02-01T10:00:00Z")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = "date-time", example = "2026-02-01T11:00:00Z")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default = "default_meeting_type")]
    pub meeting_type: String,
    #[serde(skip_deserializing)]
    pub organizer: String,
    #[serde(skip_deserializing)]
    pub attendance_tracked: bool,
    #[serde(skip_deserializing)]
    pub penalties_applied: bool,
}

/// Reschedule or edit a meeting. Organizer and tracking flags stay as they are.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MeetingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agenda: Option<String>,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_type: Option<String>,
}

impl MeetingPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.agenda.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.attendees.is_none()
            && self.meeting_type.is_none()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceMark {
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MeetingAttendance {
    pub id: String,
    pub meeting_id: String,
    pub user_id: String,
    pub user_name: String,
    pub status: AttendanceMark,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct NewMeetingAttendance<'a> {
    pub meeting_id: &'a str,
    pub user_id: &'a str,
    pub user_name: &'a str,
    pub status: AttendanceMark,
}
