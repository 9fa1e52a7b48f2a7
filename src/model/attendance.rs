use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::timestamp;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
    Leave,
}

/// One row per user per day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    #[schema(value_type = String, format = "date", example = "2026-01-05")]
    pub date: NaiveDate,
    #[serde(default, with = "timestamp::option")]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_hours: Option<f64>,
    pub status: AttendanceStatus,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct NewAttendanceRecord<'a> {
    pub user_id: &'a str,
    pub user_name: &'a str,
    pub date: NaiveDate,
    #[serde(with = "timestamp::option")]
    pub check_in: Option<DateTime<Utc>>,
    #[serde(with = "timestamp::option")]
    pub check_out: Option<DateTime<Utc>>,
    pub total_hours: Option<f64>,
    pub status: AttendanceStatus,
}
