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
pub enum LeaveStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LeaveRequest {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(rename = "type")]
    #[schema(example = "sick")]
    pub leave_type: String,
    #[schema(value_type = String, format = "date", example = "2026-01-01")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2026-01-03")]
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: LeaveStatus,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// Leave application; the applicant comes from the caller's token.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewLeaveRequest {
    #[serde(skip_deserializing)]
    pub user_id: String,
    #[serde(skip_deserializing)]
    pub user_name: String,
    #[serde(rename = "type")]
    #[schema(example = "annual")]
    pub leave_type: String,
    #[schema(value_type = String, format = "date", example = "2026-01-01")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2026-01-03")]
    pub end_date: NaiveDate,
    pub reason: String,
    #[serde(skip_deserializing)]
    pub status: LeaveStatus,
}
