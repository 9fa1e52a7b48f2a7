use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::timestamp;

/// One ledger entry. Entries are never mutated; a balance is the sum of
/// amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct KudosTransaction {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    #[schema(example = -5)]
    pub amount: i64,
    pub reason: String,
    #[schema(example = "meeting_attendance")]
    pub category: String,
    pub given_by: String,
    /// Idempotency key of system-generated entries.
    #[serde(default)]
    pub source_ref: Option<String>,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewKudos {
    pub user_id: String,
    pub user_name: String,
    pub amount: i64,
    pub reason: String,
    pub category: String,
    #[serde(skip_deserializing)]
    pub given_by: String,
    #[serde(skip_deserializing)]
    pub source_ref: Option<String>,
}
