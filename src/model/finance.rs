use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::timestamp;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
    Salary,
}

fn default_transaction_status() -> String {
    "completed".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FinanceTransaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    #[schema(example = "rent")]
    pub category: String,
    #[schema(example = 300.0)]
    pub amount: f64,
    pub description: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub receipt_url: Option<String>,
    #[serde(default)]
    pub paid_to: Option<String>,
    #[serde(default = "default_transaction_status")]
    pub status: String,
    pub created_by: String,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewFinanceTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    #[schema(minimum = 0.0)]
    pub amount: f64,
    pub description: String,
    #[schema(value_type = String, format = "date", example = "2026-01-15")]
    pub date: NaiveDate,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub receipt_url: Option<String>,
    #[serde(default)]
    pub paid_to: Option<String>,
    #[serde(default = "default_transaction_status")]
    pub status: String,
    #[serde(skip_deserializing)]
    pub created_by: String,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SalaryStatus {
    #[default]
    Pending,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SalaryRecord {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    #[schema(example = "2026-01")]
    pub month: String,
    pub base_salary: f64,
    pub deductions: f64,
    pub bonuses: f64,
    /// Fixed at creation.
    pub net_salary: f64,
    pub status: SalaryStatus,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "date")]
    pub payment_date: Option<NaiveDate>,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewSalaryRecord {
    pub user_id: String,
    pub user_name: String,
    #[schema(example = "2026-01")]
    pub month: String,
    #[schema(example = 50000.0)]
    pub base_salary: f64,
    #[serde(default)]
    #[schema(example = 2000.0)]
    pub deductions: f64,
    #[serde(default)]
    #[schema(example = 5000.0)]
    pub bonuses: f64,
    #[serde(skip_deserializing)]
    pub net_salary: f64,
    #[serde(skip_deserializing)]
    pub status: SalaryStatus,
}
