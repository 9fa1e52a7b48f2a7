//! Pure metric calculations shared by handlers and the aggregation layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::model::finance::{FinanceTransaction, TransactionType};
use crate::model::kudos::KudosTransaction;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `base - deductions + bonuses`, unrounded.
pub fn net_salary(base: f64, deductions: f64, bonuses: f64) -> f64 {
    base - deductions + bonuses
}

/// Hours between check-in and check-out, rounded to two decimals and never
/// negative. `None` until the user has checked out.
pub fn worked_hours(check_in: DateTime<Utc>, check_out: Option<DateTime<Utc>>) -> Option<f64> {
    let check_out = check_out?;
    let millis = (check_out - check_in).num_milliseconds().max(0);
    Some(round2(millis as f64 / 3_600_000.0))
}

pub fn kudos_balance<'a, I>(ledger: I) -> i64
where
    I: IntoIterator<Item = &'a KudosTransaction>,
{
    ledger.into_iter().map(|t| t.amount).sum()
}

/// Expense totals per category, keys sorted.
pub fn expense_by_category<'a, I>(transactions: I) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = &'a FinanceTransaction>,
{
    let mut totals = BTreeMap::new();
    for t in transactions
        .into_iter()
        .filter(|t| t.kind == TransactionType::Expense)
    {
        *totals.entry(t.category.clone()).or_insert(0.0) += t.amount;
    }
    totals
}

pub fn net_balance(income: f64, expenses: f64, salary: f64) -> f64 {
    income - expenses - salary
}

pub fn average_hours_per_day(total_hours: f64, present_days: u64) -> f64 {
    if present_days == 0 {
        return 0.0;
    }
    round2(total_hours / present_days as f64)
}
