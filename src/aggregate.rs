//! Consolidated reports built from several record store reads.
//!
//! Each report fetches what it needs concurrently, hands the raw records to
//! [`crate::derived`] and merges the results into one response object.
//! `dashboard_stats` fails closed; the finance and attendance summaries fall
//! back to an all-zero report when the store cannot be read.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use futures::try_join;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::derived;
use crate::model::{
    attendance::{AttendanceRecord, AttendanceStatus},
    finance::{FinanceTransaction, SalaryStatus, TransactionType},
    kudos::KudosTransaction,
    leave_request::LeaveStatus,
    meeting::Meeting,
    project::Project,
    task::{Task, TaskStatus},
    timestamp,
};
use crate::store::{Collection, Filter, Order, Query, RecordStore, RecordStoreExt, StoreError};

const RECENT_ACTIVITY_LIMIT: usize = 5;
const ASSIGNED_TASKS_LIMIT: usize = 10;
const UPCOMING_MEETINGS_LIMIT: usize = 5;
const RECENT_TRANSACTIONS_LIMIT: usize = 10;

/// Global counters, recent activity and, when a user is given, that user's
/// personal figures. User fields are left out of the JSON when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    pub total_projects: u64,
    pub total_tasks: u64,
    pub total_members: u64,
    pub pending_leaves: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_tasks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_tasks_completed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_projects: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_tasks: Option<Vec<Task>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kudos_balance: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upcoming_meetings: Option<Vec<Meeting>>,

    pub recent_projects: Vec<Project>,
    pub recent_tasks: Vec<Task>,
}

struct UserStats {
    my_tasks: u64,
    my_tasks_completed: u64,
    my_projects: u64,
    assigned_tasks: Vec<Task>,
    kudos_balance: i64,
    upcoming_meetings: Vec<Meeting>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FinanceSummary {
    pub total_income: f64,
    pub total_expenses: f64,
    pub total_salary: f64,
    pub net_balance: f64,
    pub expense_by_category: BTreeMap<String, f64>,
    pub recent_transactions: Vec<FinanceTransaction>,
    pub pending_salary_payments: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceSummary {
    pub total_days: u64,
    pub present_days: u64,
    pub absent_days: u64,
    pub leave_days: u64,
    pub total_hours_worked: f64,
    pub average_hours_per_day: f64,
}

/// A report that may have been replaced by its zero default.
#[derive(Debug)]
pub struct FailOpen<T> {
    pub report: T,
    pub degraded: bool,
}

impl<T: Default> FailOpen<T> {
    fn from_result(result: Result<T, StoreError>, name: &'static str) -> Self {
        match result {
            Ok(report) => Self {
                report,
                degraded: false,
            },
            Err(e) => {
                tracing::error!(error = %e, report = name, "Serving zero report, record store read failed");
                Self {
                    report: T::default(),
                    degraded: true,
                }
            }
        }
    }
}

fn open_tasks_of(user_id: &str) -> Vec<Filter> {
    vec![
        Filter::eq("assigned_to", user_id),
        Filter::ne("status", TaskStatus::Done.to_string()),
    ]
}

async fn user_stats(
    store: &dyn RecordStore,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<UserStats, StoreError> {
    let assigned_query = Query {
        filters: open_tasks_of(user_id),
        order: Some(Order::asc("created_at")),
        limit: Some(ASSIGNED_TASKS_LIMIT),
    };
    let upcoming_query = Query::new()
        .filter(Filter::gte("start_time", timestamp::format(now)))
        .order(Order::asc("start_time"));

    let (my_tasks, my_tasks_completed, my_projects, assigned_tasks, ledger, upcoming) = try_join!(
        store.count(Collection::Tasks, open_tasks_of(user_id)),
        store.count(
            Collection::Tasks,
            vec![
                Filter::eq("assigned_to", user_id),
                Filter::eq("status", TaskStatus::Done.to_string()),
            ],
        ),
        store.count(
            Collection::Projects,
            vec![Filter::contains("assigned_members", user_id)],
        ),
        store.find_as::<Task>(Collection::Tasks, assigned_query),
        store.find_as::<KudosTransaction>(
            Collection::KudosTransactions,
            Query::new().filter(Filter::eq("user_id", user_id)),
        ),
        store.find_as::<Meeting>(Collection::Meetings, upcoming_query),
    )?;

    let upcoming_meetings = upcoming
        .into_iter()
        .filter(|m| m.involves(user_id))
        .take(UPCOMING_MEETINGS_LIMIT)
        .collect();

    Ok(UserStats {
        my_tasks,
        my_tasks_completed,
        my_projects,
        assigned_tasks,
        kudos_balance: derived::kudos_balance(&ledger),
        upcoming_meetings,
    })
}

pub async fn dashboard_stats(
    store: &dyn RecordStore,
    user_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DashboardStats, StoreError> {
    let recent = || {
        Query::new()
            .order(Order::desc("created_at"))
            .limit(RECENT_ACTIVITY_LIMIT)
    };

    let personal = async {
        match user_id {
            Some(id) => user_stats(store, id, now).await.map(Some),
            None => Ok(None),
        }
    };

    let (total_projects, total_tasks, total_members, pending_leaves, recent_projects, recent_tasks, personal) = try_join!(
        store.count(Collection::Projects, Vec::new()),
        store.count(Collection::Tasks, Vec::new()),
        store.count(Collection::Users, Vec::new()),
        store.count(
            Collection::LeaveRequests,
            vec![Filter::eq("status", LeaveStatus::Pending.to_string())],
        ),
        store.find_as::<Project>(Collection::Projects, recent()),
        store.find_as::<Task>(Collection::Tasks, recent()),
        personal,
    )?;

    let mut stats = DashboardStats {
        total_projects,
        total_tasks,
        total_members,
        pending_leaves,
        my_tasks: None,
        my_tasks_completed: None,
        my_projects: None,
        assigned_tasks: None,
        kudos_balance: None,
        upcoming_meetings: None,
        recent_projects,
        recent_tasks,
    };

    if let Some(user) = personal {
        stats.my_tasks = Some(user.my_tasks);
        stats.my_tasks_completed = Some(user.my_tasks_completed);
        stats.my_projects = Some(user.my_projects);
        stats.assigned_tasks = Some(user.assigned_tasks);
        stats.kudos_balance = Some(user.kudos_balance);
        stats.upcoming_meetings = Some(user.upcoming_meetings);
    }

    Ok(stats)
}

pub async fn try_finance_summary(store: &dyn RecordStore) -> Result<FinanceSummary, StoreError> {
    let (transactions, pending_salary_payments) = try_join!(
        store.find_as::<FinanceTransaction>(
            Collection::FinanceTransactions,
            Query::new().order(Order::desc("created_at")),
        ),
        store.count(
            Collection::SalaryRecords,
            vec![Filter::eq("status", SalaryStatus::Pending.to_string())],
        ),
    )?;

    let total_of = |kind: TransactionType| -> f64 {
        transactions
            .iter()
            .filter(|t| t.kind == kind)
            .map(|t| t.amount)
            .sum()
    };
    let total_income = total_of(TransactionType::Income);
    let total_expenses = total_of(TransactionType::Expense);
    let total_salary = total_of(TransactionType::Salary);

    Ok(FinanceSummary {
        total_income,
        total_expenses,
        total_salary,
        net_balance: derived::net_balance(total_income, total_expenses, total_salary),
        expense_by_category: derived::expense_by_category(&transactions),
        recent_transactions: transactions
            .into_iter()
            .take(RECENT_TRANSACTIONS_LIMIT)
            .collect(),
        pending_salary_payments,
    })
}

pub async fn finance_summary(store: &dyn RecordStore) -> FailOpen<FinanceSummary> {
    FailOpen::from_result(try_finance_summary(store).await, "finance_summary")
}

pub async fn try_attendance_summary(
    store: &dyn RecordStore,
    user_id: Option<&str>,
) -> Result<AttendanceSummary, StoreError> {
    let mut query = Query::new();
    if let Some(id) = user_id {
        query = query.filter(Filter::eq("user_id", id));
    }
    let records: Vec<AttendanceRecord> = store.find_as(Collection::Attendance, query).await?;

    let days_with = |status: AttendanceStatus| -> u64 {
        records.iter().filter(|r| r.status == status).count() as u64
    };
    let present_days = days_with(AttendanceStatus::Present);

    let total_hours: f64 = records
        .iter()
        .filter(|r| r.status == AttendanceStatus::Present)
        .filter_map(|r| r.total_hours)
        .sum();

    Ok(AttendanceSummary {
        total_days: records.len() as u64,
        present_days,
        absent_days: days_with(AttendanceStatus::Absent),
        leave_days: days_with(AttendanceStatus::Leave),
        total_hours_worked: derived::round2(total_hours),
        average_hours_per_day: derived::average_hours_per_day(total_hours, present_days),
    })
}

pub async fn attendance_summary(
    store: &dyn RecordStore,
    user_id: Option<&str>,
) -> FailOpen<AttendanceSummary> {
    FailOpen::from_result(
        try_attendance_summary(store, user_id).await,
        "attendance_summary",
    )
}
