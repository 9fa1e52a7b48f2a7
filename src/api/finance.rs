use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::aggregate;
use crate::api::{fail_open_response, on_missing, validate_month};
use crate::auth::auth::AuthUser;
use crate::derived::net_salary;
use crate::error::AppError;
use crate::model::finance::{
    FinanceTransaction, NewFinanceTransaction, NewSalaryRecord, SalaryRecord, SalaryStatus,
};
use crate::store::{Collection, Filter, Order, Query, RecordStore, RecordStoreExt};

#[derive(Deserialize, Serialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SalaryStatusUpdate {
    #[schema(example = "paid")]
    pub status: SalaryStatus,
    /// Defaults to today when marking a salary paid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date", example = "2026-02-01")]
    pub payment_date: Option<NaiveDate>,
}

#[derive(Deserialize, IntoParams)]
pub struct SalaryQuery {
    /// Only this user's salaries
    pub user_id: Option<String>,
    /// Only this month, `YYYY-MM`
    pub month: Option<String>,
}

fn validate_amount(name: &str, value: f64) -> Result<(), AppError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AppError::validation(format!("{name} must be a non-negative number")))
    }
}

/// Finance transactions, newest first
#[utoipa::path(
    get,
    path = "/api/finance/transactions",
    responses(
        (status = 200, description = "All transactions", body = [FinanceTransaction]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Finance"
)]
pub async fn list_transactions(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
) -> actix_web::Result<impl Responder> {
    let transactions: Vec<FinanceTransaction> = store
        .find_as(
            Collection::FinanceTransactions,
            Query::new().order(Order::desc("created_at")),
        )
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(transactions))
}

#[utoipa::path(
    post,
    path = "/api/finance/transactions",
    request_body = NewFinanceTransaction,
    responses(
        (status = 201, description = "Transaction recorded", body = FinanceTransaction),
        (status = 400, description = "Invalid amount"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Finance"
)]
pub async fn create_transaction(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    payload: web::Json<NewFinanceTransaction>,
) -> actix_web::Result<impl Responder> {
    let mut transaction = payload.into_inner();
    validate_amount("amount", transaction.amount)?;
    transaction.created_by = auth.user_id.clone();

    let stored: FinanceTransaction = store
        .insert_as(Collection::FinanceTransactions, &transaction)
        .await
        .map_err(AppError::from)?;

    tracing::info!(id = %stored.id, kind = %stored.kind, amount = stored.amount, "Finance transaction recorded");
    Ok(HttpResponse::Created().json(stored))
}

#[utoipa::path(
    delete,
    path = "/api/finance/transactions/{transaction_id}",
    params(
        ("transaction_id", description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Transaction deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Transaction not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Finance"
)]
pub async fn delete_transaction(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let id = path.into_inner();

    store
        .delete(Collection::FinanceTransactions, &id)
        .await
        .map_err(on_missing("Transaction not found"))?;

    tracing::info!(id = %id, "Finance transaction deleted");
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Transaction deleted successfully"
    })))
}

/// Salary records, newest first
#[utoipa::path(
    get,
    path = "/api/finance/salaries",
    params(SalaryQuery),
    responses(
        (status = 200, description = "Salary records", body = [SalaryRecord]),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Finance"
)]
pub async fn list_salaries(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    query: web::Query<SalaryQuery>,
) -> actix_web::Result<impl Responder> {
    let SalaryQuery { user_id, month } = query.into_inner();

    let mut query = Query::new().order(Order::desc("created_at"));
    if let Some(user_id) = user_id {
        query = query.filter(Filter::eq("user_id", user_id));
    }
    if let Some(month) = month {
        validate_month(&month)?;
        query = query.filter(Filter::eq("month", month));
    }

    let salaries: Vec<SalaryRecord> = store
        .find_as(Collection::SalaryRecords, query)
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(salaries))
}

/// Create a salary record; `net_salary` is fixed at creation
#[utoipa::path(
    post,
    path = "/api/finance/salaries",
    request_body = NewSalaryRecord,
    responses(
        (status = 201, description = "Salary record created", body = SalaryRecord),
        (status = 400, description = "Invalid amounts or month"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Finance"
)]
pub async fn create_salary(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    payload: web::Json<NewSalaryRecord>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let mut salary = payload.into_inner();
    validate_month(&salary.month)?;
    validate_amount("base_salary", salary.base_salary)?;
    validate_amount("deductions", salary.deductions)?;
    validate_amount("bonuses", salary.bonuses)?;

    salary.net_salary = net_salary(salary.base_salary, salary.deductions, salary.bonuses);
    salary.status = SalaryStatus::Pending;

    let stored: SalaryRecord = store
        .insert_as(Collection::SalaryRecords, &salary)
        .await
        .map_err(AppError::from)?;

    tracing::info!(id = %stored.id, user_id = %stored.user_id, month = %stored.month, "Salary record created");
    Ok(HttpResponse::Created().json(stored))
}

#[utoipa::path(
    put,
    path = "/api/finance/salaries/{salary_id}",
    request_body = SalaryStatusUpdate,
    params(
        ("salary_id", description = "Salary record ID")
    ),
    responses(
        (status = 200, description = "Salary status updated", body = SalaryRecord),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Salary record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Finance"
)]
pub async fn update_salary_status(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    path: web::Path<String>,
    payload: web::Json<SalaryStatusUpdate>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let id = path.into_inner();

    let mut update = payload.into_inner();
    if update.status == SalaryStatus::Paid && update.payment_date.is_none() {
        update.payment_date = Some(Utc::now().date_naive());
    }

    let stored: SalaryRecord = store
        .update_as(Collection::SalaryRecords, &id, &update)
        .await
        .map_err(on_missing("Salary record not found"))?;

    Ok(HttpResponse::Ok().json(stored))
}

/// Finance summary; degrades to zeros when the store is unreachable
#[utoipa::path(
    get,
    path = "/api/finance/summary",
    responses(
        (status = 200, description = "Finance summary. Carries `x-report-degraded: true` when zeroed after a store failure", body = crate::aggregate::FinanceSummary),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Finance"
)]
pub async fn summary(_auth: AuthUser, store: web::Data<dyn RecordStore>) -> impl Responder {
    fail_open_response(aggregate::finance_summary(store.get_ref()).await)
}
