use std::future::Future;

use actix_web::{HttpResponse, HttpResponseBuilder};
use serde::Serialize;

use crate::aggregate::FailOpen;
use crate::error::AppError;
use crate::store::StoreError;

pub mod attendance;
pub mod dashboard;
pub mod finance;
pub mod kudos;
pub mod leave_request;
pub mod meeting;
pub mod project;
pub mod task;
pub mod training;
pub mod user;

/// Set on summary responses that were replaced by the zero report.
pub const DEGRADED_HEADER: &str = "x-report-degraded";

/// Runs a multi-step write on its own task and waits for it, so a client
/// that disconnects mid-request cannot cancel the sequence half way.
pub(crate) async fn detached<F, T>(work: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>> + 'static,
    T: 'static,
{
    actix_web::rt::spawn(work).await.map_err(|e| {
        tracing::error!(error = %e, "Write task aborted");
        AppError::Internal
    })?
}

pub(crate) fn fail_open_response<T: Serialize>(outcome: FailOpen<T>) -> HttpResponse {
    let mut builder: HttpResponseBuilder = HttpResponse::Ok();
    if outcome.degraded {
        builder.insert_header((DEGRADED_HEADER, "true"));
    }
    builder.json(outcome.report)
}

/// Maps a duplicate-key failure to a domain message; other errors pass
/// through unchanged.
pub(crate) fn on_conflict(message: &'static str) -> impl Fn(StoreError) -> AppError {
    move |e| match e {
        StoreError::Conflict { .. } => AppError::conflict(message),
        other => other.into(),
    }
}

/// Same as [`on_conflict`] for a missing record.
pub(crate) fn on_missing(message: &'static str) -> impl Fn(StoreError) -> AppError {
    move |e| match e {
        StoreError::NotFound { .. } => AppError::not_found(message),
        other => other.into(),
    }
}

pub(crate) fn reject_empty_patch(is_empty: bool) -> Result<(), AppError> {
    if is_empty {
        Err(AppError::validation("Update must change at least one field"))
    } else {
        Ok(())
    }
}

/// `YYYY-MM`, as used by salary months and attendance filters.
pub(crate) fn validate_month(month: &str) -> Result<(), AppError> {
    let valid = month.len() == 7
        && chrono::NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d").is_ok();
    if valid {
        Ok(())
    } else {
        Err(AppError::validation("month must be formatted as YYYY-MM"))
    }
}
