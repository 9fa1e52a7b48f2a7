use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::{on_conflict, on_missing};
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::leave_request::{LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::store::{Collection, Filter, Order, Query, RecordStore, RecordStoreExt, StoreError};

#[derive(Deserialize, IntoParams)]
pub struct LeaveFilter {
    /// Filter by applicant; members only ever see their own requests
    pub user_id: Option<String>,
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LeaveReview {
    #[schema(example = "approved")]
    pub status: LeaveStatus,
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave-requests",
    request_body(
        content = NewLeaveRequest,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveRequest),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    payload: web::Json<NewLeaveRequest>,
) -> actix_web::Result<impl Responder> {
    let mut leave = payload.into_inner();

    if leave.start_date > leave.end_date {
        return Err(AppError::validation("start_date cannot be after end_date").into());
    }
    if leave.leave_type.trim().is_empty() {
        return Err(AppError::validation("type must not be empty").into());
    }

    leave.user_id = auth.user_id.clone();
    leave.user_name = auth.name.clone();
    leave.status = LeaveStatus::Pending;

    let stored: LeaveRequest = store
        .insert_as(Collection::LeaveRequests, &leave)
        .await
        .map_err(AppError::from)?;

    tracing::info!(leave_id = %stored.id, user_id = %stored.user_id, "Leave request submitted");
    Ok(HttpResponse::Created().json(stored))
}

/// Moves a pending request to `status`. The status check and the write are
/// one guarded update, so only the first of two racing reviews lands.
pub(crate) async fn settle_pending(
    store: &dyn RecordStore,
    leave_id: &str,
    review: &LeaveReview,
) -> Result<LeaveRequest, AppError> {
    let current: LeaveRequest = store
        .get_as(Collection::LeaveRequests, leave_id)
        .await
        .map_err(on_missing("Leave request not found"))?;

    if current.status != LeaveStatus::Pending {
        return Err(AppError::conflict("Leave request already processed"));
    }

    let pending = vec![Filter::eq("status", LeaveStatus::Pending.to_string())];
    store
        .update_where_as(Collection::LeaveRequests, leave_id, pending, review)
        .await
        .map_err(|e| match e {
            StoreError::NotFound { .. } => AppError::not_found("Leave request not found"),
            other => on_conflict("Leave request already processed")(other),
        })
}

/* =========================
Approve or reject (Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave-requests/{leave_id}",
    request_body = LeaveReview,
    params(
        ("leave_id", description = "ID of the leave request to review")
    ),
    responses(
        (status = 200, description = "Leave reviewed", body = LeaveRequest),
        (status = 400, description = "Leave request already processed or status invalid"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn review_leave(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    path: web::Path<String>,
    payload: web::Json<LeaveReview>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let review = payload.into_inner();
    if review.status == LeaveStatus::Pending {
        return Err(AppError::validation("status must be approved or rejected").into());
    }

    let updated = settle_pending(store.get_ref(), &path.into_inner(), &review).await?;

    tracing::info!(leave_id = %updated.id, status = %updated.status, reviewer = %auth.user_id, "Leave reviewed");
    Ok(HttpResponse::Ok().json(updated))
}

/// Leave requests, newest first
#[utoipa::path(
    get,
    path = "/api/leave-requests",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Leave requests", body = [LeaveRequest]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    filter: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    let LeaveFilter { user_id, status } = filter.into_inner();

    let applicant = if auth.is_admin() {
        user_id
    } else {
        Some(auth.user_id.clone())
    };

    let mut query = Query::new().order(Order::desc("created_at"));
    if let Some(user_id) = applicant {
        query = query.filter(Filter::eq("user_id", user_id));
    }
    if let Some(status) = status {
        query = query.filter(Filter::eq("status", status.to_string()));
    }

    let leaves: Vec<LeaveRequest> = store
        .find_as(Collection::LeaveRequests, query)
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(leaves))
}
