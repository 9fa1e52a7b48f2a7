use std::sync::Arc;

use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::aggregate;
use crate::api::{detached, fail_open_response, on_conflict, validate_month};
use crate::auth::auth::AuthUser;
use crate::derived::worked_hours;
use crate::error::AppError;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, NewAttendanceRecord};
use crate::model::timestamp;
use crate::store::{Collection, Filter, Order, Query, RecordStore, RecordStoreExt, StoreError};

#[derive(Deserialize, ToSchema)]
pub struct CheckOutRequest {
    /// Day of the check-in being closed.
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CheckInResponse {
    #[schema(example = "Checked in successfully")]
    pub message: String,
    #[schema(value_type = String, format = "date-time")]
    #[serde(with = "timestamp")]
    pub time: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CheckOutResponse {
    #[schema(example = "Checked out successfully")]
    pub message: String,
    #[schema(value_type = String, format = "date-time")]
    #[serde(with = "timestamp")]
    pub time: DateTime<Utc>,
    #[schema(example = 8.5)]
    pub total_hours: f64,
}

#[derive(Deserialize, IntoParams)]
pub struct AttendanceFilter {
    /// Only this user's records
    pub user_id: Option<String>,
    /// Month prefix, `YYYY-MM`
    pub month: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct SummaryFilter {
    /// Summarise one user only
    pub user_id: Option<String>,
}

async fn day_record(
    store: &dyn RecordStore,
    user_id: &str,
    date: NaiveDate,
) -> Result<Option<AttendanceRecord>, StoreError> {
    let query = Query::new()
        .filter(Filter::eq("user_id", user_id))
        .filter(Filter::eq("date", date.to_string()))
        .limit(1);
    Ok(store
        .find_as::<AttendanceRecord>(Collection::Attendance, query)
        .await?
        .into_iter()
        .next())
}

/// Opens today's attendance record for `user`, or fills in the check-in of
/// a record created without one.
pub(crate) async fn check_in_at(
    store: &dyn RecordStore,
    user: &AuthUser,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, AppError> {
    let today = now.date_naive();

    match day_record(store, &user.user_id, today).await? {
        Some(record) if record.check_in.is_some() => {
            Err(AppError::conflict("Already checked in today"))
        }
        Some(record) => {
            let patch = json!({
                "check_in": timestamp::format(now),
                "status": AttendanceStatus::Present,
            });
            store
                .update_where_as::<_, AttendanceRecord>(
                    Collection::Attendance,
                    &record.id,
                    vec![Filter::missing("check_in")],
                    &patch,
                )
                .await
                .map_err(on_conflict("Already checked in today"))?;
            Ok(now)
        }
        None => {
            let record = NewAttendanceRecord {
                user_id: &user.user_id,
                user_name: &user.name,
                date: today,
                check_in: Some(now),
                check_out: None,
                total_hours: None,
                status: AttendanceStatus::Present,
            };
            store
                .insert_as::<_, AttendanceRecord>(Collection::Attendance, &record)
                .await
                .map_err(on_conflict("Already checked in today"))?;
            Ok(now)
        }
    }
}

/// Closes the check-in of `date` and stores the worked hours.
pub(crate) async fn check_out_at(
    store: &dyn RecordStore,
    user: &AuthUser,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<f64, AppError> {
    let record = day_record(store, &user.user_id, date)
        .await?
        .ok_or_else(|| AppError::not_found("No check-in record found for that date"))?;

    if record.check_out.is_some() {
        return Err(AppError::conflict("Already checked out"));
    }
    let check_in = record
        .check_in
        .ok_or_else(|| AppError::not_found("No check-in record found for that date"))?;

    let total_hours = worked_hours(check_in, Some(now)).unwrap_or(0.0);
    let patch = json!({
        "check_out": timestamp::format(now),
        "total_hours": total_hours,
    });
    store
        .update_where_as::<_, AttendanceRecord>(
            Collection::Attendance,
            &record.id,
            vec![Filter::missing("check_out")],
            &patch,
        )
        .await
        .map_err(on_conflict("Already checked out"))?;

    Ok(total_hours)
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 200, description = "Checked in successfully", body = CheckInResponse),
        (status = 400, description = "Already checked in today", body = Object, example = json!({
            "message": "Already checked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
) -> actix_web::Result<impl Responder> {
    let store: Arc<dyn RecordStore> = store.into_inner();
    let user = auth.clone();

    let time = detached(async move { check_in_at(store.as_ref(), &user, Utc::now()).await })
        .await
        .inspect_err(|e| tracing::info!(error = %e, user_id = %auth.user_id, "Check-in rejected"))?;

    tracing::info!(user_id = %auth.user_id, "Checked in");
    Ok(HttpResponse::Ok().json(CheckInResponse {
        message: "Checked in successfully".to_string(),
        time,
    }))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body = CheckOutRequest,
    responses(
        (status = 200, description = "Checked out successfully", body = CheckOutResponse),
        (status = 400, description = "Already checked out", body = Object, example = json!({
            "message": "Already checked out"
        })),
        (status = 404, description = "No check-in for that date", body = Object, example = json!({
            "message": "No check-in record found for that date"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    payload: web::Json<CheckOutRequest>,
) -> actix_web::Result<impl Responder> {
    let store: Arc<dyn RecordStore> = store.into_inner();
    let user = auth.clone();
    let date = payload.date;
    let now = Utc::now();

    let total_hours =
        detached(async move { check_out_at(store.as_ref(), &user, date, now).await }).await?;

    tracing::info!(user_id = %auth.user_id, %date, total_hours, "Checked out");
    Ok(HttpResponse::Ok().json(CheckOutResponse {
        message: "Checked out successfully".to_string(),
        time: now,
        total_hours,
    }))
}

/// Attendance records, newest day first
#[utoipa::path(
    get,
    path = "/api/attendance/records",
    params(AttendanceFilter),
    responses(
        (status = 200, description = "Attendance records", body = [AttendanceRecord]),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn records(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    filter: web::Query<AttendanceFilter>,
) -> actix_web::Result<impl Responder> {
    let filter = filter.into_inner();

    let mut query = Query::new().order(Order::desc("date"));
    if let Some(user_id) = filter.user_id {
        query = query.filter(Filter::eq("user_id", user_id));
    }
    if let Some(month) = filter.month {
        validate_month(&month)?;
        query = query.filter(Filter::starts_with("date", month));
    }

    let records: Vec<AttendanceRecord> = store
        .find_as(Collection::Attendance, query)
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(records))
}

/// Attendance summary; degrades to zeros when the store is unreachable
#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(SummaryFilter),
    responses(
        (status = 200, description = "Attendance summary. Carries `x-report-degraded: true` when zeroed after a store failure", body = crate::aggregate::AttendanceSummary),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn summary(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    filter: web::Query<SummaryFilter>,
) -> impl Responder {
    let outcome = aggregate::attendance_summary(store.get_ref(), filter.user_id.as_deref()).await;
    fail_open_response(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DEGRADED_HEADER;
    use crate::store::MemoryRecordStore;
    use crate::test_support::{FailingStore, YieldingStore, as_user, member, test_app};
    use actix_web::{http::StatusCode, test};
    use serde_json::Value;

    fn at(raw: &str) -> DateTime<Utc> {
        timestamp::parse(raw).unwrap()
    }

    #[actix_web::test]
    async fn check_in_then_out_records_worked_hours() {
        let store = MemoryRecordStore::new();
        let user = member("u1", "Rahim");
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        check_in_at(&store, &user, at("2024-01-01T09:00:00Z")).await.unwrap();
        let hours = check_out_at(&store, &user, day, at("2024-01-01T17:30:00Z"))
            .await
            .unwrap();
        assert_eq!(hours, 8.5);

        let record = day_record(&store, "u1", day).await.unwrap().unwrap();
        assert_eq!(record.total_hours, Some(8.5));
        assert_eq!(record.status, AttendanceStatus::Present);

        let again = check_out_at(&store, &user, day, at("2024-01-01T18:00:00Z")).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[actix_web::test]
    async fn check_in_fills_a_record_created_without_one() {
        let store = MemoryRecordStore::new();
        crate::test_support::insert(
            &store,
            Collection::Attendance,
            json!({"user_id": "u1", "user_name": "Rahim", "date": "2024-01-01", "status": "absent"}),
        )
        .await;

        let user = member("u1", "Rahim");
        check_in_at(&store, &user, at("2024-01-01T10:00:00Z")).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let record = day_record(&store, "u1", day).await.unwrap().unwrap();
        assert_eq!(record.check_in, Some(at("2024-01-01T10:00:00Z")));
        assert_eq!(record.status, AttendanceStatus::Present);
    }

    #[actix_web::test]
    async fn second_check_in_is_rejected_with_400() {
        let app = test_app!(Arc::new(MemoryRecordStore::new()));
        let user = member("u1", "Rahim");

        let first = test::call_service(
            &app,
            as_user(test::TestRequest::post().uri("/api/attendance/check-in"), &user).to_request(),
        )
        .await;
        assert_eq!(first.status(), StatusCode::OK);

        let second = test::call_service(
            &app,
            as_user(test::TestRequest::post().uri("/api/attendance/check-in"), &user).to_request(),
        )
        .await;
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(second).await;
        assert_eq!(body["message"], "Already checked in today");
    }

    #[actix_web::test]
    async fn check_out_without_check_in_is_404() {
        let app = test_app!(Arc::new(MemoryRecordStore::new()));

        let resp = test::call_service(
            &app,
            as_user(test::TestRequest::post().uri("/api/attendance/check-out"), &member("u1", "R"))
                .set_json(json!({"date": "2024-01-01"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn concurrent_check_outs_close_the_day_once() {
        let store = YieldingStore(MemoryRecordStore::new());
        let user = member("u1", "Rahim");
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        check_in_at(&store, &user, at("2024-01-01T09:00:00Z")).await.unwrap();

        let (first, second) = futures::join!(
            check_out_at(&store, &user, day, at("2024-01-01T17:00:00Z")),
            check_out_at(&store, &user, day, at("2024-01-01T18:00:00Z")),
        );

        let (won, lost) = match (first, second) {
            (Ok(hours), Err(e)) | (Err(e), Ok(hours)) => (hours, e),
            other => panic!("expected exactly one check-out to win, got {other:?}"),
        };
        assert!(matches!(lost, AppError::Conflict(ref m) if m == "Already checked out"));

        let record = day_record(&store, "u1", day).await.unwrap().unwrap();
        assert_eq!(record.total_hours, Some(won));
    }

    #[actix_web::test]
    async fn concurrent_check_ins_fill_an_open_record_once() {
        let store = YieldingStore(MemoryRecordStore::new());
        crate::test_support::insert(
            &store,
            Collection::Attendance,
            json!({"user_id": "u1", "user_name": "Rahim", "date": "2024-01-01", "status": "absent"}),
        )
        .await;
        let user = member("u1", "Rahim");

        let (first, second) = futures::join!(
            check_in_at(&store, &user, at("2024-01-01T09:00:00Z")),
            check_in_at(&store, &user, at("2024-01-01T09:05:00Z")),
        );

        let won = match (first, second) {
            (Ok(time), Err(AppError::Conflict(_))) | (Err(AppError::Conflict(_)), Ok(time)) => time,
            other => panic!("expected exactly one check-in to win, got {other:?}"),
        };
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let record = day_record(&store, "u1", day).await.unwrap().unwrap();
        assert_eq!(record.check_in, Some(won));
    }

    #[actix_web::test]
    async fn check_out_of_a_record_without_check_in_is_not_found() {
        let store = Arc::new(MemoryRecordStore::new());
        crate::test_support::insert(
            store.as_ref(),
            Collection::Attendance,
            json!({"user_id": "u1", "user_name": "Rahim", "date": "2024-01-01", "status": "absent"}),
        )
        .await;
        let user = member("u1", "Rahim");
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let direct = check_out_at(store.as_ref(), &user, day, at("2024-01-01T17:00:00Z")).await;
        assert!(matches!(direct, Err(AppError::NotFound(_))));

        let app = test_app!(store.clone());
        let resp = test::call_service(
            &app,
            as_user(test::TestRequest::post().uri("/api/attendance/check-out"), &user)
                .set_json(json!({"date": "2024-01-01"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "No check-in record found for that date");

        let record = day_record(store.as_ref(), "u1", day).await.unwrap().unwrap();
        assert!(record.check_out.is_none());
    }

    #[actix_web::test]
    async fn records_reject_malformed_month() {
        let app = test_app!(Arc::new(MemoryRecordStore::new()));

        let resp = test::call_service(
            &app,
            as_user(
                test::TestRequest::get().uri("/api/attendance/records?month=January"),
                &member("u1", "R"),
            )
            .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn summary_degrades_to_zero_when_store_is_down() {
        let app = test_app!(Arc::new(FailingStore));

        let resp = test::call_service(
            &app,
            as_user(test::TestRequest::get().uri("/api/attendance/summary"), &member("u1", "R"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(DEGRADED_HEADER).unwrap(), "true");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["total_days"], 0);
        assert_eq!(body["average_hours_per_day"], 0.0);
    }

    #[actix_web::test]
    async fn requests_without_token_are_401() {
        let app = test_app!(Arc::new(MemoryRecordStore::new()));

        let resp = test::call_service(
            &app,
            crate::test_support::anonymous(test::TestRequest::get().uri("/api/attendance/summary"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
