use std::sync::Arc;

use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::{detached, on_conflict, on_missing, reject_empty_patch};
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::model::kudos::KudosTransaction;
use crate::model::meeting::{
    AttendanceMark, Meeting, MeetingAttendance, MeetingPatch, NewMeeting, NewMeetingAttendance,
};
use crate::model::timestamp;
use crate::model::user::User;
use crate::store::{
    Collection, Filter, Order, Query, RecordStore, RecordStoreExt, StoreError,
};

#[derive(Deserialize, IntoParams)]
pub struct MeetingFilter {
    /// Meetings this user organizes or attends
    pub user_id: Option<String>,
    pub meeting_type: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AttendanceSheet {
    /// Invitees who showed up; every other invitee is marked absent.
    pub attendees_present: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct AttendanceOutcome {
    /// Attendance rows written by this call
    pub recorded: usize,
    /// Penalties written by this call
    pub penalized: usize,
}

#[derive(Serialize)]
struct MeetingFlags {
    #[serde(skip_serializing_if = "Option::is_none")]
    attendance_tracked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    penalties_applied: Option<bool>,
}

#[derive(Serialize)]
struct MissedMeetingPenalty<'a> {
    user_id: &'a str,
    user_name: &'a str,
    amount: i64,
    reason: String,
    category: &'static str,
    given_by: &'a str,
    source_ref: String,
}

pub(crate) fn penalty_ref(meeting_id: &str, user_id: &str) -> String {
    format!("meeting:{meeting_id}:{user_id}")
}

fn ensure_organizer(meeting: &Meeting, caller: &AuthUser) -> Result<(), AppError> {
    if meeting.organizer == caller.user_id || caller.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the organizer can manage this meeting".to_string(),
        ))
    }
}

/// Phase one: one attendance row per invitee. Invitees without a user
/// record are skipped and rows that already exist are left alone, so the
/// step can be re-run.
pub(crate) async fn record_attendance_rows(
    store: &dyn RecordStore,
    meeting: &Meeting,
    present: &[String],
) -> Result<usize, AppError> {
    let mut recorded = 0;

    for attendee in &meeting.attendees {
        let user: User = match store.get_as(Collection::Users, attendee).await {
            Ok(user) => user,
            Err(StoreError::NotFound { .. }) => {
                tracing::warn!(meeting_id = %meeting.id, user_id = %attendee, "Unknown invitee skipped");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let status = if present.contains(attendee) {
            AttendanceMark::Present
        } else {
            AttendanceMark::Absent
        };
        let row = NewMeetingAttendance {
            meeting_id: &meeting.id,
            user_id: &user.id,
            user_name: &user.name,
            status,
        };

        match store
            .insert_as::<_, MeetingAttendance>(Collection::MeetingAttendance, &row)
            .await
        {
            Ok(_) => recorded += 1,
            Err(StoreError::Conflict { .. }) => {
                tracing::debug!(meeting_id = %meeting.id, user_id = %user.id, "Attendance already recorded");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let flags = MeetingFlags {
        attendance_tracked: Some(true),
        penalties_applied: None,
    };
    store
        .update_as::<_, Meeting>(Collection::Meetings, &meeting.id, &flags)
        .await?;

    Ok(recorded)
}

/// Phase two: deducts `penalty` kudos from every absentee. Each deduction
/// carries a per (meeting, user) `source_ref`, so a retry only writes the
/// ones that are still missing.
pub(crate) async fn apply_missed_meeting_penalties(
    store: &dyn RecordStore,
    meeting_id: &str,
    penalty: i64,
) -> Result<usize, AppError> {
    let meeting: Meeting = store
        .get_as(Collection::Meetings, meeting_id)
        .await
        .map_err(on_missing("Meeting not found"))?;

    if !meeting.attendance_tracked {
        return Err(AppError::validation(
            "Attendance has not been recorded for this meeting",
        ));
    }

    let absentees: Vec<MeetingAttendance> = store
        .find_as(
            Collection::MeetingAttendance,
            Query::new()
                .filter(Filter::eq("meeting_id", meeting.id.clone()))
                .filter(Filter::eq("status", AttendanceMark::Absent.to_string())),
        )
        .await?;

    let mut penalized = 0;
    if penalty > 0 {
        for absentee in &absentees {
            let entry = MissedMeetingPenalty {
                user_id: &absentee.user_id,
                user_name: &absentee.user_name,
                amount: -penalty,
                reason: format!("Missed meeting: {}", meeting.title),
                category: "meeting_attendance",
                given_by: &meeting.organizer,
                source_ref: penalty_ref(&meeting.id, &absentee.user_id),
            };

            match store
                .insert_as::<_, KudosTransaction>(Collection::KudosTransactions, &entry)
                .await
            {
                Ok(_) => penalized += 1,
                Err(StoreError::Conflict { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    let flags = MeetingFlags {
        attendance_tracked: None,
        penalties_applied: Some(true),
    };
    store
        .update_as::<_, Meeting>(Collection::Meetings, &meeting.id, &flags)
        .await?;

    if penalized > 0 {
        tracing::info!(meeting_id = %meeting.id, penalized, "Missed meeting penalties applied");
    }
    Ok(penalized)
}

/// Meetings, latest start first
#[utoipa::path(
    get,
    path = "/api/meetings",
    params(MeetingFilter),
    responses(
        (status = 200, description = "Meetings", body = [Meeting]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Meetings"
)]
pub async fn list_meetings(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    filter: web::Query<MeetingFilter>,
) -> actix_web::Result<impl Responder> {
    let MeetingFilter {
        user_id,
        meeting_type,
    } = filter.into_inner();

    let mut query = Query::new().order(Order::desc("start_time"));
    if let Some(meeting_type) = meeting_type {
        query = query.filter(Filter::eq("meeting_type", meeting_type));
    }

    let mut meetings: Vec<Meeting> = store
        .find_as(Collection::Meetings, query)
        .await
        .map_err(AppError::from)?;
    if let Some(user_id) = user_id {
        meetings.retain(|m| m.involves(&user_id));
    }

    Ok(HttpResponse::Ok().json(meetings))
}

#[utoipa::path(
    post,
    path = "/api/meetings",
    request_body = NewMeeting,
    responses(
        (status = 201, description = "Meeting scheduled", body = Meeting),
        (status = 400, description = "End time before start time")
    ),
    security(("bearer_auth" = [])),
    tag = "Meetings"
)]
pub async fn create_meeting(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    payload: web::Json<NewMeeting>,
) -> actix_web::Result<impl Responder> {
    let mut meeting = payload.into_inner();
    if meeting.title.trim().is_empty() {
        return Err(AppError::validation("title must not be empty").into());
    }
    if meeting.end_time <= meeting.start_time {
        return Err(AppError::validation("end_time must be after start_time").into());
    }
    meeting.organizer = auth.user_id.clone();
    meeting.attendance_tracked = false;
    meeting.penalties_applied = false;

    let stored: Meeting = store
        .insert_as(Collection::Meetings, &meeting)
        .await
        .map_err(AppError::from)?;

    tracing::info!(meeting_id = %stored.id, organizer = %stored.organizer, "Meeting scheduled");
    Ok(HttpResponse::Created().json(stored))
}

/// Edit a meeting (organizer or admin)
#[utoipa::path(
    put,
    path = "/api/meetings/{meeting_id}",
    request_body = MeetingPatch,
    params(
        ("meeting_id", description = "Meeting ID")
    ),
    responses(
        (status = 200, description = "Meeting updated", body = Meeting),
        (status = 400, description = "Empty update, end time before start time, or meeting changed meanwhile"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Meeting not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Meetings"
)]
pub async fn update_meeting(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    path: web::Path<String>,
    payload: web::Json<MeetingPatch>,
) -> actix_web::Result<impl Responder> {
    let patch = payload.into_inner();
    reject_empty_patch(patch.is_empty())?;
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::validation("title must not be empty").into());
    }

    let meeting_id = path.into_inner();
    let current: Meeting = store
        .get_as(Collection::Meetings, &meeting_id)
        .await
        .map_err(on_missing("Meeting not found"))?;
    ensure_organizer(&current, &auth)?;

    let start = patch.start_time.unwrap_or(current.start_time);
    let end = patch.end_time.unwrap_or(current.end_time);
    if end <= start {
        return Err(AppError::validation("end_time must be after start_time").into());
    }

    // the time check above ran against these values
    let unchanged = vec![
        Filter::eq("start_time", timestamp::format(current.start_time)),
        Filter::eq("end_time", timestamp::format(current.end_time)),
    ];
    let updated: Meeting = store
        .update_where_as(Collection::Meetings, &meeting_id, unchanged, &patch)
        .await
        .map_err(|e| match e {
            StoreError::NotFound { .. } => AppError::not_found("Meeting not found"),
            other => on_conflict("Meeting was rescheduled meanwhile, retry")(other),
        })?;

    tracing::info!(%meeting_id, updated_by = %auth.user_id, "Meeting updated");
    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    get,
    path = "/api/meetings/{meeting_id}/attendance",
    params(
        ("meeting_id", description = "Meeting ID")
    ),
    responses(
        (status = 200, description = "Attendance rows", body = [MeetingAttendance]),
        (status = 404, description = "Meeting not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Meetings"
)]
pub async fn list_attendance(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let meeting: Meeting = store
        .get_as(Collection::Meetings, &path.into_inner())
        .await
        .map_err(on_missing("Meeting not found"))?;

    let rows: Vec<MeetingAttendance> = store
        .find_as(
            Collection::MeetingAttendance,
            Query::new().filter(Filter::eq("meeting_id", meeting.id)),
        )
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(rows))
}

/// Record who attended, then deduct kudos from absentees
#[utoipa::path(
    post,
    path = "/api/meetings/{meeting_id}/attendance",
    request_body = AttendanceSheet,
    params(
        ("meeting_id", description = "Meeting ID")
    ),
    responses(
        (status = 200, description = "Attendance recorded", body = AttendanceOutcome),
        (status = 403, description = "Not the organizer"),
        (status = 404, description = "Meeting not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Meetings"
)]
pub async fn record_attendance(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    config: web::Data<Config>,
    path: web::Path<String>,
    payload: web::Json<AttendanceSheet>,
) -> actix_web::Result<impl Responder> {
    let store: Arc<dyn RecordStore> = store.into_inner();
    let penalty = config.missed_meeting_penalty;
    let meeting_id = path.into_inner();
    let present = payload.into_inner().attendees_present;

    let outcome = detached(async move {
        let meeting: Meeting = store
            .get_as(Collection::Meetings, &meeting_id)
            .await
            .map_err(on_missing("Meeting not found"))?;
        ensure_organizer(&meeting, &auth)?;

        let recorded = record_attendance_rows(store.as_ref(), &meeting, &present).await?;
        let penalized = apply_missed_meeting_penalties(store.as_ref(), &meeting.id, penalty).await?;

        tracing::info!(meeting_id = %meeting.id, recorded, penalized, "Meeting attendance recorded");
        Ok(AttendanceOutcome {
            recorded,
            penalized,
        })
    })
    .await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Re-run the penalty step for a meeting whose attendance is recorded
#[utoipa::path(
    post,
    path = "/api/meetings/{meeting_id}/penalties",
    params(
        ("meeting_id", description = "Meeting ID")
    ),
    responses(
        (status = 200, description = "Penalties applied", body = AttendanceOutcome),
        (status = 400, description = "Attendance not recorded yet"),
        (status = 403, description = "Not the organizer"),
        (status = 404, description = "Meeting not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Meetings"
)]
pub async fn apply_penalties(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    config: web::Data<Config>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let store: Arc<dyn RecordStore> = store.into_inner();
    let penalty = config.missed_meeting_penalty;
    let meeting_id = path.into_inner();

    let outcome = detached(async move {
        let meeting: Meeting = store
            .get_as(Collection::Meetings, &meeting_id)
            .await
            .map_err(on_missing("Meeting not found"))?;
        ensure_organizer(&meeting, &auth)?;

        let penalized = apply_missed_meeting_penalties(store.as_ref(), &meeting.id, penalty).await?;
        Ok(AttendanceOutcome {
            recorded: 0,
            penalized,
        })
    })
    .await?;

    Ok(HttpResponse::Ok().json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use crate::test_support::{admin, as_user, insert, member, test_app};
    use actix_web::{http::StatusCode, test};
    use serde_json::{Value, json};

    async fn add_user(store: &MemoryRecordStore, name: &str) -> String {
        let user = insert(
            store,
            Collection::Users,
            json!({"username": name, "name": name, "email": format!("{name}@example.com"),
                   "role": "Tech", "skillset": [], "password_hash": "x"}),
        )
        .await;
        user["id"].as_str().unwrap().to_string()
    }

    async fn meeting_with(store: &MemoryRecordStore, organizer: &str, attendees: &[String]) -> Meeting {
        let record = insert(
            store,
            Collection::Meetings,
            json!({"title": "Standup", "agenda": "status",
                   "start_time": "2026-01-05T09:00:00.000000Z",
                   "end_time": "2026-01-05T09:15:00.000000Z",
                   "organizer": organizer, "attendees": attendees,
                   "meeting_type": "team",
                   "attendance_tracked": false, "penalties_applied": false}),
        )
        .await;
        crate::store::decode(Collection::Meetings, record).unwrap()
    }

    async fn ledger(store: &MemoryRecordStore) -> Vec<KudosTransaction> {
        store
            .find_as(Collection::KudosTransactions, Query::new())
            .await
            .unwrap()
    }

    #[actix_web::test]
    async fn penalties_are_applied_once_per_absentee() {
        let store = MemoryRecordStore::new();
        let ana = add_user(&store, "ana").await;
        let bo = add_user(&store, "bo").await;
        let meeting = meeting_with(&store, "org-1", &[ana.clone(), bo.clone()]).await;

        let recorded = record_attendance_rows(&store, &meeting, &[ana.clone()]).await.unwrap();
        assert_eq!(recorded, 2);

        assert_eq!(apply_missed_meeting_penalties(&store, &meeting.id, 5).await.unwrap(), 1);
        assert_eq!(apply_missed_meeting_penalties(&store, &meeting.id, 5).await.unwrap(), 0);

        let entries = ledger(&store).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user_id, bo);
        assert_eq!(entries[0].amount, -5);
        assert_eq!(entries[0].given_by, "org-1");
        assert_eq!(entries[0].source_ref, Some(penalty_ref(&meeting.id, &bo)));

        let stored: Meeting = store.get_as(Collection::Meetings, &meeting.id).await.unwrap();
        assert!(stored.attendance_tracked);
        assert!(stored.penalties_applied);
    }

    #[actix_web::test]
    async fn recording_twice_keeps_one_row_and_skips_unknown_invitees() {
        let store = MemoryRecordStore::new();
        let ana = add_user(&store, "ana").await;
        let meeting = meeting_with(&store, "org-1", &[ana.clone(), "ghost".to_string()]).await;

        assert_eq!(record_attendance_rows(&store, &meeting, &[]).await.unwrap(), 1);
        assert_eq!(record_attendance_rows(&store, &meeting, &[]).await.unwrap(), 0);

        let rows: Vec<MeetingAttendance> = store
            .find_as(Collection::MeetingAttendance, Query::new())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, AttendanceMark::Absent);
    }

    #[actix_web::test]
    async fn penalties_need_recorded_attendance() {
        let store = MemoryRecordStore::new();
        let meeting = meeting_with(&store, "org-1", &[]).await;

        let result = apply_missed_meeting_penalties(&store, &meeting.id, 5).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[actix_web::test]
    async fn attendance_endpoint_runs_both_phases() {
        let store = Arc::new(MemoryRecordStore::new());
        let ana = add_user(&store, "ana").await;
        let bo = add_user(&store, "bo").await;
        let meeting = meeting_with(&store, "org-1", &[ana.clone(), bo.clone()]).await;
        let app = test_app!(store.clone());
        let uri = format!("/api/meetings/{}/attendance", meeting.id);

        let forbidden = test::call_service(
            &app,
            as_user(test::TestRequest::post().uri(&uri), &member(&ana, "ana"))
                .set_json(json!({"attendees_present": [ana]}))
                .to_request(),
        )
        .await;
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let outcome: Value = test::call_and_read_body_json(
            &app,
            as_user(test::TestRequest::post().uri(&uri), &member("org-1", "Org"))
                .set_json(json!({"attendees_present": [ana]}))
                .to_request(),
        )
        .await;
        assert_eq!(outcome, json!({"recorded": 2, "penalized": 1}));

        let retry: Value = test::call_and_read_body_json(
            &app,
            as_user(
                test::TestRequest::post().uri(&format!("/api/meetings/{}/penalties", meeting.id)),
                &admin(),
            )
            .to_request(),
        )
        .await;
        assert_eq!(retry, json!({"recorded": 0, "penalized": 0}));

        let rows: Value = test::call_and_read_body_json(
            &app,
            as_user(test::TestRequest::get().uri(&uri), &member(&bo, "bo")).to_request(),
        )
        .await;
        assert_eq!(rows.as_array().map(Vec::len), Some(2));
    }

    #[actix_web::test]
    async fn meetings_must_end_after_they_start() {
        let app = test_app!(Arc::new(MemoryRecordStore::new()));
        let user = member("u1", "Rahim");

        let resp = test::call_service(
            &app,
            as_user(test::TestRequest::post().uri("/api/meetings"), &user)
                .set_json(json!({"title": "Retro", "agenda": "",
                                 "start_time": "2026-02-01T10:00:00Z",
                                 "end_time": "2026-02-01T09:00:00Z"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let created: Meeting = test::call_and_read_body_json(
            &app,
            as_user(test::TestRequest::post().uri("/api/meetings"), &user)
                .set_json(json!({"title": "Retro", "agenda": "",
                                 "start_time": "2026-02-01T10:00:00Z",
                                 "end_time": "2026-02-01T11:00:00Z",
                                 "attendees": ["u2"]}))
                .to_request(),
        )
        .await;
        assert_eq!(created.organizer, "u1");

        let mine: Vec<Meeting> = test::call_and_read_body_json(
            &app,
            as_user(test::TestRequest::get().uri("/api/meetings?user_id=u2"), &user).to_request(),
        )
        .await;
        assert_eq!(mine.len(), 1);
        let none: Vec<Meeting> = test::call_and_read_body_json(
            &app,
            as_user(test::TestRequest::get().uri("/api/meetings?user_id=u3"), &user).to_request(),
        )
        .await;
        assert!(none.is_empty());
    }

    #[actix_web::test]
    async fn organizer_reschedules_but_end_must_follow_start() {
        let store = Arc::new(MemoryRecordStore::new());
        let meeting = meeting_with(&store, "u1", &[]).await;
        let app = test_app!(store.clone());
        let uri = format!("/api/meetings/{}", meeting.id);

        let moved: Meeting = test::call_and_read_body_json(
            &app,
            as_user(test::TestRequest::put().uri(&uri), &member("u1", "Rahim"))
                .set_json(json!({"end_time": "2026-01-05T09:30:00Z", "agenda": "demo"}))
                .to_request(),
        )
        .await;
        assert_eq!(moved.end_time, timestamp::parse("2026-01-05T09:30:00Z").unwrap());
        assert_eq!(moved.start_time, meeting.start_time);
        assert_eq!(moved.organizer, "u1");

        // start moved past the stored end
        let inverted = test::call_service(
            &app,
            as_user(test::TestRequest::put().uri(&uri), &member("u1", "Rahim"))
                .set_json(json!({"start_time": "2026-01-05T10:00:00Z"}))
                .to_request(),
        )
        .await;
        assert_eq!(inverted.status(), StatusCode::BAD_REQUEST);

        let hijack = test::call_service(
            &app,
            as_user(test::TestRequest::put().uri(&uri), &member("u1", "Rahim"))
                .set_json(json!({"organizer": "u2"}))
                .to_request(),
        )
        .await;
        assert_eq!(hijack.status(), StatusCode::BAD_REQUEST);

        let stranger = test::call_service(
            &app,
            as_user(test::TestRequest::put().uri(&uri), &member("u2", "Bo"))
                .set_json(json!({"title": "Mine now"}))
                .to_request(),
        )
        .await;
        assert_eq!(stranger.status(), StatusCode::FORBIDDEN);

        let missing = test::call_service(
            &app,
            as_user(test::TestRequest::put().uri("/api/meetings/nope"), &admin())
                .set_json(json!({"title": "x"}))
                .to_request(),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
