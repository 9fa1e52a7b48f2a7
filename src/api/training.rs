use std::sync::Arc;

use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::{detached, on_conflict, on_missing, reject_empty_patch};
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::kudos::KudosTransaction;
use crate::model::training::{
    CoursePatch, NewTrainingCourse, NewTrainingProgress, TrainingCourse, TrainingProgress,
    TrainingProgressUpdate,
};
use crate::store::{
    Collection, Filter, Order, Query, RecordStore, RecordStoreExt, StoreError,
};

#[derive(Deserialize, IntoParams)]
pub struct ProgressFilter {
    pub user_id: Option<String>,
    pub course_id: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct EnrollRequest {
    pub course_id: String,
}

#[derive(Serialize)]
struct CompletionAward<'a> {
    user_id: &'a str,
    user_name: &'a str,
    amount: i64,
    reason: String,
    category: &'static str,
    given_by: &'static str,
    source_ref: String,
}

/// Idempotency key of the kudos award for one enrollment.
pub(crate) fn completion_ref(progress_id: &str) -> String {
    format!("training:{progress_id}")
}

/// Grants the course reward for `progress`. Returns `false` when the award
/// was already made.
async fn award_completion(
    store: &dyn RecordStore,
    progress: &TrainingProgress,
    course: &TrainingCourse,
) -> Result<bool, AppError> {
    if course.kudos_reward == 0 {
        return Ok(false);
    }

    let award = CompletionAward {
        user_id: &progress.user_id,
        user_name: &progress.user_name,
        amount: i64::from(course.kudos_reward),
        reason: format!("Completed training: {}", course.title),
        category: "training_completion",
        given_by: "system",
        source_ref: completion_ref(&progress.id),
    };

    match store
        .insert_as::<_, KudosTransaction>(Collection::KudosTransactions, &award)
        .await
    {
        Ok(_) => Ok(true),
        Err(StoreError::Conflict { .. }) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Applies a progress update. The first homework submission awards the
/// course's kudos and marks the enrollment completed; a retry after a
/// partial failure does not award twice.
pub(crate) async fn apply_progress_update(
    store: &dyn RecordStore,
    caller: &AuthUser,
    progress_id: &str,
    mut update: TrainingProgressUpdate,
) -> Result<TrainingProgress, AppError> {
    if update.progress > 100 {
        return Err(AppError::validation("progress must be between 0 and 100"));
    }

    let progress: TrainingProgress = store
        .get_as(Collection::TrainingProgress, progress_id)
        .await
        .map_err(on_missing("Progress record not found"))?;

    if progress.user_id != caller.user_id && !caller.is_admin() {
        return Err(AppError::Forbidden(
            "Only the enrolled user can update progress".to_string(),
        ));
    }

    if update.homework_submitted == Some(true) && !progress.completed {
        match store
            .get_as::<TrainingCourse>(Collection::TrainingCourses, &progress.course_id)
            .await
        {
            Ok(course) => {
                if award_completion(store, &progress, &course).await? {
                    tracing::info!(
                        user_id = %progress.user_id,
                        course_id = %course.id,
                        kudos = course.kudos_reward,
                        "Training completion kudos awarded"
                    );
                }
            }
            Err(StoreError::NotFound { .. }) => {
                tracing::warn!(course_id = %progress.course_id, "Course missing, completing without kudos");
            }
            Err(e) => return Err(e.into()),
        }
        update.completed = Some(true);
    }

    Ok(store
        .update_as(Collection::TrainingProgress, progress_id, &update)
        .await?)
}

/// Training courses, newest first
#[utoipa::path(
    get,
    path = "/api/training/courses",
    responses(
        (status = 200, description = "Courses", body = [TrainingCourse]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Training"
)]
pub async fn list_courses(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
) -> actix_web::Result<impl Responder> {
    let courses: Vec<TrainingCourse> = store
        .find_as(
            Collection::TrainingCourses,
            Query::new().order(Order::desc("created_at")),
        )
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(courses))
}

#[utoipa::path(
    post,
    path = "/api/training/courses",
    request_body = NewTrainingCourse,
    responses(
        (status = 201, description = "Course created", body = TrainingCourse),
        (status = 400, description = "Missing title"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Training"
)]
pub async fn create_course(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    payload: web::Json<NewTrainingCourse>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    if payload.title.trim().is_empty() {
        return Err(AppError::validation("title must not be empty").into());
    }

    let course: TrainingCourse = store
        .insert_as(Collection::TrainingCourses, &payload.into_inner())
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Created().json(course))
}

/// Edit a course (admin only)
#[utoipa::path(
    put,
    path = "/api/training/courses/{course_id}",
    request_body = CoursePatch,
    params(
        ("course_id", description = "Course ID")
    ),
    responses(
        (status = 200, description = "Course updated", body = TrainingCourse),
        (status = 400, description = "Empty or invalid update"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Course not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Training"
)]
pub async fn update_course(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    path: web::Path<String>,
    payload: web::Json<CoursePatch>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let patch = payload.into_inner();
    reject_empty_patch(patch.is_empty())?;
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::validation("title must not be empty").into());
    }

    let course: TrainingCourse = store
        .update_as(Collection::TrainingCourses, &path.into_inner(), &patch)
        .await
        .map_err(on_missing("Course not found"))?;

    tracing::info!(course_id = %course.id, kudos_reward = course.kudos_reward, "Course updated");
    Ok(HttpResponse::Ok().json(course))
}

#[utoipa::path(
    get,
    path = "/api/training/progress",
    params(ProgressFilter),
    responses(
        (status = 200, description = "Enrollments", body = [TrainingProgress]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Training"
)]
pub async fn list_progress(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    filter: web::Query<ProgressFilter>,
) -> actix_web::Result<impl Responder> {
    let ProgressFilter { user_id, course_id } = filter.into_inner();

    let mut query = Query::new();
    if let Some(user_id) = user_id {
        query = query.filter(Filter::eq("user_id", user_id));
    }
    if let Some(course_id) = course_id {
        query = query.filter(Filter::eq("course_id", course_id));
    }

    let progress: Vec<TrainingProgress> = store
        .find_as(Collection::TrainingProgress, query)
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(progress))
}

/// Enroll the caller in a course
#[utoipa::path(
    post,
    path = "/api/training/progress",
    request_body = EnrollRequest,
    responses(
        (status = 201, description = "Enrolled", body = TrainingProgress),
        (status = 400, description = "Already enrolled in this course"),
        (status = 404, description = "Course not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Training"
)]
pub async fn enroll(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    payload: web::Json<EnrollRequest>,
) -> actix_web::Result<impl Responder> {
    let course: TrainingCourse = store
        .get_as(Collection::TrainingCourses, &payload.course_id)
        .await
        .map_err(on_missing("Course not found"))?;

    let enrollment = NewTrainingProgress {
        course_id: &course.id,
        user_id: &auth.user_id,
        user_name: &auth.name,
        progress: 0,
        completed: false,
        homework_submitted: false,
    };
    let progress: TrainingProgress = store
        .insert_as(Collection::TrainingProgress, &enrollment)
        .await
        .map_err(on_conflict("Already enrolled in this course"))?;

    tracing::info!(user_id = %auth.user_id, course_id = %course.id, "Enrolled in training");
    Ok(HttpResponse::Created().json(progress))
}

#[utoipa::path(
    put,
    path = "/api/training/progress/{progress_id}",
    request_body = TrainingProgressUpdate,
    params(
        ("progress_id", description = "Enrollment ID")
    ),
    responses(
        (status = 200, description = "Progress updated", body = TrainingProgress),
        (status = 400, description = "Invalid update"),
        (status = 403, description = "Not the enrolled user"),
        (status = 404, description = "Progress record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Training"
)]
pub async fn update_progress(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    path: web::Path<String>,
    payload: web::Json<TrainingProgressUpdate>,
) -> actix_web::Result<impl Responder> {
    let store: Arc<dyn RecordStore> = store.into_inner();
    let progress_id = path.into_inner();
    let update = payload.into_inner();

    let progress = detached(async move {
        apply_progress_update(store.as_ref(), &auth, &progress_id, update).await
    })
    .await?;

    Ok(HttpResponse::Ok().json(progress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use crate::test_support::{admin, as_user, insert, member, test_app};
    use actix_web::{http::StatusCode, test};
    use serde_json::{Value, json};

    async fn enrolled(store: &MemoryRecordStore, reward: u32) -> TrainingProgress {
        let course = insert(
            store,
            Collection::TrainingCourses,
            json!({"title": "Rust", "kudos_reward": reward}),
        )
        .await;
        let progress = insert(
            store,
            Collection::TrainingProgress,
            json!({"course_id": course["id"], "user_id": "u1", "user_name": "Rahim",
                   "progress": 10, "completed": false, "homework_submitted": false}),
        )
        .await;
        crate::store::decode(Collection::TrainingProgress, progress).unwrap()
    }

    fn submission() -> TrainingProgressUpdate {
        TrainingProgressUpdate {
            progress: 100,
            homework_submitted: Some(true),
            homework_url: Some("https://example.com/hw".to_string()),
            completed: None,
        }
    }

    async fn ledger(store: &MemoryRecordStore) -> Vec<KudosTransaction> {
        store
            .find_as(Collection::KudosTransactions, Query::new())
            .await
            .unwrap()
    }

    #[actix_web::test]
    async fn homework_submission_awards_kudos_once() {
        let store = MemoryRecordStore::new();
        let progress = enrolled(&store, 20).await;
        let user = member("u1", "Rahim");

        let updated = apply_progress_update(&store, &user, &progress.id, submission())
            .await
            .unwrap();
        assert!(updated.completed);
        assert_eq!(updated.progress, 100);

        apply_progress_update(&store, &user, &progress.id, submission())
            .await
            .unwrap();

        let awards = ledger(&store).await;
        assert_eq!(awards.len(), 1);
        assert_eq!(awards[0].amount, 20);
        assert_eq!(awards[0].source_ref.as_deref(), Some(completion_ref(&progress.id).as_str()));
    }

    #[actix_web::test]
    async fn retry_after_partial_failure_does_not_award_twice() {
        let store = MemoryRecordStore::new();
        let progress = enrolled(&store, 15).await;
        let course: TrainingCourse = store
            .get_as(Collection::TrainingCourses, &progress.course_id)
            .await
            .unwrap();

        // award landed, completion flag did not
        assert!(award_completion(&store, &progress, &course).await.unwrap());

        let updated = apply_progress_update(&store, &member("u1", "Rahim"), &progress.id, submission())
            .await
            .unwrap();
        assert!(updated.completed);
        assert_eq!(ledger(&store).await.len(), 1);
    }

    #[actix_web::test]
    async fn zero_reward_completes_without_ledger_entry() {
        let store = MemoryRecordStore::new();
        let progress = enrolled(&store, 0).await;

        let updated = apply_progress_update(&store, &admin(), &progress.id, submission())
            .await
            .unwrap();
        assert!(updated.completed);
        assert!(ledger(&store).await.is_empty());
    }

    #[actix_web::test]
    async fn others_cannot_update_someone_elses_progress() {
        let store = MemoryRecordStore::new();
        let progress = enrolled(&store, 5).await;

        let result =
            apply_progress_update(&store, &member("u2", "Bo"), &progress.id, submission()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[actix_web::test]
    async fn enrolling_twice_is_400_and_unknown_course_is_404() {
        let store = Arc::new(MemoryRecordStore::new());
        let course = insert(
            store.as_ref(),
            Collection::TrainingCourses,
            json!({"title": "Rust", "kudos_reward": 5}),
        )
        .await;
        let app = test_app!(store.clone());
        let user = member("u1", "Rahim");

        let enroll = |course_id: Value| {
            as_user(test::TestRequest::post().uri("/api/training/progress"), &user)
                .set_json(json!({ "course_id": course_id }))
                .to_request()
        };

        let first = test::call_service(&app, enroll(course["id"].clone())).await;
        assert_eq!(first.status(), StatusCode::CREATED);
        let second = test::call_service(&app, enroll(course["id"].clone())).await;
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
        let missing = test::call_service(&app, enroll(json!("nope"))).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn progress_over_100_is_rejected_over_http() {
        let store = Arc::new(MemoryRecordStore::new());
        let progress = enrolled(&store, 5).await;
        let app = test_app!(store.clone());

        let resp = test::call_service(
            &app,
            as_user(
                test::TestRequest::put().uri(&format!("/api/training/progress/{}", progress.id)),
                &member("u1", "Rahim"),
            )
            .set_json(json!({"progress": 101}))
            .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let unknown_field = test::call_service(
            &app,
            as_user(
                test::TestRequest::put().uri(&format!("/api/training/progress/{}", progress.id)),
                &member("u1", "Rahim"),
            )
            .set_json(json!({"progress": 50, "completed": true}))
            .to_request(),
        )
        .await;
        assert_eq!(unknown_field.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn admins_create_courses_with_files_and_edit_them() {
        let app = test_app!(Arc::new(MemoryRecordStore::new()));

        let created: TrainingCourse = test::call_and_read_body_json(
            &app,
            as_user(test::TestRequest::post().uri("/api/training/courses"), &admin())
                .set_json(json!({"title": "Rust", "files": ["https://cdn.example.com/slides.pdf"],
                                 "kudos_reward": 10}))
                .to_request(),
        )
        .await;
        assert_eq!(created.files, vec!["https://cdn.example.com/slides.pdf".to_string()]);

        let uri = format!("/api/training/courses/{}", created.id);
        let edited: TrainingCourse = test::call_and_read_body_json(
            &app,
            as_user(test::TestRequest::put().uri(&uri), &admin())
                .set_json(json!({"kudos_reward": 25, "files": []}))
                .to_request(),
        )
        .await;
        assert_eq!(edited.kudos_reward, 25);
        assert!(edited.files.is_empty());
        assert_eq!(edited.title, "Rust");

        let by_member = test::call_service(
            &app,
            as_user(test::TestRequest::put().uri(&uri), &member("u1", "Rahim"))
                .set_json(json!({"title": "Mine"}))
                .to_request(),
        )
        .await;
        assert_eq!(by_member.status(), StatusCode::FORBIDDEN);

        let unknown = test::call_service(
            &app,
            as_user(test::TestRequest::put().uri(&uri), &admin())
                .set_json(json!({"id": "other"}))
                .to_request(),
        )
        .await;
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

        let missing = test::call_service(
            &app,
            as_user(test::TestRequest::put().uri("/api/training/courses/nope"), &admin())
                .set_json(json!({"title": "x"}))
                .to_request(),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
