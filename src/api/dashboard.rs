use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::aggregate;
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::store::RecordStore;

#[derive(Deserialize, IntoParams)]
pub struct DashboardQuery {
    /// Adds this user's personal figures to the report
    pub user_id: Option<String>,
}

/// Dashboard statistics
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Dashboard report", body = crate::aggregate::DashboardStats),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Record store unavailable", body = Object, example = json!({
            "message": "record store unavailable"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Dashboard"
)]
pub async fn stats(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    query: web::Query<DashboardQuery>,
) -> actix_web::Result<impl Responder> {
    let user_id = query.user_id.as_deref().filter(|id| !id.is_empty());

    let stats = aggregate::dashboard_stats(store.get_ref(), user_id, Utc::now())
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(stats))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::store::{Collection, MemoryRecordStore};
    use crate::test_support::{FailingStore, as_user, insert, member, test_app};
    use actix_web::{http::StatusCode, test};
    use serde_json::{Value, json};

    #[actix_web::test]
    async fn stats_are_500_when_store_is_down() {
        let app = test_app!(Arc::new(FailingStore));

        let resp = test::call_service(
            &app,
            as_user(test::TestRequest::get().uri("/api/dashboard/stats"), &member("u1", "R"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "record store unavailable");
    }

    #[actix_web::test]
    async fn stats_include_personal_fields_only_for_a_user() {
        let store = Arc::new(MemoryRecordStore::new());
        insert(
            store.as_ref(),
            Collection::Tasks,
            json!({"project_id": "p1", "title": "t", "assigned_to": "u1", "status": "todo",
                   "priority": "high"}),
        )
        .await;
        let app = test_app!(store.clone());
        let user = member("u1", "R");

        let global: Value = test::call_and_read_body_json(
            &app,
            as_user(test::TestRequest::get().uri("/api/dashboard/stats"), &user).to_request(),
        )
        .await;
        assert_eq!(global["total_tasks"], 1);
        assert!(global.get("my_tasks").is_none());

        let personal: Value = test::call_and_read_body_json(
            &app,
            as_user(test::TestRequest::get().uri("/api/dashboard/stats?user_id=u1"), &user)
                .to_request(),
        )
        .await;
        assert_eq!(personal["my_tasks"], 1);
        assert_eq!(personal["kudos_balance"], 0);
        assert_eq!(personal["assigned_tasks"][0]["title"], "t");
        assert_eq!(personal["upcoming_meetings"], json!([]));
    }
}
