use actix_web::{HttpResponse, Responder, web};
use tracing::{debug, info, instrument};

use crate::{
    auth::{jwt::generate_access_token, password::verify_password},
    config::Config,
    error::AppError,
    model::{role::Role, user::User},
    models::{LoginRequest, LoginResponse},
    store::{Collection, Filter, Query, RecordStore, RecordStoreExt},
};

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".to_string())
}

/// Exchange email and password for a bearer token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Email and password required"),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(store, config, payload),
    fields(email = %payload.email)
)]
pub async fn login(
    payload: web::Json<LoginRequest>,
    store: web::Data<dyn RecordStore>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    info!("Login request received");

    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        info!("Validation failed: empty email or password");
        return Err(AppError::validation("Email and password required").into());
    }

    debug!("Fetching user from record store");

    let user = store
        .find_as::<User>(
            Collection::Users,
            Query::new().filter(Filter::eq("email", email)).limit(1),
        )
        .await
        .map_err(AppError::from)?
        .into_iter()
        .next();

    let Some(user) = user else {
        info!("Invalid credentials: user not found");
        return Err(invalid_credentials().into());
    };

    if let Err(e) = verify_password(&payload.password, &user.password_hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(invalid_credentials().into());
    }

    let role = Role::from_title(&user.role);
    let token = generate_access_token(
        &user.id,
        &user.email,
        &user.name,
        role,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| {
        tracing::error!(error = %e, user_id = %user.id, "Failed to sign access token");
        AppError::Internal
    })?;

    info!(user_id = %user.id, %role, "Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        user: user.into(),
        token,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::auth::roster::{Teammate, provision};
    use crate::store::MemoryRecordStore;
    use crate::test_support::{FailingStore, anonymous, test_app};
    use actix_web::{http::StatusCode, test};
    use serde_json::{Value, json};

    #[actix_web::test]
    async fn login_issues_a_token_that_opens_the_api() {
        let store = Arc::new(MemoryRecordStore::new());
        let teammate = Teammate {
            username: "asha".into(),
            name: "Asha".into(),
            email: "asha@example.com".into(),
            role: "Admin".into(),
            contact: None,
            skillset: vec![],
        };
        provision(store.as_ref(), &teammate, "correct horse").await.unwrap();
        let app = test_app!(store.clone());

        let body: Value = test::call_and_read_body_json(
            &app,
            anonymous(test::TestRequest::post().uri("/api/auth/login"))
                .set_json(json!({"email": " ASHA@example.com", "password": "correct horse"}))
                .to_request(),
        )
        .await;
        assert_eq!(body["user"]["name"], "Asha");
        assert!(body["user"].get("password_hash").is_none());

        let token = body["token"].as_str().unwrap();
        let resp = test::call_service(
            &app,
            anonymous(test::TestRequest::get().uri("/api/users"))
                .insert_header(("Authorization", format!("Bearer {token}")))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        // login only lives under the API prefix
        let unprefixed = test::call_service(
            &app,
            anonymous(test::TestRequest::post().uri("/auth/login"))
                .set_json(json!({"email": "asha@example.com", "password": "correct horse"}))
                .to_request(),
        )
        .await;
        assert_eq!(unprefixed.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn wrong_password_and_unknown_email_are_401() {
        let store = Arc::new(MemoryRecordStore::new());
        let teammate = Teammate {
            username: "bo".into(),
            name: "Bo".into(),
            email: "bo@example.com".into(),
            role: "Tech".into(),
            contact: None,
            skillset: vec![],
        };
        provision(store.as_ref(), &teammate, "right-one").await.unwrap();
        let app = test_app!(store.clone());

        for (email, password) in [("bo@example.com", "wrong-one"), ("ghost@example.com", "right-one")] {
            let resp = test::call_service(
                &app,
                anonymous(test::TestRequest::post().uri("/api/auth/login"))
                    .set_json(json!({"email": email, "password": password}))
                    .to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[actix_web::test]
    async fn store_outage_is_500() {
        let app = test_app!(Arc::new(FailingStore));

        let resp = test::call_service(
            &app,
            anonymous(test::TestRequest::post().uri("/api/auth/login"))
                .set_json(json!({"email": "bo@example.com", "password": "x"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
