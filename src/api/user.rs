use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::{on_conflict, on_missing, reject_empty_patch};
use crate::auth::auth::AuthUser;
use crate::auth::roster::{Teammate, provision};
use crate::error::AppError;
use crate::model::user::{User, UserPatch, UserProfile};
use crate::store::{Collection, Order, Query, RecordStore, RecordStoreExt, StoreError};

const MIN_PASSWORD_LEN: usize = 8;

/// Teammate to provision plus their initial password.
#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[serde(flatten)]
    pub teammate: Teammate,
    #[schema(example = "change-me-please", min_length = 8)]
    pub password: String,
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users", body = [UserProfile]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
) -> actix_web::Result<impl Responder> {
    let users: Vec<User> = store
        .find_as(Collection::Users, Query::new().order(Order::asc("name")))
        .await
        .map_err(AppError::from)?;

    let profiles: Vec<UserProfile> = users.into_iter().map(UserProfile::from).collect();
    Ok(HttpResponse::Ok().json(profiles))
}

#[utoipa::path(
    get,
    path = "/api/users/{user_id}",
    params(
        ("user_id", description = "User ID")
    ),
    responses(
        (status = 200, description = "User found", body = UserProfile),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let user: User = store
        .get_as(Collection::Users, &path.into_inner())
        .await
        .map_err(on_missing("User not found"))?;

    Ok(HttpResponse::Ok().json(UserProfile::from(user)))
}

/// Provision a teammate (admin only)
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserProfile),
        (status = 400, description = "Invalid payload or email already registered"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn create_user(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    payload: web::Json<CreateUserRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let request = payload.into_inner();
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        ))
        .into());
    }

    let user = match provision(store.get_ref(), &request.teammate, &request.password).await {
        Ok(user) => user,
        Err(AppError::Conflict(_)) => {
            return Err(AppError::conflict("Email already registered").into());
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = %user.id, created_by = %auth.email, "User provisioned");
    Ok(HttpResponse::Created().json(UserProfile::from(user)))
}

/// Update a profile. Admins may edit anyone; members only themselves and
/// never their role.
#[utoipa::path(
    put,
    path = "/api/users/{user_id}",
    request_body = UserPatch,
    params(
        ("user_id", description = "User ID")
    ),
    responses(
        (status = 200, description = "User updated", body = UserProfile),
        (status = 400, description = "Empty or invalid update, or email already registered"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    path: web::Path<String>,
    payload: web::Json<UserPatch>,
) -> actix_web::Result<impl Responder> {
    let user_id = path.into_inner();
    let patch = payload.into_inner().normalized();
    reject_empty_patch(patch.is_empty())?;

    if !auth.is_admin() {
        if auth.user_id != user_id {
            return Err(AppError::Forbidden("Cannot edit another user".to_string()).into());
        }
        if patch.role.is_some() {
            return Err(AppError::Forbidden("Only admins can change roles".to_string()).into());
        }
    }
    if let Some(email) = &patch.email {
        if !email.contains('@') {
            return Err(AppError::validation("email is not valid").into());
        }
    }
    if patch.username.as_deref() == Some("") || patch.name.as_deref() == Some("") {
        return Err(AppError::validation("username and name must not be empty").into());
    }

    let user: User = store
        .update_as(Collection::Users, &user_id, &patch)
        .await
        .map_err(|e| match e {
            StoreError::NotFound { .. } => AppError::not_found("User not found"),
            other => on_conflict("Email already registered")(other),
        })?;

    tracing::info!(user_id = %user.id, updated_by = %auth.email, "User updated");
    Ok(HttpResponse::Ok().json(UserProfile::from(user)))
}

/// Remove a user (admin only)
#[utoipa::path(
    delete,
    path = "/api/users/{user_id}",
    params(
        ("user_id", description = "User ID")
    ),
    responses(
        (status = 200, description = "User deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn delete_user(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let user_id = path.into_inner();
    store
        .delete(Collection::Users, &user_id)
        .await
        .map_err(on_missing("User not found"))?;

    tracing::info!(%user_id, deleted_by = %auth.email, "User deleted");
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "User deleted successfully"
    })))
}
