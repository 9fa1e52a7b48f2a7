use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::{on_missing, reject_empty_patch};
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::project::{NewProject, Project, ProjectPatch};
use crate::store::{Collection, Filter, Order, Query, RecordStore, RecordStoreExt};

#[derive(Deserialize, IntoParams)]
pub struct ProjectFilter {
    /// Only projects this user is assigned to
    pub user_id: Option<String>,
}

/// Projects, newest first
#[utoipa::path(
    get,
    path = "/api/projects",
    params(ProjectFilter),
    responses(
        (status = 200, description = "Projects", body = [Project]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn list_projects(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    filter: web::Query<ProjectFilter>,
) -> actix_web::Result<impl Responder> {
    let mut query = Query::new().order(Order::desc("created_at"));
    if let Some(user_id) = filter.into_inner().user_id {
        query = query.filter(Filter::contains("assigned_members", user_id));
    }

    let projects: Vec<Project> = store
        .find_as(Collection::Projects, query)
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(projects))
}

#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = NewProject,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn create_project(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    payload: web::Json<NewProject>,
) -> actix_web::Result<impl Responder> {
    let project = payload.into_inner();
    if project.name.trim().is_empty() {
        return Err(AppError::validation("name must not be empty").into());
    }

    let stored: Project = store
        .insert_as(Collection::Projects, &project)
        .await
        .map_err(AppError::from)?;

    tracing::info!(project_id = %stored.id, created_by = %auth.user_id, "Project created");
    Ok(HttpResponse::Created().json(stored))
}

#[utoipa::path(
    put,
    path = "/api/projects/{project_id}",
    request_body = ProjectPatch,
    params(
        ("project_id", description = "Project ID")
    ),
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 400, description = "Empty or invalid update"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn update_project(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    path: web::Path<String>,
    payload: web::Json<ProjectPatch>,
) -> actix_web::Result<impl Responder> {
    let patch = payload.into_inner();
    reject_empty_patch(patch.is_empty())?;
    if patch.progress.is_some_and(|p| p > 100) {
        return Err(AppError::validation("progress must be between 0 and 100").into());
    }
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::validation("name must not be empty").into());
    }

    let project: Project = store
        .update_as(Collection::Projects, &path.into_inner(), &patch)
        .await
        .map_err(on_missing("Project not found"))?;

    Ok(HttpResponse::Ok().json(project))
}

#[utoipa::path(
    delete,
    path = "/api/projects/{project_id}",
    params(
        ("project_id", description = "Project ID")
    ),
    responses(
        (status = 200, description = "Project deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn delete_project(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let project_id = path.into_inner();

    store
        .delete(Collection::Projects, &project_id)
        .await
        .map_err(on_missing("Project not found"))?;

    tracing::info!(project_id = %project_id, "Project deleted");
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Project deleted successfully"
    })))
}
