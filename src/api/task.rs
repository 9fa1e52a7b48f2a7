use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::{on_missing, reject_empty_patch};
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::task::{NewTask, Task, TaskPatch, TaskStatus};
use crate::store::{Collection, Filter, Order, Query, RecordStore, RecordStoreExt};

#[derive(Deserialize, IntoParams)]
pub struct TaskFilter {
    pub project_id: Option<String>,
    /// Assignee
    pub user_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/tasks",
    params(TaskFilter),
    responses(
        (status = 200, description = "Tasks, newest first", body = [Task]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn list_tasks(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    filter: web::Query<TaskFilter>,
) -> actix_web::Result<impl Responder> {
    let TaskFilter {
        project_id,
        user_id,
    } = filter.into_inner();

    let mut query = Query::new().order(Order::desc("created_at"));
    if let Some(project_id) = project_id {
        query = query.filter(Filter::eq("project_id", project_id));
    }
    if let Some(user_id) = user_id {
        query = query.filter(Filter::eq("assigned_to", user_id));
    }

    let tasks: Vec<Task> = store
        .find_as(Collection::Tasks, query)
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(tasks))
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = NewTask,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn create_task(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    payload: web::Json<NewTask>,
) -> actix_web::Result<impl Responder> {
    let mut task = payload.into_inner();
    if task.title.trim().is_empty() {
        return Err(AppError::validation("title must not be empty").into());
    }
    task.status = TaskStatus::Todo;

    let stored: Task = store
        .insert_as(Collection::Tasks, &task)
        .await
        .map_err(AppError::from)?;

    tracing::debug!(task_id = %stored.id, project_id = %stored.project_id, "Task created");
    Ok(HttpResponse::Created().json(stored))
}

#[utoipa::path(
    put,
    path = "/api/tasks/{task_id}",
    request_body = TaskPatch,
    params(
        ("task_id", description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 400, description = "Empty or invalid update"),
        (status = 404, description = "Task not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn update_task(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    path: web::Path<String>,
    payload: web::Json<TaskPatch>,
) -> actix_web::Result<impl Responder> {
    let patch = payload.into_inner();
    reject_empty_patch(patch.is_empty())?;

    let task: Task = store
        .update_as(Collection::Tasks, &path.into_inner(), &patch)
        .await
        .map_err(on_missing("Task not found"))?;

    Ok(HttpResponse::Ok().json(task))
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{task_id}",
    params(
        ("task_id", description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task deleted"),
        (status = 404, description = "Task not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn delete_task(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    store
        .delete(Collection::Tasks, &path.into_inner())
        .await
        .map_err(on_missing("Task not found"))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Task deleted successfully"
    })))
}
