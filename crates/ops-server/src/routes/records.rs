//! Plain CRUD over tenants, tags, queue mappings, user tasks and history.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use ops_core::model::{
    HistoryTaskInfo, NewHistoryTaskInfo, NewTag, NewTaskQueueMapping, NewTenant, NewUserTaskInfo,
    Tag, TaskQueueMapping, Tenant, UserTaskInfo,
};

use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Tenants
// ---------------------------------------------------------------------------

/// POST /tenants
pub async fn create_tenant(
    State(app): State<AppState>,
    Json(body): Json<NewTenant>,
) -> Result<(StatusCode, Json<Tenant>), AppError> {
    let tenant = app.blocking(move |s| s.create_tenant(body)).await?;
    Ok((StatusCode::CREATED, Json(tenant)))
}

/// GET /tenants
pub async fn list_tenants(State(app): State<AppState>) -> Result<Json<Vec<Tenant>>, AppError> {
    Ok(Json(app.blocking(|s| s.list_tenants()).await?))
}

/// GET /tenants/{id}
pub async fn get_tenant(
    State(app): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Tenant>, AppError> {
    Ok(Json(app.blocking(move |s| s.get_tenant(id)).await?))
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// POST /tags
pub async fn create_tag(
    State(app): State<AppState>,
    Json(body): Json<NewTag>,
) -> Result<(StatusCode, Json<Tag>), AppError> {
    let tag = app.blocking(move |s| s.create_tag(body)).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn list_tags(State(app): State<AppState>) -> Result<Json<Vec<Tag>>, AppError> {
    Ok(Json(app.blocking(|s| s.list_tags()).await?))
}

pub async fn get_tag(
    State(app): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Tag>, AppError> {
    Ok(Json(app.blocking(move |s| s.get_tag(id)).await?))
}

/// DELETE /tags/{id}: 204 on success.
pub async fn delete_tag(
    State(app): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    app.blocking(move |s| s.delete_tag(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Task queue mappings
// ---------------------------------------------------------------------------

pub async fn create_mapping(
    State(app): State<AppState>,
    Json(body): Json<NewTaskQueueMapping>,
) -> Result<(StatusCode, Json<TaskQueueMapping>), AppError> {
    let mapping = app.blocking(move |s| s.create_mapping(body)).await?;
    Ok((StatusCode::CREATED, Json(mapping)))
}

pub async fn list_mappings(
    State(app): State<AppState>,
) -> Result<Json<Vec<TaskQueueMapping>>, AppError> {
    Ok(Json(app.blocking(|s| s.list_mappings()).await?))
}

pub async fn get_mapping(
    State(app): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TaskQueueMapping>, AppError> {
    Ok(Json(app.blocking(move |s| s.get_mapping(id)).await?))
}

pub async fn delete_mapping(
    State(app): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    app.blocking(move |s| s.delete_mapping(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// User tasks / history
// ---------------------------------------------------------------------------

/// POST /user-tasks: registers the agent if it is new.
pub async fn create_user_task(
    State(app): State<AppState>,
    Json(body): Json<NewUserTaskInfo>,
) -> Result<Json<UserTaskInfo>, AppError> {
    Ok(Json(app.blocking(move |s| s.create_user_task(body)).await?))
}

pub async fn list_user_tasks(
    State(app): State<AppState>,
) -> Result<Json<Vec<UserTaskInfo>>, AppError> {
    Ok(Json(app.blocking(|s| s.list_user_tasks()).await?))
}

pub async fn create_history(
    State(app): State<AppState>,
    Json(body): Json<NewHistoryTaskInfo>,
) -> Result<Json<HistoryTaskInfo>, AppError> {
    Ok(Json(app.blocking(move |s| s.create_history(body)).await?))
}

pub async fn list_history(
    State(app): State<AppState>,
) -> Result<Json<Vec<HistoryTaskInfo>>, AppError> {
    Ok(Json(app.blocking(|s| s.list_history()).await?))
}

/// GET /history-tasks/task/{task_id}
pub async fn list_history_for_task(
    State(app): State<AppState>,
    Path(task_id): Path<i64>,
) -> Result<Json<Vec<HistoryTaskInfo>>, AppError> {
    Ok(Json(
        app.blocking(move |s| s.list_history_for_task(task_id)).await?,
    ))
}
