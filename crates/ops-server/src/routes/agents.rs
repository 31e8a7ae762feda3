use axum::extract::{Path, Query, State};
use axum::Json;
use ops_core::model::UserTaskInfo;
use ops_core::store::{AgentInfo, CompletedCount};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

/// GET /agents: agent names in alphabetical order.
pub async fn list_agents(State(app): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let rows = app.blocking(|s| s.list_agent_rows()).await?;
    Ok(Json(rows.into_iter().map(|a| a.name).collect()))
}

/// GET /agents/count
pub async fn agent_count(State(app): State<AppState>) -> Result<Json<Value>, AppError> {
    let list = app.blocking(|s| s.list_agents(0)).await?;
    Ok(Json(json!({ "total_agents": list.total_agents })))
}

/// GET /agents/{name}
pub async fn get_agent(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AgentInfo>, AppError> {
    Ok(Json(app.blocking(move |s| s.get_agent_info(&name)).await?))
}

#[derive(Debug, Deserialize)]
pub struct AssignTaskQuery {
    pub task_id: i64,
    #[serde(default)]
    pub workbench_id: Option<i64>,
}

/// POST /agents/{name}/assign-task?task_id=N[&workbench_id=M]
///
/// Registers the agent when it does not exist yet.
pub async fn assign_task(
    State(app): State<AppState>,
    Path(name): Path<String>,
    Query(q): Query<AssignTaskQuery>,
) -> Result<Json<Value>, AppError> {
    let agent = name.clone();
    let task = app
        .blocking(move |s| s.assign_task(&agent, q.task_id, q.workbench_id))
        .await?;
    Ok(Json(json!({
        "message": format!("Task {} assigned to agent '{name}'", task.task_id),
        "task": task,
    })))
}

/// GET /agents/{name}/tasks: 404 when the agent has no tasks.
pub async fn agent_tasks(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<UserTaskInfo>>, AppError> {
    let agent = name.clone();
    let tasks = app.blocking(move |s| s.tasks_for_agent(&agent)).await?;
    if tasks.is_empty() {
        return Err(AppError::not_found(format!("Agent '{name}' not found")));
    }
    Ok(Json(tasks))
}

/// GET /performance/agents/completed
pub async fn completed_by_agent(
    State(app): State<AppState>,
) -> Result<Json<Vec<CompletedCount>>, AppError> {
    Ok(Json(app.blocking(|s| s.completed_by_agent()).await?))
}
