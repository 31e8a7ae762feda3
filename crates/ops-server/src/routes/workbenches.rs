use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use ops_core::model::{NewWorkbench, Workbench};
use ops_core::roles::{CoverageReport, RoleSuggestion, WorkbenchRoles};
use ops_core::OpsError;

use crate::error::AppError;
use crate::state::AppState;

/// GET /workbenches
pub async fn list_workbenches(
    State(app): State<AppState>,
) -> Result<Json<Vec<Workbench>>, AppError> {
    Ok(Json(app.blocking(|s| s.list_workbenches()).await?))
}

/// POST /workbenches: 409 when the name is taken.
pub async fn create_workbench(
    State(app): State<AppState>,
    Json(body): Json<NewWorkbench>,
) -> Result<(StatusCode, Json<Workbench>), AppError> {
    let wb = app.blocking(move |s| s.create_workbench(body)).await?;
    Ok((StatusCode::CREATED, Json(wb)))
}

/// GET /workbenches/{id}/roles
pub async fn workbench_roles(
    State(app): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<WorkbenchRoles>, AppError> {
    let roles = app
        .blocking(move |s| {
            s.get_workbench_role_assignments(id)?
                .ok_or(OpsError::WorkbenchNotFound(id))
        })
        .await?;
    Ok(Json(roles))
}

/// GET /workbenches/coverage
pub async fn coverage(State(app): State<AppState>) -> Result<Json<CoverageReport>, AppError> {
    Ok(Json(app.blocking(|s| s.get_workbench_coverage_report()).await?))
}

/// GET /workbenches/suggestions
pub async fn suggestions(
    State(app): State<AppState>,
) -> Result<Json<Vec<RoleSuggestion>>, AppError> {
    Ok(Json(app.blocking(|s| s.suggest_role_assignments()).await?))
}
