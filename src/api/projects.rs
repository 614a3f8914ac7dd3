//! Project listing and activity log endpoints

use axum::extract::{Extension, Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use futures_util::future::join_all;
use termgate_core::projects::describe;
use termgate_core::{FileActivityLog, ProjectInfo, ProjectResolver};
use tracing::error;

use crate::middleware::auth::RequireAuth;

const DEFAULT_LOG_LINES: usize = 200;
const MAX_LOG_LINES: usize = 2000;

/// Error body for project endpoints
#[derive(Debug, Serialize)]
struct ApiError {
    success: bool,
    error: String,
}

fn api_error(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ApiError {
            success: false,
            error: error.into(),
        }),
    )
        .into_response()
}

/// `?lines=N` for the log tail
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub lines: Option<usize>,
}

/// Tail of a project's activity log
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub lines: Vec<String>,
}

async fn list_projects(
    RequireAuth(_identity): RequireAuth,
    Extension(projects): Extension<Arc<dyn ProjectResolver>>,
) -> Result<Json<Vec<ProjectInfo>>, Response> {
    let resolved = projects.list().map_err(|e| {
        error!(error = %e, "Failed to list projects");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(join_all(resolved.iter().map(describe)).await))
}

async fn project_logs(
    RequireAuth(_identity): RequireAuth,
    Path(project_id): Path<String>,
    Query(query): Query<LogsQuery>,
    Extension(projects): Extension<Arc<dyn ProjectResolver>>,
    Extension(activity_log): Extension<Arc<FileActivityLog>>,
) -> Result<Json<LogsResponse>, Response> {
    if projects.resolve(&project_id).is_none() {
        return Err(api_error(StatusCode::NOT_FOUND, "Project not found"));
    }

    let limit = query
        .lines
        .unwrap_or(DEFAULT_LOG_LINES)
        .clamp(1, MAX_LOG_LINES);
    activity_log
        .tail(&project_id, limit)
        .map(|lines| Json(LogsResponse { lines }))
        .map_err(|e| {
            error!(project_id = %project_id, error = %e, "Failed to read activity log");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read activity log")
        })
}

/// Create project routes
pub fn projects_routes() -> Router {
    Router::new()
        .route("/api/projects", get(list_projects))
        .route("/api/projects/:project_id/logs", get(project_logs))
}
