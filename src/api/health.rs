//! Health check endpoints with component-level diagnostics.
//!
//! Provides:
//! - `/health` — simple "healthy" + version (for load balancers)
//! - `/health/detailed` — per-component status (pty, projects, sessions)

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use termgate_core::{ProjectResolver, SessionOrchestrator};

use crate::middleware::auth::RequireAuth;

/// Simple health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed health response with per-component checks
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub checks: HealthChecks,
}

/// All component health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub pty: ComponentHealth,
    pub projects: ComponentHealth,
    pub sessions: ComponentHealth,
}

/// Individual component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ComponentHealth {
    fn healthy_with_details(details: serde_json::Value) -> Self {
        Self {
            status: "healthy",
            error: None,
            details: Some(details),
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy",
            error: Some(error),
            details: None,
        }
    }

    fn disabled() -> Self {
        Self {
            status: "disabled",
            error: None,
            details: None,
        }
    }
}

/// Simple health check (for load balancers)
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Detailed health check (requires authentication)
async fn detailed_health_check(
    RequireAuth(_identity): RequireAuth,
    Extension(orchestrator): Extension<Arc<SessionOrchestrator>>,
    Extension(projects): Extension<Arc<dyn ProjectResolver>>,
) -> Json<DetailedHealthResponse> {
    let pty_health = check_pty(&orchestrator);
    let projects_health = check_projects(projects.as_ref());
    let sessions_health = check_sessions(&orchestrator);

    let components = [
        pty_health.status,
        projects_health.status,
        sessions_health.status,
    ];
    let healthy_count = components.iter().filter(|s| **s == "healthy").count();
    let unhealthy_count = components.iter().filter(|s| **s == "unhealthy").count();

    let overall_status = if unhealthy_count == 0 {
        "healthy"
    } else if healthy_count > 0 {
        "degraded"
    } else {
        "unhealthy"
    };

    Json(DetailedHealthResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks {
            pty: pty_health,
            projects: projects_health,
            sessions: sessions_health,
        },
    })
}

fn check_pty(orchestrator: &SessionOrchestrator) -> ComponentHealth {
    if !orchestrator.settings().enabled {
        return ComponentHealth::disabled();
    }
    if orchestrator.platform_supported() {
        ComponentHealth::healthy_with_details(serde_json::json!({
            "shell": orchestrator.settings().shell,
        }))
    } else {
        ComponentHealth::unhealthy("pseudo-terminals are not supported on this platform".into())
    }
}

fn check_projects(projects: &dyn ProjectResolver) -> ComponentHealth {
    match projects.list() {
        Ok(list) => ComponentHealth::healthy_with_details(serde_json::json!({
            "count": list.len(),
        })),
        Err(e) => ComponentHealth::unhealthy(e.to_string()),
    }
}

fn check_sessions(orchestrator: &SessionOrchestrator) -> ComponentHealth {
    let snapshot = orchestrator.admission().snapshot();
    let limits = orchestrator.settings().admission_limits();
    ComponentHealth::healthy_with_details(serde_json::json!({
        "active": snapshot.total,
        "max_total": limits.max_total,
        "max_per_user": limits.max_per_identity,
    }))
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(detailed_health_check))
}
