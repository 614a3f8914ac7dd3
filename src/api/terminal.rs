//! Terminal capability endpoints

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use termgate_core::{AdmissionSnapshot, Capability, SessionOrchestrator};

use crate::middleware::auth::RequireAuth;

/// Whether the caller may open a terminal on this server
async fn get_capability(
    RequireAuth(identity): RequireAuth,
    Extension(orchestrator): Extension<Arc<SessionOrchestrator>>,
) -> Json<Capability> {
    Json(orchestrator.capability(&identity))
}

/// Sessions currently holding admission slots
async fn get_sessions(
    RequireAuth(_identity): RequireAuth,
    Extension(orchestrator): Extension<Arc<SessionOrchestrator>>,
) -> Json<AdmissionSnapshot> {
    Json(orchestrator.admission().snapshot())
}

/// Create terminal routes
pub fn terminal_routes() -> Router {
    Router::new()
        .route("/api/terminal", get(get_capability))
        .route("/api/terminal/sessions", get(get_sessions))
}
