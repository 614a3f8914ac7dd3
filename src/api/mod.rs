//! Web API module for termgate
//!
//! Provides REST API endpoints for:
//! - Health checks
//! - Terminal capability and active sessions
//! - Project listing and activity logs

pub mod health;
pub mod projects;
pub mod terminal;

use axum::Router;

pub use health::health_routes;
pub use projects::projects_routes;
pub use terminal::terminal_routes;

/// Create the API router with all authenticated endpoints
pub fn api_router() -> Router {
    Router::new()
        .merge(terminal_routes())
        .merge(projects_routes())
}
