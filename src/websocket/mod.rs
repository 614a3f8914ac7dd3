//! WebSocket module for termgate
//!
//! Provides real-time communication endpoints:
//! - /ws/projects/:project_id/terminal - Interactive shell in a project directory
//! - /ws/projects/:project_id/logs - Live tail of a project's activity log

pub mod logs;
pub mod terminal;

pub use logs::logs_handler;
pub use terminal::terminal_handler;

use axum::{routing::get, Router};

/// Create the WebSocket router
pub fn websocket_router() -> Router {
    Router::new()
        .route("/ws/projects/:project_id/terminal", get(terminal_handler))
        .route("/ws/projects/:project_id/logs", get(logs_handler))
}
