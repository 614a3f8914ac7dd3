//! Server initialization
//!
//! Builds the shared components from configuration, wires the router and
//! runs it until a shutdown signal arrives.

use super::config::{expand_home, AppConfig};
use super::loader::load_config;
use super::validation::validate_config;
use crate::middleware::auth::AuthState;
use anyhow::{Context, Result};
use axum::{routing::get, Extension, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use termgate_core::{
    default_provider, shutdown_signal_with_controller, AdmissionController, AuthStore,
    DevRootProjects, FileActivityLog, ProjectResolver, PtyProvider, SessionOrchestrator,
    ShutdownController, TerminalSettings,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Everything the router needs, shared across requests
#[derive(Clone)]
pub struct AppComponents {
    pub auth: AuthState,
    pub orchestrator: Arc<SessionOrchestrator>,
    pub projects: Arc<dyn ProjectResolver>,
    pub activity_log: Arc<FileActivityLog>,
    pub shutdown: Arc<ShutdownController>,
}

/// Build components with the platform's pty provider
pub fn build_components(config: &AppConfig) -> Result<AppComponents> {
    build_components_with(config, default_provider())
}

/// Build components with an explicit pty provider
pub fn build_components_with(
    config: &AppConfig,
    pty: Arc<dyn PtyProvider>,
) -> Result<AppComponents> {
    let auth_store = Arc::new(AuthStore::new(config.auth.enabled));
    for entry in &config.auth.tokens {
        auth_store
            .register_hashed(&entry.user, &entry.token_sha256, &entry.label)
            .with_context(|| format!("Invalid token_sha256 for user '{}'", entry.user))?;
    }
    if config.auth.enabled {
        info!(tokens = auth_store.active_token_count(), "Token authentication enabled");
    } else {
        warn!(
            "Authentication disabled; every request is '{}'",
            termgate_core::auth::ANONYMOUS_USER
        );
    }

    let dev_root = expand_home(&config.projects.dev_root);
    let logs_dir = expand_home(&config.logs.dir);
    let projects: Arc<dyn ProjectResolver> =
        Arc::new(DevRootProjects::new(&dev_root).exclude(&logs_dir));
    let activity_log = Arc::new(FileActivityLog::new(&logs_dir));

    let settings = TerminalSettings::from(&config.terminal);
    info!(
        enabled = settings.enabled,
        supported = pty.is_supported(),
        max_sessions_total = settings.max_sessions_total,
        max_sessions_per_user = settings.max_sessions_per_user,
        idle_timeout_secs = settings.idle_timeout.as_secs(),
        dev_root = %dev_root.display(),
        "Web terminal configured"
    );

    let orchestrator = Arc::new(SessionOrchestrator::new(
        settings,
        auth_store.clone(),
        projects.clone(),
        activity_log.clone(),
        Arc::new(AdmissionController::new()),
        pty,
    ));

    Ok(AppComponents {
        auth: AuthState::new(auth_store, config.auth.cookie_name.clone()),
        orchestrator,
        projects,
        activity_log,
        shutdown: ShutdownController::new(),
    })
}

/// Build the main router with all endpoints
pub fn build_router(components: &AppComponents) -> Router {
    Router::new()
        // Health endpoints (/health public for LB, /health/detailed requires auth)
        .merge(crate::api::health_routes())
        // API routes (auth applied per-handler via RequireAuth extractor)
        .merge(crate::api::api_router())
        // WebSocket routes (auth checked by the session orchestrator)
        .merge(crate::websocket::websocket_router())
        .route("/", get(|| async { "termgate" }))
        // Layers (applied to all routes)
        .layer(Extension(components.auth.clone()))
        .layer(Extension(components.orchestrator.clone()))
        .layer(Extension(components.projects.clone()))
        .layer(Extension(components.activity_log.clone()))
        .layer(Extension(components.shutdown.clone()))
        .layer(TraceLayer::new_for_http())
}

/// Run the server
pub async fn run() -> Result<()> {
    let config = load_config()?;
    validate_config(&config);

    let components = build_components(&config)?;
    let app = build_router(&components);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("HTTP server listening on http://{}", addr);

    let server_shutdown = components.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_controller(server_shutdown))
        .await
        .context("HTTP server error")?;

    info!("termgate shutdown complete");
    Ok(())
}
