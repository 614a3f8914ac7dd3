//! termgate - project-scoped web terminal bridge
//!
//! CLI entry point for the termgate server.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cli;
mod middleware;
mod server;
mod websocket;

#[cfg(test)]
mod test_support;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // TERMGATE_LOG_FORMAT=json for log shippers
    let json_logs = std::env::var("TERMGATE_LOG_FORMAT").is_ok_and(|v| v == "json");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "termgate=info,termgate_core=info,tower_http=info".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    let cli = cli::Cli::parse();

    if matches!(cli.command, Some(cli::Commands::Serve)) {
        info!("Starting termgate v{}", env!("CARGO_PKG_VERSION"));
    }

    cli::run(cli).await
}
