//! CLI module for termgate
//!
//! Provides commands:
//! - `serve`: Start the HTTP/WebSocket server
//! - `token`: Generate an access token and the config entry for it

use crate::server::config::TokenEntry;
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use termgate_core::AuthStore;

/// termgate web terminal bridge
#[derive(Parser, Debug)]
#[command(name = "termgate")]
#[command(about = "Project-scoped web terminal bridge")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server
    Serve,
    /// Generate an access token for a user
    Token {
        /// Username the token authenticates as
        #[arg(long)]
        user: String,
        /// Free-form label shown in logs
        #[arg(long, default_value = "")]
        label: String,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Serve) => crate::server::run().await,
        Some(Commands::Token { user, label }) => {
            let (token, snippet) = generate_token(&user, &label)?;
            println!("Token for '{}' (shown once, store it now):\n", user);
            println!("  {}\n", token);
            println!("Add to config/local.toml:\n");
            println!("{}", snippet);
            Ok(())
        }
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct AuthSection {
    tokens: Vec<TokenEntry>,
}

#[derive(Serialize)]
struct TokenSnippet {
    auth: AuthSection,
}

/// Generate a raw token and the `[[auth.tokens]]` TOML that accepts it
fn generate_token(user: &str, label: &str) -> anyhow::Result<(String, String)> {
    let user = user.trim();
    anyhow::ensure!(!user.is_empty(), "--user must not be empty");

    let store = AuthStore::new(true);
    let (token, token_sha256) = store
        .generate_token(user, label)
        .context("Failed to generate token")?;

    let snippet = toml::to_string(&TokenSnippet {
        auth: AuthSection {
            tokens: vec![TokenEntry {
                user: user.to_string(),
                token_sha256,
                label: label.to_string(),
            }],
        },
    })
    .context("Failed to render config entry")?;

    Ok((token, snippet))
}
