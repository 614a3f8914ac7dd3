//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let env_name = std::env::var("TERMGATE_ENV").unwrap_or_else(|_| "development".to_string());

    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name(&format!("config/{}", env_name)).required(false))
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority)
        // TERMGATE_TERMINAL__ENABLED=true, TERMGATE_TERMINAL__ALLOWED_USERS=alice,bob
        .add_source(
            Environment::with_prefix("TERMGATE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("terminal.allowed_users")
                .with_list_parse_key("terminal.allowed_origins"),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_deserialize() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8787);
        assert!(!config.terminal.enabled);
        assert_eq!(config.terminal.max_sessions_per_user, 2);
        assert_eq!(config.terminal.terminate_timeout_ms, 2500);
        assert_eq!(config.projects.dev_root, "~/dev");
        assert!(config.auth.tokens.is_empty());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let overrides = r#"
            [terminal]
            enabled = true
            allowed_users = ["alice"]

            [[auth.tokens]]
            user = "alice"
            token_sha256 = "00"
        "#;
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from_str(overrides, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(config.terminal.enabled);
        assert_eq!(config.terminal.allowed_users, vec!["alice"]);
        assert_eq!(config.terminal.idle_timeout_secs, 1800);
        assert_eq!(config.auth.tokens.len(), 1);
        assert_eq!(config.auth.tokens[0].label, "");
    }
}
