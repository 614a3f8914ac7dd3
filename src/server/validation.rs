//! Configuration validation
//!
//! Security checks run before the listener starts. Findings are logged, not
//! fatal; the returned list is what got logged.

use super::config::AppConfig;
use tracing::warn;

/// Warn about insecure combinations of settings
pub fn validate_config(config: &AppConfig) -> Vec<&'static str> {
    let mut findings = Vec::new();

    if config.terminal.enabled && !config.auth.enabled {
        findings.push(
            "Web terminal is ENABLED while authentication is DISABLED. \
             Anyone who can reach the server gets a shell.",
        );
    }

    if config.terminal.enabled
        && config.server.host == "0.0.0.0"
        && config.terminal.allowed_origins.is_empty()
    {
        findings.push(
            "Server binds all interfaces (0.0.0.0) with no [terminal] allowed_origins. \
             Only same-origin browser pages can connect; set allowed_origins when \
             serving through a proxy.",
        );
    }

    if config.auth.enabled && config.auth.tokens.is_empty() {
        findings.push(
            "Authentication is enabled but no [[auth.tokens]] are configured. \
             Run `termgate token --user <name>` to create one.",
        );
    }

    for finding in &findings {
        warn!("SECURITY WARNING: {}", finding);
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::config::TokenEntry;

    fn token() -> TokenEntry {
        TokenEntry {
            user: "alice".to_string(),
            token_sha256: "ab".repeat(32),
            label: String::new(),
        }
    }

    #[test]
    fn test_secure_config_has_no_findings() {
        let mut config = AppConfig::default();
        config.terminal.enabled = true;
        config.auth.tokens.push(token());
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn test_terminal_without_auth_is_flagged() {
        let mut config = AppConfig::default();
        config.terminal.enabled = true;
        config.auth.enabled = false;
        let findings = validate_config(&config);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("authentication is DISABLED"));
    }

    #[test]
    fn test_public_bind_without_origins_is_flagged() {
        let mut config = AppConfig::default();
        config.terminal.enabled = true;
        config.server.host = "0.0.0.0".to_string();
        config.auth.tokens.push(token());
        assert_eq!(validate_config(&config).len(), 1);

        config.terminal.allowed_origins = vec!["https://term.example.com".to_string()];
        assert!(validate_config(&config).is_empty());
    }
}
