//! Server configuration types
//!
//! Every section has serde defaults so a partial file (or none at all) still
//! deserializes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use termgate_core::TerminalSettings;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub projects: ProjectsConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
}

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Token authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cookie carrying the token for browser clients
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
}

fn default_true() -> bool {
    true
}

fn default_cookie_name() -> String {
    "termgate_session".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cookie_name: default_cookie_name(),
            tokens: Vec::new(),
        }
    }
}

/// A token accepted by the server, stored as its SHA-256 digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub user: String,
    pub token_sha256: String,
    #[serde(default)]
    pub label: String,
}

/// Where projects live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectsConfig {
    #[serde(default = "default_dev_root")]
    pub dev_root: String,
}

fn default_dev_root() -> String {
    "~/dev".to_string()
}

impl Default for ProjectsConfig {
    fn default() -> Self {
        Self {
            dev_root: default_dev_root(),
        }
    }
}

/// Per-project activity logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_logs_dir")]
    pub dir: String,
}

fn default_logs_dir() -> String {
    "~/.termgate/logs".to_string()
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            dir: default_logs_dir(),
        }
    }
}

/// `[terminal]` section as written by operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub allowed_users: Vec<String>,
    #[serde(default)]
    pub shell: String,
    #[serde(default = "default_max_sessions_total")]
    pub max_sessions_total: usize,
    #[serde(default = "default_max_sessions_per_user")]
    pub max_sessions_per_user: usize,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_terminate_timeout_ms")]
    pub terminate_timeout_ms: u64,
}

fn default_max_sessions_total() -> usize {
    4
}

fn default_max_sessions_per_user() -> usize {
    2
}

fn default_idle_timeout_secs() -> u64 {
    1800
}

fn default_terminate_timeout_ms() -> u64 {
    2500
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_users: Vec::new(),
            shell: String::new(),
            max_sessions_total: default_max_sessions_total(),
            max_sessions_per_user: default_max_sessions_per_user(),
            idle_timeout_secs: default_idle_timeout_secs(),
            allowed_origins: Vec::new(),
            terminate_timeout_ms: default_terminate_timeout_ms(),
        }
    }
}

impl From<&TerminalConfig> for TerminalSettings {
    fn from(config: &TerminalConfig) -> Self {
        TerminalSettings {
            enabled: config.enabled,
            allowed_users: config.allowed_users.clone(),
            shell: config.shell.clone(),
            max_sessions_total: config.max_sessions_total,
            max_sessions_per_user: config.max_sessions_per_user,
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            allowed_origins: config.allowed_origins.clone(),
            terminate_timeout: Duration::from_millis(config.terminate_timeout_ms),
            ..TerminalSettings::default()
        }
        .normalized()
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
