//! Runtime settings for terminal sessions

use crate::admission::AdmissionLimits;
use crate::pty::TerminalSize;
use std::time::Duration;

/// Smallest idle timeout accepted
pub const MIN_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cooperative-termination wait, applied per signal
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_millis(2500);

/// Default watchdog tick
pub const DEFAULT_WATCHDOG_TICK: Duration = Duration::from_secs(1);

/// Effective terminal settings, already normalised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalSettings {
    /// Whether the web terminal is enabled at all
    pub enabled: bool,
    /// Lowercased usernames allowed to open terminals (empty = everyone authenticated)
    pub allowed_users: Vec<String>,
    /// Configured shell command line (empty = platform default)
    pub shell: String,
    /// Maximum concurrent sessions across all identities
    pub max_sessions_total: usize,
    /// Maximum concurrent sessions per identity
    pub max_sessions_per_user: usize,
    /// Inactivity period after which a session is closed
    pub idle_timeout: Duration,
    /// Exact origins allowed to connect (empty = same host and port only)
    pub allowed_origins: Vec<String>,
    /// How long to wait after each termination signal
    pub terminate_timeout: Duration,
    /// Interval between idle checks
    pub watchdog_tick: Duration,
    /// Window size used when the shell is spawned
    pub initial_size: TerminalSize,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_users: Vec::new(),
            shell: String::new(),
            max_sessions_total: 4,
            max_sessions_per_user: 2,
            idle_timeout: Duration::from_secs(1800),
            allowed_origins: Vec::new(),
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
            watchdog_tick: DEFAULT_WATCHDOG_TICK,
            initial_size: TerminalSize::default(),
        }
    }
}

impl TerminalSettings {
    /// Apply floors and normalise user and origin lists
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.max_sessions_total = self.max_sessions_total.max(1);
        self.max_sessions_per_user = self.max_sessions_per_user.max(1);
        self.idle_timeout = self.idle_timeout.max(MIN_IDLE_TIMEOUT);
        self.allowed_users = self
            .allowed_users
            .iter()
            .map(|user| user.trim().to_lowercase())
            .filter(|user| !user.is_empty())
            .collect();
        self.allowed_origins = self
            .allowed_origins
            .iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        self
    }

    /// Whether `username` passes the allow-list (case-insensitive)
    #[must_use]
    pub fn user_allowed(&self, username: &str) -> bool {
        self.allowed_users.is_empty()
            || self
                .allowed_users
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(username))
    }

    /// Admission ceilings derived from these settings
    #[must_use]
    pub fn admission_limits(&self) -> AdmissionLimits {
        AdmissionLimits {
            max_total: self.max_sessions_total,
            max_per_identity: self.max_sessions_per_user,
        }
    }
}
