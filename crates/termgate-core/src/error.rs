//! Error types for terminal sessions
//!
//! Every failure a terminal connection can hit is a [`SessionError`], and every
//! kind maps onto the WebSocket close code the peer observes.

use crate::pty::PtyError;
use thiserror::Error;

/// WebSocket close codes used by the terminal endpoint
pub mod close_code {
    /// Session finished normally (shell exited)
    pub const NORMAL: u16 = 1000;
    /// Server is shutting down
    pub const GOING_AWAY: u16 = 1001;
    /// Shell could not be resolved or spawned
    pub const INTERNAL_ERROR: u16 = 1011;
    /// No verified identity
    pub const UNAUTHENTICATED: u16 = 4401;
    /// Feature disabled, platform unsupported, origin rejected or identity not allowed
    pub const FORBIDDEN: u16 = 4403;
    /// Unknown project
    pub const NOT_FOUND: u16 = 4404;
    /// Operator went idle
    pub const IDLE_TIMEOUT: u16 = 4408;
    /// Admission ceiling reached
    pub const TOO_MANY_SESSIONS: u16 = 4429;
}

/// Terminal session errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// Web terminal is switched off in configuration
    #[error("web terminal is disabled")]
    FeatureDisabled,

    /// No pseudo-terminal support on this platform
    #[error("web terminal is not supported on this platform")]
    PlatformUnsupported,

    /// Origin header missing, unparsable or not allowed
    #[error("origin not allowed: {origin:?}")]
    OriginRejected {
        /// Declared origin, if any
        origin: Option<String>,
    },

    /// Credential missing or invalid
    #[error("authentication required")]
    Unauthenticated,

    /// Authenticated identity is not on the terminal allow-list
    #[error("user {username} is not allowed to open terminals")]
    IdentityNotPermitted {
        /// Rejected username
        username: String,
    },

    /// Project id does not resolve to a directory
    #[error("project not found: {project_id}")]
    ProjectNotFound {
        /// Requested project id
        project_id: String,
    },

    /// Neither the configured shell nor any fallback could be found
    #[error("no usable shell found")]
    ShellResolutionFailed,

    /// Global or per-identity session ceiling reached
    #[error("terminal session limit reached for {username}")]
    AdmissionRejected {
        /// Identity that was refused
        username: String,
    },

    /// The shell process could not be started
    #[error("failed to start shell: {0}")]
    SpawnFailed(#[from] PtyError),

    /// No activity within the idle timeout
    #[error("idle timeout")]
    IdleTimeout,

    /// The remote peer went away
    #[error("peer disconnected")]
    PeerDisconnected,

    /// Reading or writing the pty failed
    #[error("terminal I/O error: {0}")]
    ProcessIo(String),
}

impl SessionError {
    /// Close code sent to the peer for this error
    #[must_use]
    pub fn close_code(&self) -> u16 {
        match self {
            Self::FeatureDisabled
            | Self::PlatformUnsupported
            | Self::OriginRejected { .. }
            | Self::IdentityNotPermitted { .. } => close_code::FORBIDDEN,
            Self::Unauthenticated => close_code::UNAUTHENTICATED,
            Self::ProjectNotFound { .. } => close_code::NOT_FOUND,
            Self::ShellResolutionFailed | Self::SpawnFailed(_) => close_code::INTERNAL_ERROR,
            Self::AdmissionRejected { .. } => close_code::TOO_MANY_SESSIONS,
            Self::IdleTimeout => close_code::IDLE_TIMEOUT,
            Self::PeerDisconnected | Self::ProcessIo(_) => close_code::NORMAL,
        }
    }

    /// Short close reason sent alongside the close code
    #[must_use]
    pub fn close_reason(&self) -> &'static str {
        match self {
            Self::FeatureDisabled => "terminal disabled",
            Self::PlatformUnsupported => "terminal unsupported",
            Self::OriginRejected { .. } => "origin not allowed",
            Self::Unauthenticated => "authentication required",
            Self::IdentityNotPermitted { .. } => "user not permitted",
            Self::ProjectNotFound { .. } => "project not found",
            Self::ShellResolutionFailed => "shell not found",
            Self::AdmissionRejected { .. } => "too many terminal sessions",
            Self::SpawnFailed(_) => "failed to start shell",
            Self::IdleTimeout => "idle timeout",
            Self::PeerDisconnected => "peer disconnected",
            Self::ProcessIo(_) => "terminal i/o error",
        }
    }

    /// Whether the error happened before any session state was created
    #[must_use]
    pub fn is_pre_acceptance(&self) -> bool {
        !matches!(
            self,
            Self::SpawnFailed(_) | Self::IdleTimeout | Self::PeerDisconnected | Self::ProcessIo(_)
        )
    }
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests;
