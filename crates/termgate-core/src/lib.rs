//! Termgate Core - Terminal Bridge Engine
//!
//! This crate provides everything needed to bridge a remote duplex connection
//! to a pseudo-terminal backed shell, including:
//! - Pty: spawning, resizing and terminating shells on a pseudo-terminal
//! - Relay: moving bytes and control messages between peer and pty
//! - Admission: global and per-identity concurrent session ceilings
//! - Origin: connection origin validation
//! - Session: the orchestrator that sequences checks, spawn, relay and teardown
//! - Collaborators: token auth, project resolution, activity logging, shell lookup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod activity_log;
pub mod admission;
pub mod auth;
pub mod error;
pub mod origin;
pub mod projects;
pub mod pty;
pub mod relay;
pub mod session;
pub mod settings;
pub mod shell;
pub mod shutdown;

#[cfg(test)]
mod test_support;

pub use activity_log::{ActivityLog, FileActivityLog, LogFollower};
pub use admission::{
    AdmissionController, AdmissionLimits, AdmissionPermit, AdmissionService, AdmissionSnapshot,
};
pub use auth::{AuthError, AuthStore, Identity, IdentityVerifier};
pub use error::{close_code, Result, SessionError};
pub use origin::is_allowed as is_origin_allowed;
pub use projects::{
    DevRootProjects, ProjectError, ProjectInfo, ProjectResolver, ProjectType, ResolvedProject,
};
pub use pty::{default_provider, PtyError, PtyProvider, TerminalSize};
pub use relay::{DuplexRelay, PeerClosed, PeerFrame, PeerSink, PeerSource, RelayEnd, RelayState};
pub use session::{Capability, ConnectRequest, SessionOrchestrator, SessionReport};
pub use settings::TerminalSettings;
pub use shell::{resolve_shell, ShellCommand};
pub use shutdown::{
    shutdown_signal_with_controller, SessionGuard, ShutdownController, ShutdownPhase,
};
