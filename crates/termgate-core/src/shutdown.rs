//! Graceful Shutdown Manager
//!
//! Coordinates shutdown of live terminal sessions.
//!
//! ## Usage
//!
//! ```ignore
//! let shutdown = ShutdownController::new();
//!
//! // Each session holds a guard and watches the token
//! let Some(_guard) = shutdown.try_register_session() else { return };
//! orchestrator.serve(request, sink, source, shutdown.token()).await;
//!
//! // Trigger shutdown
//! shutdown.shutdown().await;
//! ```

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default drain timeout in seconds
const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 10;

/// Shutdown phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Normal operation
    Running,
    /// Sessions cancelled, waiting for them to tear down
    Draining,
    /// Shutdown complete
    Terminated,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Draining => write!(f, "Draining"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Shutdown controller shared by the server and every session
#[derive(Debug)]
pub struct ShutdownController {
    cancel_token: CancellationToken,
    phase: AtomicU8,
    shutdown_initiated: AtomicBool,
    active_sessions: AtomicUsize,
    drained: Notify,
    timeout: Duration,
}

impl ShutdownController {
    /// Create a new shutdown controller with default timeout
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECS))
    }

    /// Create a new shutdown controller with custom drain timeout
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            cancel_token: CancellationToken::new(),
            phase: AtomicU8::new(ShutdownPhase::Running as u8),
            shutdown_initiated: AtomicBool::new(false),
            active_sessions: AtomicUsize::new(0),
            drained: Notify::new(),
            timeout,
        })
    }

    /// Cancellation token for one session
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> ShutdownPhase {
        match self.phase.load(Ordering::SeqCst) {
            0 => ShutdownPhase::Running,
            1 => ShutdownPhase::Draining,
            _ => ShutdownPhase::Terminated,
        }
    }

    /// Whether new sessions may start
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.phase() == ShutdownPhase::Running
    }

    /// Track a live session until the guard drops
    pub fn register_session(self: &Arc<Self>) -> SessionGuard {
        self.active_sessions.fetch_add(1, Ordering::SeqCst);
        SessionGuard {
            controller: Arc::clone(self),
        }
    }

    /// Register a new session unless shutdown has begun
    ///
    /// The session is counted before the phase is checked, so a drain that
    /// already saw zero sessions can never miss it.
    #[must_use]
    pub fn try_register_session(self: &Arc<Self>) -> Option<SessionGuard> {
        let guard = self.register_session();
        self.is_accepting().then_some(guard)
    }

    /// Number of live sessions
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    fn set_phase(&self, phase: ShutdownPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
        info!(phase = %phase, "Shutdown phase changed");
    }

    /// Cancel all sessions and wait (bounded) for them to tear down
    pub async fn shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Shutdown already initiated");
            return;
        }

        info!(
            active_sessions = self.active_sessions(),
            "Initiating graceful shutdown..."
        );
        self.set_phase(ShutdownPhase::Draining);
        self.cancel_token.cancel();

        let drain = async {
            loop {
                let notified = self.drained.notified();
                if self.active_sessions() == 0 {
                    break;
                }
                notified.await;
            }
        };

        if tokio::time::timeout(self.timeout, drain).await.is_err() {
            warn!(
                active_sessions = self.active_sessions(),
                timeout_secs = self.timeout.as_secs(),
                "Drain timeout exceeded, terminating with live sessions"
            );
        } else {
            info!("All terminal sessions closed");
        }

        self.set_phase(ShutdownPhase::Terminated);
    }
}

/// Guard for a live session
///
/// Decrements the session count when dropped.
#[derive(Debug)]
pub struct SessionGuard {
    controller: Arc<ShutdownController>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.controller.active_sessions.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.controller.drained.notify_waiters();
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

/// Shutdown signal future that drives a [`ShutdownController`]
pub async fn shutdown_signal_with_controller(controller: Arc<ShutdownController>) {
    wait_for_shutdown_signal().await;
    controller.shutdown().await;
}
