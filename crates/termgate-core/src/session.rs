//! Terminal session orchestration
//!
//! A connection goes through: feature enabled → platform supported → origin →
//! identity → allow-list → project → shell → admission → spawn → `ready` →
//! relay → teardown. Any check failing closes the connection with its code
//! before state is created. Once admitted, teardown runs exactly once on every
//! path: the process is terminated, the admission slot released and the end
//! line written.

use crate::activity_log::ActivityLog;
use crate::admission::{AdmissionPermit, AdmissionService};
use crate::auth::{Identity, IdentityVerifier};
use crate::error::{Result, SessionError};
use crate::origin;
use crate::projects::{ProjectResolver, ResolvedProject};
use crate::pty::{self, ChildProcess, PtyMaster, PtyProvider, SpawnRequest};
use crate::relay::protocol::ServerControl;
use crate::relay::{DuplexRelay, PeerSink, PeerSource, RelayConfig, RelayEnd, RelayIo};
use crate::settings::TerminalSettings;
use crate::shell::{resolve_shell, ShellCommand};
use chrono::Local;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a client may ask about before connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capability {
    /// Platform can run terminals
    pub supported: bool,
    /// Feature enabled for this caller
    pub enabled: bool,
}

/// An incoming terminal connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Requested project id
    pub project_id: String,
    /// `Origin` header, if present
    pub origin: Option<String>,
    /// `Host` header, if present
    pub host: Option<String>,
    /// Credential presented with the connection
    pub credential: Option<String>,
}

/// Outcome of a finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Why the relay stopped
    pub end: RelayEnd,
    /// Exit code of the shell (0 if unknown)
    pub exit_code: i32,
}

/// An admitted session with a running shell
pub struct TerminalSession {
    identity: Identity,
    project: ResolvedProject,
    command: ShellCommand,
    process: Box<dyn ChildProcess>,
    master: Box<dyn PtyMaster>,
    permit: AdmissionPermit,
}

impl TerminalSession {
    /// Who owns the session
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Project the shell runs in
    #[must_use]
    pub fn project(&self) -> &ResolvedProject {
        &self.project
    }

    /// Shell that was started
    #[must_use]
    pub fn command(&self) -> &ShellCommand {
        &self.command
    }
}

impl std::fmt::Debug for TerminalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSession")
            .field("identity", &self.identity)
            .field("project_id", &self.project.id)
            .field("command", &self.command)
            .field("pid", &self.process.pid())
            .finish_non_exhaustive()
    }
}

/// Sequences terminal sessions
pub struct SessionOrchestrator {
    settings: TerminalSettings,
    identities: Arc<dyn IdentityVerifier>,
    projects: Arc<dyn ProjectResolver>,
    activity_log: Arc<dyn ActivityLog>,
    admission: Arc<dyn AdmissionService>,
    pty: Arc<dyn PtyProvider>,
}

impl SessionOrchestrator {
    /// Wire an orchestrator from its collaborators
    pub fn new(
        settings: TerminalSettings,
        identities: Arc<dyn IdentityVerifier>,
        projects: Arc<dyn ProjectResolver>,
        activity_log: Arc<dyn ActivityLog>,
        admission: Arc<dyn AdmissionService>,
        pty: Arc<dyn PtyProvider>,
    ) -> Self {
        Self {
            settings,
            identities,
            projects,
            activity_log,
            admission,
            pty,
        }
    }

    /// Effective settings
    #[must_use]
    pub fn settings(&self) -> &TerminalSettings {
        &self.settings
    }

    /// Shared admission bookkeeping
    #[must_use]
    pub fn admission(&self) -> &Arc<dyn AdmissionService> {
        &self.admission
    }

    /// Whether this platform can run terminals at all
    #[must_use]
    pub fn platform_supported(&self) -> bool {
        self.pty.is_supported()
    }

    /// Whether `identity` could open a terminal here
    #[must_use]
    pub fn capability(&self, identity: &Identity) -> Capability {
        Capability {
            supported: self.platform_supported(),
            enabled: self.settings.enabled && self.settings.user_allowed(&identity.username),
        }
    }

    /// Run one connection to completion
    ///
    /// Rejections close the peer with the error's close code and are
    /// returned; admitted sessions always produce a report.
    pub async fn serve(
        &self,
        request: ConnectRequest,
        mut sink: Box<dyn PeerSink>,
        source: Box<dyn PeerSource>,
        shutdown: CancellationToken,
    ) -> Result<SessionReport> {
        match self.admit(&request) {
            Ok(session) => Ok(self.run(session, sink, source, shutdown).await),
            Err(e) => {
                info!(
                    project_id = %request.project_id,
                    code = e.close_code(),
                    error = %e,
                    "Terminal connection rejected"
                );
                if sink.close(e.close_code(), e.close_reason()).await.is_err() {
                    debug!("Peer gone before rejection could be sent");
                }
                Err(e)
            }
        }
    }

    /// Run every check, take an admission slot and spawn the shell
    pub fn admit(&self, request: &ConnectRequest) -> Result<TerminalSession> {
        if !self.settings.enabled {
            return Err(SessionError::FeatureDisabled);
        }
        if !self.pty.is_supported() {
            return Err(SessionError::PlatformUnsupported);
        }
        if !origin::is_allowed(
            request.origin.as_deref(),
            request.host.as_deref(),
            &self.settings.allowed_origins,
        ) {
            return Err(SessionError::OriginRejected {
                origin: request.origin.clone(),
            });
        }

        let identity = self
            .identities
            .verify(request.credential.as_deref())
            .map_err(|e| {
                debug!(error = %e, "Terminal credential rejected");
                SessionError::Unauthenticated
            })?;
        if !self.settings.user_allowed(&identity.username) {
            return Err(SessionError::IdentityNotPermitted {
                username: identity.username,
            });
        }

        let project = self.projects.resolve(&request.project_id).ok_or_else(|| {
            SessionError::ProjectNotFound {
                project_id: request.project_id.clone(),
            }
        })?;
        let command =
            resolve_shell(&self.settings.shell).ok_or(SessionError::ShellResolutionFailed)?;

        let permit = AdmissionPermit::try_acquire(
            &self.admission,
            &identity.username,
            self.settings.admission_limits(),
        )
        .ok_or_else(|| SessionError::AdmissionRejected {
            username: identity.username.clone(),
        })?;

        self.log_line(
            &project.id,
            &format!("terminal start user={}", identity.username),
        );

        let spawned = self.pty.spawn(&SpawnRequest {
            command: command.clone(),
            working_dir: project.abs_path.clone(),
            size: self.settings.initial_size,
        });
        let handles = match spawned {
            Ok(handles) => handles,
            Err(e) => {
                error!(
                    user = %identity.username,
                    project_id = %project.id,
                    command = %command,
                    error = %e,
                    "Failed to spawn shell"
                );
                permit.release();
                self.log_end(&project.id, &identity.username, 0);
                return Err(SessionError::SpawnFailed(e));
            }
        };

        info!(
            user = %identity.username,
            project_id = %project.id,
            pid = ?handles.process.pid(),
            command = %command,
            "Terminal session started"
        );

        Ok(TerminalSession {
            identity,
            project,
            command,
            process: handles.process,
            master: handles.master,
            permit,
        })
    }

    /// Announce the session, relay until it ends, then tear down
    pub async fn run(
        &self,
        session: TerminalSession,
        mut sink: Box<dyn PeerSink>,
        source: Box<dyn PeerSource>,
        shutdown: CancellationToken,
    ) -> SessionReport {
        let TerminalSession {
            identity,
            project,
            mut process,
            master,
            permit,
            ..
        } = session;

        let ready = ServerControl::Ready {
            project_id: project.id.clone(),
            path: project.rel_path.clone(),
            username: identity.username.clone(),
        };

        let end = if sink.send_text(ready.to_json()).await.is_err() {
            drop(master);
            RelayEnd::PeerDisconnected
        } else {
            let relay = DuplexRelay::new(RelayConfig {
                idle_timeout: self.settings.idle_timeout,
                watchdog_tick: self.settings.watchdog_tick,
                initial_size: self.settings.initial_size,
            });
            let io = RelayIo {
                sink,
                source,
                master,
            };
            // a panic inside the relay surfaces here as a join error
            match tokio::spawn(relay.run(io, shutdown)).await {
                Ok(end) => end,
                Err(e) => {
                    error!(
                        user = %identity.username,
                        project_id = %project.id,
                        error = %e,
                        "Relay task failed"
                    );
                    RelayEnd::Aborted(e.to_string())
                }
            }
        };

        let exit_code = pty::terminate(process.as_mut(), self.settings.terminate_timeout).await;
        permit.release();
        self.log_end(&project.id, &identity.username, exit_code);

        info!(
            user = %identity.username,
            project_id = %project.id,
            exit_code,
            reason = %end,
            "Terminal session ended"
        );

        SessionReport { end, exit_code }
    }

    fn log_end(&self, project_id: &str, username: &str, exit_code: i32) {
        self.log_line(
            project_id,
            &format!("terminal end user={} exit={}", username, exit_code),
        );
    }

    fn log_line(&self, project_id: &str, event: &str) {
        let line = format!("{} {}", Local::now().to_rfc3339(), event);
        if let Err(e) = self.activity_log.append(project_id, &line) {
            warn!(project_id = %project_id, error = %e, "Failed to write activity log");
        }
    }
}
