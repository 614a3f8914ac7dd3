//! Duplex relay between a peer connection and a pty
//!
//! One relay runs per session. While running, three activities share the
//! session's [`ActivityClock`]:
//! - pty → peer: output chunks forwarded verbatim as binary frames
//! - peer → pty: binary frames written verbatim, text frames handled as
//!   control messages
//! - idle watchdog
//!
//! The first activity to finish (or the shutdown token) ends the relay; the
//! others are dropped before the peer is closed and the pty handles released.

mod peer;
pub mod protocol;
pub mod watchdog;

pub use peer::{PeerClosed, PeerFrame, PeerSink, PeerSource};
pub use watchdog::{ActivityClock, IdleWatchdog};

use crate::error::{close_code, SessionError};
use crate::pty::{self, PtyInput, PtyMaster, PtyOutput, TerminalSize};
use protocol::{parse_client_control, ClientControl, ServerControl};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Chunks buffered between the pty reader thread and the peer
const OUTPUT_CHANNEL_CAPACITY: usize = 64;

/// Upper bound for each message sent while closing
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Relay lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Handles being wired up
    Starting,
    /// Bytes flowing both ways
    Running,
    /// One side finished, closing the peer and releasing handles
    Closing,
    /// Everything released
    Closed,
}

/// Why a relay stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEnd {
    /// The shell closed the pty (normally because it exited)
    PtyClosed,
    /// Reading or writing the pty failed
    ProcessIo(String),
    /// The peer went away
    PeerDisconnected,
    /// No activity within the idle timeout
    IdleTimeout,
    /// The server is shutting down
    Shutdown,
    /// The relay task itself failed
    Aborted(String),
}

impl RelayEnd {
    /// Short label for logs
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::PtyClosed => "pty_closed",
            Self::ProcessIo(_) => "process_io",
            Self::PeerDisconnected => "peer_disconnected",
            Self::IdleTimeout => "idle_timeout",
            Self::Shutdown => "shutdown",
            Self::Aborted(_) => "aborted",
        }
    }

    /// The session error this end corresponds to, if it is one
    #[must_use]
    pub fn as_error(&self) -> Option<SessionError> {
        match self {
            Self::PtyClosed | Self::Shutdown => None,
            Self::ProcessIo(message) | Self::Aborted(message) => {
                Some(SessionError::ProcessIo(message.clone()))
            }
            Self::PeerDisconnected => Some(SessionError::PeerDisconnected),
            Self::IdleTimeout => Some(SessionError::IdleTimeout),
        }
    }

    /// Close frame to send when the relay stops, if any
    fn close_frame(&self) -> Option<(u16, &'static str)> {
        match self {
            Self::PtyClosed => Some((close_code::NORMAL, "terminal closed")),
            Self::ProcessIo(_) | Self::Aborted(_) => Some((close_code::NORMAL, "terminal error")),
            Self::Shutdown => Some((close_code::GOING_AWAY, "server shutting down")),
            Self::IdleTimeout => Some((close_code::IDLE_TIMEOUT, "idle timeout")),
            Self::PeerDisconnected => None,
        }
    }
}

impl std::fmt::Display for RelayEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProcessIo(message) | Self::Aborted(message) => {
                write!(f, "{}: {}", self.reason(), message)
            }
            _ => f.write_str(self.reason()),
        }
    }
}

/// Relay timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Inactivity period that ends the session
    pub idle_timeout: Duration,
    /// Watchdog check interval
    pub watchdog_tick: Duration,
    /// Window size the shell was spawned with
    pub initial_size: TerminalSize,
}

/// Handles a relay takes ownership of
pub struct RelayIo {
    /// Outgoing half of the peer
    pub sink: Box<dyn PeerSink>,
    /// Incoming half of the peer
    pub source: Box<dyn PeerSource>,
    /// Master side of the pty
    pub master: Box<dyn PtyMaster>,
}

/// Peer sink shared by the relay activities
struct SharedSink {
    inner: Mutex<Box<dyn PeerSink>>,
}

impl SharedSink {
    fn new(sink: Box<dyn PeerSink>) -> Self {
        Self {
            inner: Mutex::new(sink),
        }
    }

    async fn binary(&self, data: Vec<u8>) -> Result<(), PeerClosed> {
        self.inner.lock().await.send_binary(data).await
    }

    async fn control(&self, message: &ServerControl) -> Result<(), PeerClosed> {
        self.inner.lock().await.send_text(message.to_json()).await
    }

    /// Send a control message without letting a stalled peer block teardown
    async fn control_best_effort(&self, message: &ServerControl) {
        match tokio::time::timeout(CLOSE_TIMEOUT, self.control(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => debug!("Peer gone before control message"),
            Err(_) => debug!("Timed out sending control message"),
        }
    }

    async fn close(&self, code: u16, reason: &str) {
        let close = async { self.inner.lock().await.close(code, reason).await };
        match tokio::time::timeout(CLOSE_TIMEOUT, close).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => debug!(code, "Peer already gone before close"),
            Err(_) => debug!(code, "Timed out sending close frame"),
        }
    }
}

/// Per-session relay engine
pub struct DuplexRelay {
    config: RelayConfig,
    activity: Arc<ActivityClock>,
    state: watch::Sender<RelayState>,
}

impl DuplexRelay {
    /// Create a relay in the `Starting` state
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        let (state, _) = watch::channel(RelayState::Starting);
        Self {
            config,
            activity: Arc::new(ActivityClock::new()),
            state,
        }
    }

    /// The session's activity clock
    #[must_use]
    pub fn activity(&self) -> Arc<ActivityClock> {
        Arc::clone(&self.activity)
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> RelayState {
        *self.state.borrow()
    }

    /// Watch state transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RelayState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: RelayState) {
        self.state.send_replace(state);
    }

    /// Relay until one side finishes, then close the peer and release handles
    pub async fn run(self, io: RelayIo, shutdown: CancellationToken) -> RelayEnd {
        let RelayIo {
            sink,
            mut source,
            master,
        } = io;
        let sink = SharedSink::new(sink);

        let wired = master
            .try_clone_reader()
            .map_err(|e| e.to_string())
            .and_then(|reader| {
                pty::spawn_output_pump(reader, OUTPUT_CHANNEL_CAPACITY).map_err(|e| e.to_string())
            })
            .and_then(|output| {
                let writer = master.take_writer().map_err(|e| e.to_string())?;
                Ok((output, PtyInput::new(writer)))
            });
        let (mut output, input) = match wired {
            Ok(wired) => wired,
            Err(message) => {
                warn!(error = %message, "Failed to attach to pty");
                let end = RelayEnd::ProcessIo(message);
                self.begin_closing(&sink, &end).await;
                drop(master);
                self.set_state(RelayState::Closed);
                return end;
            }
        };

        self.set_state(RelayState::Running);
        let watchdog = IdleWatchdog::new(self.config.idle_timeout, self.config.watchdog_tick);

        let end = tokio::select! {
            end = pump_output(&mut output, &sink, &self.activity) => end,
            end = pump_input(
                source.as_mut(),
                &input,
                master.as_ref(),
                &sink,
                &self.activity,
                self.config.initial_size,
            ) => end,
            _ = watchdog.breached(&self.activity) => RelayEnd::IdleTimeout,
            _ = shutdown.cancelled() => RelayEnd::Shutdown,
        };

        if end == RelayEnd::IdleTimeout {
            sink.control_best_effort(&ServerControl::error("idle timeout")).await;
        }

        self.begin_closing(&sink, &end).await;

        // the reader thread exits once its channel is gone
        drop(output);
        drop(input);
        drop(master);
        drop(source);
        self.set_state(RelayState::Closed);
        end
    }

    async fn begin_closing(&self, sink: &SharedSink, end: &RelayEnd) {
        self.set_state(RelayState::Closing);
        debug!(reason = %end, "Relay closing");
        if let Some((code, reason)) = end.close_frame() {
            sink.close(code, reason).await;
        }
    }
}

async fn pump_output(
    output: &mut mpsc::Receiver<PtyOutput>,
    sink: &SharedSink,
    activity: &ActivityClock,
) -> RelayEnd {
    while let Some(event) = output.recv().await {
        match event {
            PtyOutput::Data(chunk) => {
                activity.touch();
                if sink.binary(chunk).await.is_err() {
                    return RelayEnd::PeerDisconnected;
                }
            }
            PtyOutput::Closed => return RelayEnd::PtyClosed,
            PtyOutput::Failed(e) if pty::is_hangup(&e) => return RelayEnd::PtyClosed,
            PtyOutput::Failed(e) => {
                warn!(error = %e, "Pty read failed");
                return RelayEnd::ProcessIo(e.to_string());
            }
        }
    }
    RelayEnd::PtyClosed
}

async fn pump_input(
    source: &mut dyn PeerSource,
    input: &PtyInput,
    master: &dyn PtyMaster,
    sink: &SharedSink,
    activity: &ActivityClock,
    initial_size: TerminalSize,
) -> RelayEnd {
    let mut size = initial_size;

    while let Some(frame) = source.next_frame().await {
        match frame {
            PeerFrame::Binary(data) => {
                if data.is_empty() {
                    continue;
                }
                activity.touch();
                if let Err(e) = input.write_all(data).await {
                    warn!(error = %e, "Pty write failed");
                    return RelayEnd::ProcessIo(e.to_string());
                }
            }
            PeerFrame::Text(text) => {
                if text.is_empty() {
                    continue;
                }
                // any control frame counts as activity, pings included
                activity.touch();
                match parse_client_control(&text) {
                    Some(ClientControl::Resize { cols, rows }) => {
                        let applied = pty::resize(master, cols, rows);
                        if applied != size {
                            debug!(cols = applied.cols, rows = applied.rows, "Terminal resized");
                            size = applied;
                        }
                    }
                    Some(ClientControl::Ping) => {
                        if sink.control(&ServerControl::Pong).await.is_err() {
                            return RelayEnd::PeerDisconnected;
                        }
                    }
                    None => debug!(len = text.len(), "Ignoring unknown control message"),
                }
            }
        }
    }

    RelayEnd::PeerDisconnected
}

#[cfg(test)]
mod tests;
