//! Pseudo-terminal process management
//!
//! Platform primitives sit behind [`PtyProvider`]: the native provider opens a
//! real pty pair and signals the shell's process group, the unsupported
//! provider refuses to spawn. Everything above this module only sees the
//! [`PtyMaster`] and [`ChildProcess`] capabilities.

#[cfg(unix)]
mod native;
mod unsupported;

#[cfg(unix)]
pub use native::NativePtyProvider;
pub use unsupported::UnsupportedPtyProvider;

use crate::shell::ShellCommand;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

/// Minimum terminal width
pub const MIN_COLS: u16 = 10;
/// Maximum terminal width
pub const MAX_COLS: u16 = 400;
/// Minimum terminal height
pub const MIN_ROWS: u16 = 5;
/// Maximum terminal height
pub const MAX_ROWS: u16 = 200;

/// Environment variables set for the shell unless already present
pub const BASELINE_ENV: [(&str, &str); 2] =
    [("TERM", "xterm-256color"), ("COLORTERM", "truecolor")];

const READ_CHUNK_SIZE: usize = 4096;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Pty errors
#[derive(Debug, Error)]
pub enum PtyError {
    /// This platform has no pty support
    #[error("pseudo-terminals are not supported on this platform")]
    Unsupported,

    /// Opening the pty pair failed
    #[error("failed to open pty: {0}")]
    Open(String),

    /// Launching the command failed
    #[error("failed to spawn {command}: {message}")]
    Spawn {
        /// Program that failed to start
        command: String,
        /// Underlying failure
        message: String,
    },

    /// I/O on the pty failed
    #[error("pty I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Terminal window size in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    /// Columns
    pub cols: u16,
    /// Rows
    pub rows: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

impl TerminalSize {
    /// Build a size from untrusted values, clamped to the supported bounds
    #[must_use]
    pub fn clamped(cols: i64, rows: i64) -> Self {
        Self {
            cols: clamp_dimension(cols, MIN_COLS, MAX_COLS),
            rows: clamp_dimension(rows, MIN_ROWS, MAX_ROWS),
        }
    }
}

fn clamp_dimension(value: i64, min: u16, max: u16) -> u16 {
    // bounds fit in u16, so the narrowing cannot truncate
    value.clamp(i64::from(min), i64::from(max)) as u16
}

/// What to launch and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    /// Resolved shell command
    pub command: ShellCommand,
    /// Working directory (must exist)
    pub working_dir: PathBuf,
    /// Initial window size
    pub size: TerminalSize,
}

/// Signals used while terminating a shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSignal {
    /// Ask the process group to exit (SIGTERM)
    Graceful,
    /// Force the process group to exit (SIGKILL)
    Forceful,
}

/// Master side of a pty pair
pub trait PtyMaster: Send + Sync {
    /// Change the window size
    fn resize(&self, size: TerminalSize) -> Result<(), PtyError>;

    /// Get a blocking reader for shell output
    fn try_clone_reader(&self) -> Result<Box<dyn Read + Send>, PtyError>;

    /// Take the blocking writer for shell input (once)
    fn take_writer(&self) -> Result<Box<dyn Write + Send>, PtyError>;
}

/// A spawned shell process
pub trait ChildProcess: Send + Sync {
    /// OS process id, if known
    fn pid(&self) -> Option<u32>;

    /// Exit code if the process has exited, without blocking
    fn try_exit_code(&mut self) -> io::Result<Option<i32>>;

    /// Send a signal to the whole process group
    fn signal_group(&mut self, signal: TermSignal) -> io::Result<()>;
}

/// Handles to a freshly spawned shell
pub struct PtyHandles {
    /// Child process
    pub process: Box<dyn ChildProcess>,
    /// Master side of the pty
    pub master: Box<dyn PtyMaster>,
}

impl std::fmt::Debug for PtyHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyHandles")
            .field("pid", &self.process.pid())
            .finish_non_exhaustive()
    }
}

/// Platform capability for spawning shells on a pty
pub trait PtyProvider: Send + Sync {
    /// Whether this platform can spawn pty-backed shells
    fn is_supported(&self) -> bool;

    /// Spawn the shell in a new session with stdio on the pty slave
    fn spawn(&self, request: &SpawnRequest) -> Result<PtyHandles, PtyError>;
}

/// The pty provider for the current platform
#[must_use]
pub fn default_provider() -> Arc<dyn PtyProvider> {
    #[cfg(unix)]
    {
        Arc::new(NativePtyProvider::new())
    }
    #[cfg(not(unix))]
    {
        Arc::new(UnsupportedPtyProvider)
    }
}

/// Clamp and apply a window-size change, swallowing failures
pub fn resize(master: &dyn PtyMaster, cols: i64, rows: i64) -> TerminalSize {
    let size = TerminalSize::clamped(cols, rows);
    if let Err(e) = master.resize(size) {
        debug!(error = %e, cols = size.cols, rows = size.rows, "Resize failed");
    }
    size
}

/// Terminate a process: SIGTERM to the group, then SIGKILL if it lingers
///
/// Each signal is followed by a wait of at most `timeout`. Returns the exit
/// code if it could be observed, 0 otherwise. Signalling errors are ignored.
pub async fn terminate(process: &mut dyn ChildProcess, timeout: Duration) -> i32 {
    if let Ok(Some(code)) = process.try_exit_code() {
        return code;
    }

    if let Err(e) = process.signal_group(TermSignal::Graceful) {
        debug!(pid = ?process.pid(), error = %e, "SIGTERM failed");
    }
    if let Some(code) = wait_for_exit(process, timeout).await {
        return code;
    }

    debug!(pid = ?process.pid(), "Process ignored SIGTERM, escalating");
    if let Err(e) = process.signal_group(TermSignal::Forceful) {
        debug!(pid = ?process.pid(), error = %e, "SIGKILL failed");
    }
    wait_for_exit(process, timeout).await.unwrap_or(0)
}

async fn wait_for_exit(process: &mut dyn ChildProcess, timeout: Duration) -> Option<i32> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(Some(code)) = process.try_exit_code() {
            return Some(code);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL.min(deadline - now)).await;
    }
}

/// Output produced by the pty reader thread
#[derive(Debug)]
pub enum PtyOutput {
    /// A chunk of terminal bytes
    Data(Vec<u8>),
    /// The shell closed its side
    Closed,
    /// Reading failed
    Failed(io::Error),
}

/// Move a blocking pty reader onto its own thread
///
/// Chunks are delivered through a bounded channel, so a slow consumer stalls
/// the reader instead of buffering without limit. The thread exits on EOF,
/// on a read error, or once the receiver is dropped.
pub fn spawn_output_pump(
    mut reader: Box<dyn Read + Send>,
    capacity: usize,
) -> io::Result<mpsc::Receiver<PtyOutput>> {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    thread::Builder::new()
        .name("termgate-pty-reader".to_string())
        .spawn(move || {
            let mut buffer = [0u8; READ_CHUNK_SIZE];
            loop {
                match reader.read(&mut buffer) {
                    Ok(0) => {
                        let _ = tx.blocking_send(PtyOutput::Closed);
                        break;
                    }
                    Ok(n) => {
                        if tx.blocking_send(PtyOutput::Data(buffer[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.blocking_send(PtyOutput::Failed(e));
                        break;
                    }
                }
            }
        })?;

    Ok(rx)
}

/// Whether a read error just means the slave side has gone away
///
/// Linux reports EIO on the master once every slave descriptor is closed.
#[must_use]
pub fn is_hangup(error: &io::Error) -> bool {
    #[cfg(unix)]
    {
        error.raw_os_error() == Some(nix::errno::Errno::EIO as i32)
    }
    #[cfg(not(unix))]
    {
        let _ = error;
        false
    }
}

/// Sequential writer for shell input
///
/// Writes run on the blocking pool and are awaited one at a time, so input
/// order is preserved.
#[derive(Clone)]
pub struct PtyInput {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl PtyInput {
    /// Wrap a blocking pty writer
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Write all of `data` and flush
    pub async fn write_all(&self, data: Vec<u8>) -> io::Result<()> {
        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || {
            let mut writer = writer
                .lock()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "pty writer poisoned"))?;
            writer.write_all(&data)?;
            writer.flush()
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }
}

impl std::fmt::Debug for PtyInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyInput").finish_non_exhaustive()
    }
}
