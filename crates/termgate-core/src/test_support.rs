//! In-memory pty and peer doubles shared by unit tests

use crate::pty::{
    ChildProcess, PtyError, PtyHandles, PtyMaster, PtyProvider, SpawnRequest, TermSignal,
    TerminalSize,
};
use crate::relay::{PeerClosed, PeerFrame, PeerSink, PeerSource};
use async_trait::async_trait;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// ============================================================================
// Fake pty
// ============================================================================

/// Test-side controls for a fake shell
#[derive(Clone)]
pub struct FakeShell {
    output: Arc<Mutex<Option<std_mpsc::Sender<Vec<u8>>>>>,
    pub input: Arc<Mutex<Vec<u8>>>,
    pub sizes: Arc<Mutex<Vec<TerminalSize>>>,
    pub signals: Arc<Mutex<Vec<TermSignal>>>,
    exit_code: Arc<Mutex<Option<i32>>>,
    ignores_sigterm: Arc<AtomicBool>,
}

impl FakeShell {
    /// Emit terminal output
    pub fn emit(&self, bytes: &[u8]) {
        if let Some(tx) = self.output.lock().unwrap().as_ref() {
            let _ = tx.send(bytes.to_vec());
        }
    }

    /// Close the pty from the shell side (EOF)
    pub fn hang_up(&self) {
        self.output.lock().unwrap().take();
    }

    /// Pretend the shell exited on its own
    pub fn exit(&self, code: i32) {
        *self.exit_code.lock().unwrap() = Some(code);
        self.hang_up();
    }

    pub fn input_string(&self) -> String {
        String::from_utf8_lossy(&self.input.lock().unwrap()).into_owned()
    }

    pub fn signals(&self) -> Vec<TermSignal> {
        self.signals.lock().unwrap().clone()
    }

    pub fn sizes(&self) -> Vec<TerminalSize> {
        self.sizes.lock().unwrap().clone()
    }
}

/// Build a fake shell and the handles a provider would return
pub fn fake_pty(ignores_sigterm: bool) -> (FakeShell, PtyHandles) {
    let (tx, rx) = std_mpsc::channel();
    let shell = FakeShell {
        output: Arc::new(Mutex::new(Some(tx))),
        input: Arc::new(Mutex::new(Vec::new())),
        sizes: Arc::new(Mutex::new(Vec::new())),
        signals: Arc::new(Mutex::new(Vec::new())),
        exit_code: Arc::new(Mutex::new(None)),
        ignores_sigterm: Arc::new(AtomicBool::new(ignores_sigterm)),
    };

    let handles = PtyHandles {
        process: Box::new(FakeChild {
            shell: shell.clone(),
        }),
        master: Box::new(FakeMaster {
            reader: Mutex::new(Some(ChannelReader {
                rx,
                pending: Vec::new(),
            })),
            shell: shell.clone(),
        }),
    };
    (shell, handles)
}

struct ChannelReader {
    rx: std_mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv() {
                Ok(chunk) => self.pending = chunk,
                Err(_) => return Ok(0),
            }
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct FakeMaster {
    reader: Mutex<Option<ChannelReader>>,
    shell: FakeShell,
}

impl PtyMaster for FakeMaster {
    fn resize(&self, size: TerminalSize) -> Result<(), PtyError> {
        self.shell.sizes.lock().unwrap().push(size);
        Ok(())
    }

    fn try_clone_reader(&self) -> Result<Box<dyn Read + Send>, PtyError> {
        self.reader
            .lock()
            .unwrap()
            .take()
            .map(|reader| Box::new(reader) as Box<dyn Read + Send>)
            .ok_or_else(|| PtyError::Io(io::Error::new(io::ErrorKind::Other, "reader taken")))
    }

    fn take_writer(&self) -> Result<Box<dyn Write + Send>, PtyError> {
        Ok(Box::new(SharedWriter(Arc::clone(&self.shell.input))))
    }
}

struct FakeChild {
    shell: FakeShell,
}

impl ChildProcess for FakeChild {
    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    fn try_exit_code(&mut self) -> io::Result<Option<i32>> {
        Ok(*self.shell.exit_code.lock().unwrap())
    }

    fn signal_group(&mut self, signal: TermSignal) -> io::Result<()> {
        self.shell.signals.lock().unwrap().push(signal);
        let code = match signal {
            TermSignal::Graceful if self.shell.ignores_sigterm.load(Ordering::SeqCst) => None,
            TermSignal::Graceful => Some(143),
            TermSignal::Forceful => Some(137),
        };
        if let Some(code) = code {
            self.shell.exit(code);
        }
        Ok(())
    }
}

/// Provider handing out one prepared fake shell per spawn
pub struct FakePtyProvider {
    pub supported: bool,
    pub fail_spawn: bool,
    /// Output the shell prints right after spawning
    pub emit_on_spawn: Option<Vec<u8>>,
    /// Shell exits with this code right after spawning
    pub exit_on_spawn: Option<i32>,
    /// Shell closes the pty right after spawning without exiting
    pub hang_up_on_spawn: bool,
    pub spawned: Mutex<Vec<SpawnRequest>>,
    pub shells: Mutex<Vec<FakeShell>>,
    pub spawn_count: AtomicUsize,
}

impl FakePtyProvider {
    pub fn new() -> Self {
        Self {
            supported: true,
            fail_spawn: false,
            emit_on_spawn: None,
            exit_on_spawn: None,
            hang_up_on_spawn: false,
            spawned: Mutex::new(Vec::new()),
            shells: Mutex::new(Vec::new()),
            spawn_count: AtomicUsize::new(0),
        }
    }

    pub fn last_shell(&self) -> FakeShell {
        self.shells.lock().unwrap().last().cloned().unwrap()
    }
}

impl PtyProvider for FakePtyProvider {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn spawn(&self, request: &SpawnRequest) -> Result<PtyHandles, PtyError> {
        self.spawn_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_spawn {
            return Err(PtyError::Spawn {
                command: request.command.to_string(),
                message: "exec failed".to_string(),
            });
        }
        self.spawned.lock().unwrap().push(request.clone());
        let (shell, handles) = fake_pty(false);
        if let Some(output) = &self.emit_on_spawn {
            shell.emit(output);
        }
        if let Some(code) = self.exit_on_spawn {
            shell.exit(code);
        }
        if self.hang_up_on_spawn {
            shell.hang_up();
        }
        self.shells.lock().unwrap().push(shell);
        Ok(handles)
    }
}

// ============================================================================
// Fake peer
// ============================================================================

/// Frame the server sent to the fake peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Binary(Vec<u8>),
    Text(String),
    Close(u16),
}

/// Test-side handle of a fake peer connection
#[derive(Clone)]
pub struct FakePeer {
    pub tx: Arc<Mutex<Option<mpsc::UnboundedSender<PeerFrame>>>>,
    pub sent: Arc<Mutex<Vec<Sent>>>,
}

impl FakePeer {
    pub fn send_binary(&self, data: &[u8]) {
        if let Some(tx) = self.tx.lock().unwrap().as_ref() {
            let _ = tx.send(PeerFrame::Binary(data.to_vec()));
        }
    }

    pub fn send_text(&self, text: &str) {
        if let Some(tx) = self.tx.lock().unwrap().as_ref() {
            let _ = tx.send(PeerFrame::Text(text.to_string()));
        }
    }

    pub fn disconnect(&self) {
        self.tx.lock().unwrap().take();
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn close_codes(&self) -> Vec<u16> {
        self.sent()
            .into_iter()
            .filter_map(|frame| match frame {
                Sent::Close(code) => Some(code),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&self) -> Vec<serde_json::Value> {
        self.sent()
            .into_iter()
            .filter_map(|frame| match frame {
                Sent::Text(text) => serde_json::from_str(&text).ok(),
                _ => None,
            })
            .collect()
    }

    pub fn output(&self) -> Vec<u8> {
        self.sent()
            .into_iter()
            .filter_map(|frame| match frame {
                Sent::Binary(data) => Some(data),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

pub struct FakeSource {
    rx: mpsc::UnboundedReceiver<PeerFrame>,
}

#[async_trait]
impl PeerSource for FakeSource {
    async fn next_frame(&mut self) -> Option<PeerFrame> {
        self.rx.recv().await
    }
}

pub struct FakeSink {
    sent: Arc<Mutex<Vec<Sent>>>,
    closed: bool,
}

#[async_trait]
impl PeerSink for FakeSink {
    async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), PeerClosed> {
        if self.closed {
            return Err(PeerClosed);
        }
        self.sent.lock().unwrap().push(Sent::Binary(data));
        Ok(())
    }

    async fn send_text(&mut self, text: String) -> Result<(), PeerClosed> {
        if self.closed {
            return Err(PeerClosed);
        }
        self.sent.lock().unwrap().push(Sent::Text(text));
        Ok(())
    }

    async fn close(&mut self, code: u16, _reason: &str) -> Result<(), PeerClosed> {
        if self.closed {
            return Err(PeerClosed);
        }
        self.closed = true;
        self.sent.lock().unwrap().push(Sent::Close(code));
        Ok(())
    }
}

/// Sink for a peer that stopped reading: every send stays pending
pub struct StalledSink;

#[async_trait]
impl PeerSink for StalledSink {
    async fn send_binary(&mut self, _data: Vec<u8>) -> Result<(), PeerClosed> {
        std::future::pending().await
    }

    async fn send_text(&mut self, _text: String) -> Result<(), PeerClosed> {
        std::future::pending().await
    }

    async fn close(&mut self, _code: u16, _reason: &str) -> Result<(), PeerClosed> {
        std::future::pending().await
    }
}

/// Build a connected fake peer
pub fn fake_peer() -> (FakePeer, Box<dyn PeerSink>, Box<dyn PeerSource>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sent = Arc::new(Mutex::new(Vec::new()));
    let peer = FakePeer {
        tx: Arc::new(Mutex::new(Some(tx))),
        sent: Arc::clone(&sent),
    };
    (
        peer,
        Box::new(FakeSink {
            sent,
            closed: false,
        }),
        Box::new(FakeSource { rx }),
    )
}
