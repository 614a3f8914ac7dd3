//! Native pty provider (unix)

use super::{
    ChildProcess, PtyError, PtyHandles, PtyMaster, PtyProvider, SpawnRequest, TermSignal,
    TerminalSize, BASELINE_ENV,
};
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{self, Read, Write};
use std::sync::Mutex;
use tracing::debug;

impl From<TerminalSize> for PtySize {
    fn from(size: TerminalSize) -> Self {
        PtySize {
            rows: size.rows,
            cols: size.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

/// Spawns shells on real pseudo-terminals
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePtyProvider;

impl NativePtyProvider {
    /// Create the provider
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PtyProvider for NativePtyProvider {
    fn is_supported(&self) -> bool {
        true
    }

    fn spawn(&self, request: &SpawnRequest) -> Result<PtyHandles, PtyError> {
        let pair = native_pty_system()
            .openpty(request.size.into())
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&request.command.program);
        cmd.args(&request.command.args);
        cmd.cwd(&request.working_dir);
        // the builder starts from this process's environment
        for (key, value) in BASELINE_ENV {
            if std::env::var_os(key).is_none() {
                cmd.env(key, value);
            }
        }

        // portable-pty starts the child with setsid(), so its pid is also its
        // process group id
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn {
                command: request.command.to_string(),
                message: e.to_string(),
            })?;

        // the parent keeps only the master side
        drop(pair.slave);

        debug!(
            pid = ?child.process_id(),
            command = %request.command,
            cwd = %request.working_dir.display(),
            "Shell spawned"
        );

        Ok(PtyHandles {
            process: Box::new(NativeChild { child, exit: None }),
            master: Box::new(NativeMaster {
                master: Mutex::new(pair.master),
            }),
        })
    }
}

struct NativeMaster {
    master: Mutex<Box<dyn MasterPty + Send>>,
}

impl NativeMaster {
    fn with_master<T>(
        &self,
        f: impl FnOnce(&dyn MasterPty) -> Result<T, PtyError>,
    ) -> Result<T, PtyError> {
        let master = self
            .master
            .lock()
            .map_err(|_| {
                PtyError::Io(io::Error::new(io::ErrorKind::Other, "pty master poisoned"))
            })?;
        f(&**master)
    }
}

impl PtyMaster for NativeMaster {
    fn resize(&self, size: TerminalSize) -> Result<(), PtyError> {
        self.with_master(|master| {
            master
                .resize(size.into())
                .map_err(|e| PtyError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))
        })
    }

    fn try_clone_reader(&self) -> Result<Box<dyn Read + Send>, PtyError> {
        self.with_master(|master| {
            master
                .try_clone_reader()
                .map_err(|e| PtyError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))
        })
    }

    fn take_writer(&self) -> Result<Box<dyn Write + Send>, PtyError> {
        self.with_master(|master| {
            master
                .take_writer()
                .map_err(|e| PtyError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))
        })
    }
}

struct NativeChild {
    child: Box<dyn Child + Send + Sync>,
    /// Exit code once reaped; signal deaths are stored as `-signo`
    exit: Option<i32>,
}

impl NativeChild {
    fn process_group(&self) -> Option<Pid> {
        self.child
            .process_id()
            .and_then(|pid| i32::try_from(pid).ok())
            .map(Pid::from_raw)
    }
}

/// Map a wait status to an exit code, `None` while the child is alive
fn exit_code_of(status: WaitStatus) -> Option<i32> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(-(signal as i32)),
        _ => None,
    }
}

impl ChildProcess for NativeChild {
    fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    fn try_exit_code(&mut self) -> io::Result<Option<i32>> {
        if self.exit.is_some() {
            return Ok(self.exit);
        }
        // reaped here rather than through portable-pty, which reports every
        // signal death as exit code 1
        let Some(pid) = self.process_group() else {
            return Ok(self
                .child
                .try_wait()?
                .map(|status| i32::try_from(status.exit_code()).unwrap_or(i32::MAX)));
        };
        let status = waitpid(pid, Some(WaitPidFlag::WNOHANG)).map_err(io::Error::from)?;
        self.exit = exit_code_of(status);
        Ok(self.exit)
    }

    fn signal_group(&mut self, signal: TermSignal) -> io::Result<()> {
        let Some(group) = self.process_group() else {
            return Ok(());
        };
        let signal = match signal {
            TermSignal::Graceful => Signal::SIGTERM,
            TermSignal::Forceful => Signal::SIGKILL,
        };
        killpg(group, signal).map_err(io::Error::from)
    }
}

impl Drop for NativeChild {
    fn drop(&mut self) {
        // never leave a live shell behind, whatever path dropped us
        if matches!(self.try_exit_code(), Ok(None)) {
            if let Err(e) = self.signal_group(TermSignal::Forceful) {
                debug!(pid = ?self.child.process_id(), error = %e, "Kill on drop failed");
            }
            if let Some(pid) = self.process_group() {
                let _ = waitpid(pid, Some(WaitPidFlag::WNOHANG));
            }
        }
    }
}
