//! Shell command resolution

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Shell used when nothing is configured
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Tried in order when the configured shell cannot be found
pub const FALLBACK_SHELLS: [&str; 4] = ["/bin/bash", "/bin/sh", "bash", "sh"];

/// A resolved executable plus its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    /// Executable path
    pub program: PathBuf,
    /// Arguments after the program
    pub args: Vec<String>,
}

impl ShellCommand {
    /// Full argument vector, program first
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_words::join(self.argv()))
    }
}

/// Resolve the configured shell command line to an executable
///
/// The command line is split with shell quoting rules. A program containing
/// `/` must exist as given, a bare name is looked up on `PATH`. If that fails
/// the fallback shells are tried without arguments.
#[must_use]
pub fn resolve_shell(configured: &str) -> Option<ShellCommand> {
    let mut parts = match shell_words::split(configured.trim()) {
        Ok(parts) => parts,
        Err(e) => {
            warn!(shell = %configured, error = %e, "Unparsable shell command, using default");
            Vec::new()
        }
    };
    if parts.is_empty() {
        parts.push(DEFAULT_SHELL.to_string());
    }

    let program = parts.remove(0);
    if let Some(path) = locate(&program) {
        return Some(ShellCommand {
            program: path,
            args: parts,
        });
    }

    debug!(shell = %program, "Configured shell not found, trying fallbacks");
    FALLBACK_SHELLS.iter().find_map(|candidate| {
        locate(candidate).map(|path| ShellCommand {
            program: path,
            args: Vec::new(),
        })
    })
}

fn locate(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = Path::new(program);
        path.is_file().then(|| path.to_path_buf())
    } else {
        which::which(program).ok()
    }
}
