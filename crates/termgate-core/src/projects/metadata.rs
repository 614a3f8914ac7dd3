//! Project metadata shown in listings: detected type, git state, mtime

use super::ResolvedProject;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Upper bound for each git query
const GIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Toolchain a project appears to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    /// pyproject.toml, requirements.txt or setup.py
    Python,
    /// package.json
    Node,
    /// No recognised marker
    Other,
}

/// A project as reported by the listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
    /// Stable opaque id
    pub id: String,
    /// Directory name
    pub name: String,
    /// Path relative to the dev root
    pub path: String,
    /// Whether the directory is a git checkout
    pub is_git: bool,
    /// Current branch, `None` outside git or when git is unavailable
    pub git_branch: Option<String>,
    /// Uncommitted changes present
    pub git_dirty: bool,
    /// Toolchain guessed from marker files
    pub detected_type: ProjectType,
    /// Newest mtime of the directory and its immediate children (RFC 3339)
    pub last_modified: String,
}

/// Guess the project type from marker files
#[must_use]
pub fn detect_type(dir: &Path) -> ProjectType {
    const PYTHON_MARKERS: [&str; 3] = ["pyproject.toml", "requirements.txt", "setup.py"];

    if PYTHON_MARKERS.iter().any(|marker| dir.join(marker).exists()) {
        ProjectType::Python
    } else if dir.join("package.json").exists() {
        ProjectType::Node
    } else {
        ProjectType::Other
    }
}

/// Newest modification time of `dir` and its immediate children
#[must_use]
pub fn last_modified(dir: &Path) -> DateTime<Local> {
    let Ok(own) = fs::metadata(dir).and_then(|meta| meta.modified()) else {
        return Local::now();
    };

    let newest = fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok()?.metadata().ok()?.modified().ok())
        .fold(own, SystemTime::max);
    newest.into()
}

/// Run a read-only git query in `dir`, returning trimmed stdout on success
async fn git(dir: &Path, args: &[&str]) -> Option<String> {
    let output = tokio::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(std::process::Stdio::null())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(GIT_TIMEOUT, output).await {
        Ok(Ok(output)) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
        }
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            debug!(dir = %dir.display(), error = %e, "git unavailable");
            None
        }
        Err(_) => {
            debug!(dir = %dir.display(), args = ?args, "git timed out");
            None
        }
    }
}

/// Current branch of a checkout
pub async fn git_branch(dir: &Path) -> Option<String> {
    git(dir, &["rev-parse", "--abbrev-ref", "HEAD"])
        .await
        .filter(|branch| !branch.is_empty())
}

/// Whether a checkout has uncommitted changes
pub async fn git_dirty(dir: &Path) -> bool {
    git(dir, &["status", "--porcelain"])
        .await
        .is_some_and(|status| !status.is_empty())
}

/// Gather listing metadata for a resolved project
pub async fn describe(project: &ResolvedProject) -> ProjectInfo {
    let dir = project.abs_path.as_path();
    let (git_branch, git_dirty) = if project.is_git {
        tokio::join!(git_branch(dir), git_dirty(dir))
    } else {
        (None, false)
    };

    ProjectInfo {
        id: project.id.clone(),
        name: project.name.clone(),
        path: project.rel_path.clone(),
        is_git: project.is_git,
        git_branch,
        git_dirty,
        detected_type: detect_type(dir),
        last_modified: last_modified(dir).to_rfc3339(),
    }
}
