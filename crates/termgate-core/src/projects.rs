//! Project resolution
//!
//! Projects are the immediate, non-hidden subdirectories of a development
//! root. A project's id is the hex SHA-256 of its path relative to the root,
//! so ids are stable across restarts and never expose the path itself.

mod metadata;

pub use metadata::{describe, detect_type, last_modified, ProjectInfo, ProjectType};

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Project listing errors
#[derive(Debug, Error)]
pub enum ProjectError {
    /// The development root is missing or unreadable
    #[error("cannot read dev root {path}: {source}")]
    DevRoot {
        /// Configured root
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },
}

/// A project directory that exists right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedProject {
    /// Stable opaque id
    pub id: String,
    /// Directory name
    pub name: String,
    /// Path relative to the dev root
    #[serde(rename = "path")]
    pub rel_path: String,
    /// Canonical absolute path
    #[serde(skip)]
    pub abs_path: PathBuf,
    /// Whether the directory is a git checkout
    pub is_git: bool,
}

/// Maps opaque project ids to working directories
#[cfg_attr(test, mockall::automock)]
pub trait ProjectResolver: Send + Sync {
    /// All projects currently available
    fn list(&self) -> Result<Vec<ResolvedProject>, ProjectError>;

    /// Resolve one project id, `None` if it does not exist
    fn resolve(&self, project_id: &str) -> Option<ResolvedProject>;
}

/// Hex SHA-256 id for a path relative to the dev root
#[must_use]
pub fn project_id_for(rel_path: &str) -> String {
    let digest = Sha256::digest(rel_path.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Whether `project_id` has the shape of a project id
#[must_use]
pub fn is_valid_project_id(project_id: &str) -> bool {
    project_id.len() == 64
        && project_id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Projects discovered under a development root
#[derive(Debug, Clone)]
pub struct DevRootProjects {
    dev_root: PathBuf,
    excluded: Vec<PathBuf>,
}

impl DevRootProjects {
    /// Scan `dev_root` for projects
    pub fn new(dev_root: impl Into<PathBuf>) -> Self {
        Self {
            dev_root: dev_root.into(),
            excluded: Vec::new(),
        }
    }

    /// Never report `path` as a project (e.g. the logs directory)
    #[must_use]
    pub fn exclude(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.excluded
            .push(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()));
        self
    }

    /// The configured development root
    #[must_use]
    pub fn dev_root(&self) -> &Path {
        &self.dev_root
    }

    fn scan(&self) -> Result<Vec<ResolvedProject>, ProjectError> {
        let root = self
            .dev_root
            .canonicalize()
            .map_err(|source| ProjectError::DevRoot {
                path: self.dev_root.clone(),
                source,
            })?;
        let entries = fs::read_dir(&root).map_err(|source| ProjectError::DevRoot {
            path: self.dev_root.clone(),
            source,
        })?;

        let mut projects: Vec<ResolvedProject> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                if name.starts_with('.') {
                    return None;
                }
                let abs_path = entry.path().canonicalize().ok()?;
                if !abs_path.is_dir() || !abs_path.starts_with(&root) || abs_path == root {
                    return None;
                }
                if self.excluded.iter().any(|excluded| excluded == &abs_path) {
                    return None;
                }
                Some(ResolvedProject {
                    id: project_id_for(&name),
                    is_git: abs_path.join(".git").exists(),
                    rel_path: name.clone(),
                    name,
                    abs_path,
                })
            })
            .collect();

        projects.sort_by_key(|project| project.name.to_lowercase());
        Ok(projects)
    }
}

impl ProjectResolver for DevRootProjects {
    fn list(&self) -> Result<Vec<ResolvedProject>, ProjectError> {
        self.scan()
    }

    fn resolve(&self, project_id: &str) -> Option<ResolvedProject> {
        if !is_valid_project_id(project_id) {
            debug!(project_id = %project_id, "Malformed project id");
            return None;
        }
        match self.scan() {
            Ok(projects) => projects.into_iter().find(|p| p.id == project_id),
            Err(e) => {
                warn!(error = %e, "Project scan failed");
                None
            }
        }
    }
}
