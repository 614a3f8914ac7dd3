//! Per-project activity log
//!
//! One append-only text file per project, one line per event. Readers can
//! take a tail snapshot and then follow lines appended after it.

use crate::projects::is_valid_project_id;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Append-only sink for activity lines
#[cfg_attr(test, mockall::automock)]
pub trait ActivityLog: Send + Sync {
    /// Append one line to the project's log
    fn append(&self, project_id: &str, line: &str) -> io::Result<()>;
}

/// Activity log stored as `<dir>/<project_id>.log`
#[derive(Debug, Clone)]
pub struct FileActivityLog {
    dir: PathBuf,
}

impl FileActivityLog {
    /// Store logs under `dir` (created on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Log directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the log file for `project_id`
    pub fn path_for(&self, project_id: &str) -> io::Result<PathBuf> {
        if !is_valid_project_id(project_id) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid project id: {project_id:?}"),
            ));
        }
        Ok(self.dir.join(format!("{project_id}.log")))
    }

    /// Last `limit` lines of a project's log, oldest first
    pub fn tail(&self, project_id: &str, limit: usize) -> io::Result<Vec<String>> {
        let path = self.path_for(project_id)?;
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let lines = BufReader::new(file).lines().collect::<io::Result<Vec<_>>>()?;
        let skip = lines.len().saturating_sub(limit);
        Ok(lines.into_iter().skip(skip).collect())
    }

    /// Last `limit` complete lines plus a follower positioned right after them
    ///
    /// Taken from a single read, so no line is both in the snapshot and
    /// reported by the follower, and none falls between the two.
    pub fn tail_and_follow(
        &self,
        project_id: &str,
        limit: usize,
    ) -> io::Result<(Vec<String>, LogFollower)> {
        let path = self.path_for(project_id)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };

        let complete = bytes
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1);
        let mut follower = LogFollower {
            path,
            offset: 0,
            pending: bytes[..complete].to_vec(),
        };
        let lines = follower.drain_complete_lines();
        follower.offset = complete as u64;

        let skip = lines.len().saturating_sub(limit);
        Ok((lines.into_iter().skip(skip).collect(), follower))
    }
}

/// Reads lines appended to one log file since the last read
#[derive(Debug)]
pub struct LogFollower {
    path: PathBuf,
    offset: u64,
    pending: Vec<u8>,
}

impl LogFollower {
    /// Complete lines appended since the previous call
    ///
    /// A trailing line without its newline is held back until it is
    /// finished. A file that shrank is read again from the start.
    pub fn read_new_lines(&mut self) -> io::Result<Vec<String>> {
        let mut file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        if file.metadata()?.len() < self.offset {
            self.offset = 0;
            self.pending.clear();
        }
        file.seek(SeekFrom::Start(self.offset))?;
        let read = file.read_to_end(&mut self.pending)?;
        self.offset += read as u64;

        Ok(self.drain_complete_lines())
    }

    fn drain_complete_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..pos]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }
}

impl ActivityLog for FileActivityLog {
    fn append(&self, project_id: &str, line: &str) -> io::Result<()> {
        let path = self.path_for(project_id)?;
        fs::create_dir_all(&self.dir)?;

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let escaped = line.replace('\r', "\\r").replace('\n', "\\n");
        writeln!(file, "{escaped}")
    }
}
