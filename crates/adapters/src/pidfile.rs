//! Scoped pidfile acquire/release: creation, permissions, and cleanup for
//! the master's pid file.
//!
//! Grounded on the same `fs2` exclusive-lock-then-write pattern the teacher
//! repo uses for its own daemon lock file: open without truncating (so a
//! failed lock attempt never clobbers the running process's pid), take an
//! exclusive advisory lock, then truncate and write.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PidFileError {
    #[error("failed to open pidfile {path}: {source}")]
    Open { path: PathBuf, #[source] source: std::io::Error },
    #[error("pidfile {path} is held by another process (already running?)")]
    AlreadyLocked { path: PathBuf },
    #[error("failed to write pidfile {path}: {source}")]
    Write { path: PathBuf, #[source] source: std::io::Error },
}

/// Holds an exclusive lock on a pidfile for as long as it lives. The file
/// is removed when dropped; the lock itself is released by the OS when the
/// fd closes, which drop also does.
pub struct PidFile {
    path: PathBuf,
    file: File,
}

impl PidFile {
    /// Acquire the pidfile at `path`, writing the current process's pid.
    /// Fails with [`PidFileError::AlreadyLocked`] if another live process
    /// already holds it.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, PidFileError> {
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| PidFileError::Open { path: path.clone(), source })?;

        file.try_lock_exclusive().map_err(|_| PidFileError::AlreadyLocked { path: path.clone() })?;

        let mut file = file;
        file.set_len(0).map_err(|source| PidFileError::Write { path: path.clone(), source })?;
        writeln!(file, "{}", std::process::id())
            .map_err(|source| PidFileError::Write { path: path.clone(), source })?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove pidfile on drop");
        }
    }
}

/// Read a pidfile's contents as a bare pid, for `quit-and-wait` and similar
/// external readers that never hold the lock themselves.
pub fn read_pid(path: &Path) -> std::io::Result<i32> {
    let text = std::fs::read_to_string(path)?;
    text.trim()
        .parse()
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "pidfile does not contain a decimal pid"))
}
