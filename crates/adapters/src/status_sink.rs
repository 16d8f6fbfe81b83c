//! Optional write-only stream to which the master emits machine-readable
//! lifecycle records for listeners and workers.
//!
//! Pure observation: nothing in the engine ever reads this back or branches
//! on whether it's configured.

use std::fs::File;
use std::io::Write;
use std::os::fd::{FromRawFd, RawFd};

pub enum ListenerStatus {
    Start,
    Ready,
    Stop,
}

pub enum WorkerStatus {
    Start,
    Stop,
}

impl ListenerStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Ready => "ready",
            Self::Stop => "stop",
        }
    }
}

impl WorkerStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

pub struct StatusSink {
    file: File,
}

impl StatusSink {
    /// Wrap an already-open fd (e.g. `--status-pipe FD`) as a status sink.
    ///
    /// # Safety
    /// `fd` must be a valid, open, writable file descriptor that this
    /// process owns and that nothing else will close concurrently; this
    /// struct takes ownership of it.
    pub unsafe fn from_raw_fd(fd: RawFd) -> Self {
        // SAFETY: caller's contract above.
        let file = unsafe { File::from_raw_fd(fd) };
        Self { file }
    }

    pub fn from_file(file: File) -> Self {
        Self { file }
    }

    fn emit(&mut self, line: &str) {
        // Best-effort: a broken status sink must never affect supervision
        // logic, which never depends on it.
        let _ = writeln!(self.file, "{line}");
    }

    pub fn listener(&mut self, pid: i32, status: ListenerStatus) {
        self.emit(&format!("listener,{pid},{}", status.as_str()));
    }

    pub fn worker(&mut self, pid: i32, status: WorkerStatus) {
        self.emit(&format!("worker,{pid},{}", status.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_expected_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.log");
        let file = File::create(&path).unwrap();
        let mut sink = StatusSink::from_file(file);
        sink.listener(123, ListenerStatus::Start);
        sink.worker(456, WorkerStatus::Stop);
        drop(sink);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "listener,123,start\nworker,456,stop\n");
    }
}
