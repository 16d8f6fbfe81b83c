//! fm-adapters: real-but-minimal bodies for the external collaborators —
//! pidfile management, procline updates, and the status sink.

pub mod pidfile;
pub mod procline;
pub mod status_sink;

pub use pidfile::{read_pid, PidFile, PidFileError};
pub use procline::{NullProcline, ProcSelfComm, Procline};
pub use status_sink::{ListenerStatus, StatusSink, WorkerStatus};
