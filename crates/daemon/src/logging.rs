//! Tracing setup shared by the master and listener processes: stderr by
//! default, or a non-blocking appender when `--log-file` is given.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Holds the non-blocking writer guard alive for the process's lifetime;
/// dropping it would stop flushing buffered log lines.
pub struct LoggingGuard(Option<tracing_appender::non_blocking::WorkerGuard>);

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init_stderr() -> LoggingGuard {
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter()).try_init();
    LoggingGuard(None)
}

pub fn init_file(path: &Path) -> Result<LoggingGuard, crate::error::DaemonError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("foreman.log"));
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter()).with_writer(writer).with_ansi(false).try_init();
    Ok(LoggingGuard(Some(guard)))
}
