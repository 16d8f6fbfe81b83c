use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("pidfile error: {0}")]
    PidFile(#[from] fm_adapters::PidFileError),
    #[error("config error: {0}")]
    Config(#[from] fm_config::ConfigError),
    #[error("process error: {0}")]
    Nix(#[from] nix::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("spawn error: {0}")]
    Spawn(#[from] fm_proc::SpawnError),
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),
    #[error("malformed {name} in environment: {value:?}")]
    MalformedEnv { name: &'static str, value: String },
    #[error("failed to open log file {path}: {source}")]
    LogFile { path: PathBuf, #[source] source: std::io::Error },
}
