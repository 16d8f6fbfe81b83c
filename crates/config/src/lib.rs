//! fm-config: the configuration DSL that decides "how many workers per
//! queue", given a real but minimal interface and implementation.
//!
//! The language behind that decision only needs to exist behind a trait.
//! This crate supplies [`QueueConfig`] and a working `[[queue]]`-table TOML
//! reader so the rest of the workspace is runnable end to end without
//! inventing a whole DSL.

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// One queue definition: how many workers to run and what they execute.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueueSpec {
    pub queue_key: String,
    pub worker_count: u32,
    pub command: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config paths given")]
    NoPaths,
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse { path: PathBuf, #[source] source: toml::de::Error },
    #[error("queue {queue_key:?} in {path} has an empty command")]
    EmptyCommand { path: PathBuf, queue_key: String },
    #[error("duplicate queue key {queue_key:?} across config paths")]
    DuplicateQueueKey { queue_key: String },
}

/// The external interface the rest of the workspace depends on: "evaluate
/// these config paths into the set of queues a listener should staff."
pub trait QueueConfig {
    fn load(paths: &[PathBuf]) -> Result<Vec<QueueSpec>, ConfigError>;
}

#[derive(Debug, Deserialize)]
struct TomlFile {
    #[serde(rename = "queue", default)]
    queues: Vec<QueueSpec>,
}

/// Reads `[[queue]]` tables out of one or more TOML files, merging them in
/// order. Later files may add queues but not redefine an earlier one.
pub struct TomlQueueConfig;

impl QueueConfig for TomlQueueConfig {
    fn load(paths: &[PathBuf]) -> Result<Vec<QueueSpec>, ConfigError> {
        if paths.is_empty() {
            return Err(ConfigError::NoPaths);
        }
        let mut seen = std::collections::HashSet::new();
        let mut specs = Vec::new();
        for path in paths {
            let text = std::fs::read_to_string(path)
                .map_err(|source| ConfigError::Io { path: path.clone(), source })?;
            let parsed: TomlFile = toml::from_str(&text)
                .map_err(|source| ConfigError::Parse { path: path.clone(), source })?;
            for spec in parsed.queues {
                if spec.command.is_empty() {
                    return Err(ConfigError::EmptyCommand {
                        path: path.clone(),
                        queue_key: spec.queue_key,
                    });
                }
                if !seen.insert(spec.queue_key.clone()) {
                    return Err(ConfigError::DuplicateQueueKey { queue_key: spec.queue_key });
                }
                specs.push(spec);
            }
        }
        Ok(specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_a_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queues.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"
            [[queue]]
            queue_key = "a"
            worker_count = 2
            command = ["work", "--queue", "a"]

            [[queue]]
            queue_key = "b"
            worker_count = 1
            command = ["work", "--queue", "b"]
            "#
        )
        .unwrap();

        let specs = TomlQueueConfig::load(&[path]).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].queue_key, "a");
        assert_eq!(specs[0].worker_count, 2);
    }

    #[test]
    fn rejects_duplicate_queue_keys_across_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.toml");
        let b = dir.path().join("b.toml");
        std::fs::write(&a, r#"[[queue]]
queue_key = "x"
worker_count = 1
command = ["work"]
"#)
            .unwrap();
        std::fs::write(&b, r#"[[queue]]
queue_key = "x"
worker_count = 1
command = ["work"]
"#)
            .unwrap();

        let err = TomlQueueConfig::load(&[a, b]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateQueueKey { .. }));
    }

    #[test]
    fn rejects_empty_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queues.toml");
        std::fs::write(
            &path,
            r#"[[queue]]
queue_key = "x"
worker_count = 1
command = []
"#,
        )
        .unwrap();

        let err = TomlQueueConfig::load(&[path]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCommand { .. }));
    }

    #[test]
    fn no_paths_is_an_error() {
        assert!(matches!(TomlQueueConfig::load(&[]), Err(ConfigError::NoPaths)));
    }
}
