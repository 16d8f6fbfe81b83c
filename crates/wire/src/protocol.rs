//! The reporting-socket line protocol between a listener and its master.
//! UTF-8, `\n`-delimited, one message per line.

use fm_core::{Pid, QueueKey};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerMessage {
    /// First line a listener ever writes; promotes it to current.
    Running,
    /// A worker began work: `+<pid>,<queueKey>`.
    WorkerStarted { pid: Pid, queue_key: QueueKey },
    /// A worker exited (already reaped): `-<pid>`.
    WorkerFinished { pid: Pid },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("empty line")]
    Empty,
    #[error("malformed worker-started line: {0:?}")]
    MalformedStarted(String),
    #[error("malformed worker-finished line: {0:?}")]
    MalformedFinished(String),
    #[error("unrecognized line: {0:?}")]
    Unrecognized(String),
}

impl ListenerMessage {
    /// Render this message as the exact line (including trailing `\n`) that
    /// goes out over the reporting socket.
    pub fn encode(&self) -> String {
        match self {
            Self::Running => "RUNNING\n".to_string(),
            Self::WorkerStarted { pid, queue_key } => format!("+{pid},{queue_key}\n"),
            Self::WorkerFinished { pid } => format!("-{pid}\n"),
        }
    }

    /// Parse one line (without its trailing newline) from the reporting
    /// socket.
    pub fn decode(line: &str) -> Result<Self, WireError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(WireError::Empty);
        }
        if line == "RUNNING" {
            return Ok(Self::Running);
        }
        if let Some(rest) = line.strip_prefix('+') {
            let (pid_str, queue) =
                rest.split_once(',').ok_or_else(|| WireError::MalformedStarted(line.to_string()))?;
            let pid: Pid = pid_str
                .parse()
                .map_err(|_| WireError::MalformedStarted(line.to_string()))?;
            if queue.is_empty() {
                return Err(WireError::MalformedStarted(line.to_string()));
            }
            return Ok(Self::WorkerStarted { pid, queue_key: QueueKey::new(queue) });
        }
        if let Some(rest) = line.strip_prefix('-') {
            let pid: Pid =
                rest.parse().map_err(|_| WireError::MalformedFinished(line.to_string()))?;
            return Ok(Self::WorkerFinished { pid });
        }
        Err(WireError::Unrecognized(line.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_running() {
        assert_eq!(ListenerMessage::decode("RUNNING").unwrap(), ListenerMessage::Running);
    }

    #[test]
    fn round_trips_worker_started() {
        let msg = ListenerMessage::WorkerStarted { pid: 4821, queue_key: QueueKey::new("default") };
        let line = msg.encode();
        assert_eq!(line, "+4821,default\n");
        assert_eq!(ListenerMessage::decode(line.trim_end()).unwrap(), msg);
    }

    #[test]
    fn round_trips_worker_finished() {
        let msg = ListenerMessage::WorkerFinished { pid: 4821 };
        let line = msg.encode();
        assert_eq!(line, "-4821\n");
        assert_eq!(ListenerMessage::decode(line.trim_end()).unwrap(), msg);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(ListenerMessage::decode("").is_err());
        assert!(ListenerMessage::decode("+notapid,queue").is_err());
        assert!(ListenerMessage::decode("+4821").is_err());
        assert!(ListenerMessage::decode("-notapid").is_err());
        assert!(ListenerMessage::decode("garbage").is_err());
    }

    proptest::proptest! {
        #[test]
        fn started_round_trips_for_any_pid_and_ascii_queue(pid in 1i32..i32::MAX, queue in "[a-zA-Z0-9_]{1,20}") {
            let msg = ListenerMessage::WorkerStarted { pid, queue_key: QueueKey::new(queue) };
            let line = msg.encode();
            let decoded = ListenerMessage::decode(line.trim_end()).unwrap();
            assert_eq!(decoded, msg);
        }
    }
}
