//! Packing/unpacking the `RESQUED_*` environment variables a master sets
//! before `exec`'ing a listener.

use fm_core::{Pid, QueueKey};
use std::path::PathBuf;

pub const SOCKET_FD: &str = "RESQUED_SOCKET";
pub const CONFIG_PATH: &str = "RESQUED_CONFIG_PATH";
pub const STATE: &str = "RESQUED_STATE";
pub const LISTENER_ID: &str = "RESQUED_LISTENER_ID";
pub const MASTER_VERSION: &str = "RESQUED_MASTER_VERSION";
/// Set only when the master itself was given `--status-pipe`; carries the
/// fd number the listener should dup its own status writes onto.
pub const STATUS_FD: &str = "RESQUED_STATUS_FD";

/// One entry of `RESQUED_STATE`: a worker from a previous generation that
/// the new listener should treat as still occupying its queue's slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OldWorker {
    pub pid: Pid,
    pub queue_key: QueueKey,
}

/// Join config paths with `:`, matching `RESQUED_CONFIG_PATH`.
pub fn pack_config_paths(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| p.to_string_lossy()).collect::<Vec<_>>().join(":")
}

/// Split `RESQUED_CONFIG_PATH` back into paths.
pub fn unpack_config_paths(value: &str) -> Vec<PathBuf> {
    if value.is_empty() {
        return Vec::new();
    }
    value.split(':').map(PathBuf::from).collect()
}

/// Join `oldWorkers` into `RESQUED_STATE`: `pid|queueKey` items joined by `||`.
pub fn pack_state(workers: &[OldWorker]) -> String {
    workers
        .iter()
        .map(|w| format!("{}|{}", w.pid, w.queue_key))
        .collect::<Vec<_>>()
        .join("||")
}

/// Parse `RESQUED_STATE`. Pid parsing is strictly decimal with no leading
/// `+`; any malformed item is dropped rather than failing the whole parse
/// (the caller is expected to log a warning when this function drops
/// anything — see [`unpack_state_lenient`]).
pub fn unpack_state(value: &str) -> Vec<OldWorker> {
    if value.is_empty() {
        return Vec::new();
    }
    value
        .split("||")
        .filter_map(|item| {
            let (pid_str, queue) = item.split_once('|')?;
            if pid_str.starts_with('+') {
                return None;
            }
            let pid: Pid = pid_str.parse().ok()?;
            if queue.is_empty() {
                return None;
            }
            Some(OldWorker { pid, queue_key: QueueKey::new(queue) })
        })
        .collect()
}

/// Like [`unpack_state`] but logs a warning for each malformed item instead
/// of silently dropping it.
pub fn unpack_state_lenient(value: &str) -> Vec<OldWorker> {
    if value.is_empty() {
        return Vec::new();
    }
    value
        .split("||")
        .filter_map(|item| match parse_state_item(item) {
            Ok(w) => Some(w),
            Err(reason) => {
                tracing::warn!(item, reason, "dropping malformed RESQUED_STATE item");
                None
            }
        })
        .collect()
}

fn parse_state_item(item: &str) -> Result<OldWorker, &'static str> {
    let (pid_str, queue) = item.split_once('|').ok_or("missing '|' separator")?;
    if pid_str.starts_with('+') {
        return Err("leading '+' not allowed in pid");
    }
    let pid: Pid = pid_str.parse().map_err(|_| "pid is not decimal")?;
    if queue.is_empty() {
        return Err("empty queue key");
    }
    Ok(OldWorker { pid, queue_key: QueueKey::new(queue) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_paths_round_trip() {
        let paths = vec![PathBuf::from("/etc/a.conf"), PathBuf::from("/etc/b.conf")];
        let packed = pack_config_paths(&paths);
        assert_eq!(packed, "/etc/a.conf:/etc/b.conf");
        assert_eq!(unpack_config_paths(&packed), paths);
    }

    #[test]
    fn state_round_trips_modulo_order() {
        let workers = vec![
            OldWorker { pid: 111, queue_key: QueueKey::new("a") },
            OldWorker { pid: 222, queue_key: QueueKey::new("b") },
        ];
        let packed = pack_state(&workers);
        assert_eq!(packed, "111|a||222|b");
        let mut round_tripped = unpack_state(&packed);
        let mut expected = workers;
        round_tripped.sort_by_key(|w| w.pid);
        expected.sort_by_key(|w| w.pid);
        assert_eq!(round_tripped, expected);
    }

    #[test]
    fn empty_state_is_empty() {
        assert!(unpack_state("").is_empty());
        assert!(pack_state(&[]).is_empty());
    }

    #[test]
    fn rejects_leading_plus_and_non_decimal() {
        assert!(unpack_state("+5|a").is_empty());
        assert!(unpack_state("abc|a").is_empty());
        assert!(unpack_state("5|").is_empty());
    }

    #[test]
    fn lenient_parse_keeps_well_formed_items_despite_one_bad_item() {
        let parsed = unpack_state_lenient("5|a||+6|b||7|c");
        assert_eq!(
            parsed,
            vec![
                OldWorker { pid: 5, queue_key: QueueKey::new("a") },
                OldWorker { pid: 7, queue_key: QueueKey::new("c") },
            ]
        );
    }
}
