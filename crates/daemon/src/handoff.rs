//! Forking a listener generation and building the `RESQUED_*` environment it
//! reads back out on the other side.

use fm_core::Pid;
use fm_wire::env as wire_env;
use fm_wire::OldWorker;
use std::collections::HashMap;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};

use crate::error::DaemonError;

/// Fixed fd number the reporting socket lands on inside a listener process
/// after `exec`. Chosen well above the usual 0/1/2 and any fds a shell
/// might leave open, matching the teacher's convention of reserving a
/// handful of high fd numbers for inherited plumbing.
pub const HANDOFF_FD: i32 = 63;

/// Fixed fd number the inherited status pipe lands on inside a listener
/// process, when the master was started with `--status-pipe`.
pub const STATUS_HANDOFF_FD: i32 = 64;

pub struct SpawnedListener {
    pub pid: Pid,
    pub master_end: OwnedFd,
}

/// Fork a new listener generation: `exe listener`, with the reporting
/// socket handed off on [`HANDOFF_FD`], the status pipe (if any) handed off
/// on [`STATUS_HANDOFF_FD`], and config/state passed via `RESQUED_*`
/// environment variables.
pub fn spawn_listener(
    exe: &Path,
    config_paths: &[PathBuf],
    listener_id: u64,
    master_version: u32,
    old_workers: &[OldWorker],
    status_fd: Option<RawFd>,
) -> Result<SpawnedListener, DaemonError> {
    let pair = fm_proc::socketpair::create()?;
    let listener_fd = pair.listener_end.as_raw_fd();

    let mut env = HashMap::new();
    env.insert(wire_env::SOCKET_FD.to_string(), HANDOFF_FD.to_string());
    env.insert(wire_env::CONFIG_PATH.to_string(), wire_env::pack_config_paths(config_paths));
    env.insert(wire_env::STATE.to_string(), wire_env::pack_state(old_workers));
    env.insert(wire_env::LISTENER_ID.to_string(), listener_id.to_string());
    env.insert(wire_env::MASTER_VERSION.to_string(), master_version.to_string());
    if status_fd.is_some() {
        env.insert(wire_env::STATUS_FD.to_string(), STATUS_HANDOFF_FD.to_string());
    }

    let argv = vec![exe.to_string_lossy().into_owned(), "listener".to_string()];

    // SAFETY: the master is single-threaded up to this point;
    // the pre_exec closure only dup2s known fds, which is async-signal-safe.
    let pid = unsafe {
        fm_proc::spawn::fork_exec(&argv, &env, move || {
            fm_proc::spawn::dup_fd_onto(listener_fd, fm_proc::spawn::StdioSlot::Fixed(HANDOFF_FD))?;
            if let Some(fd) = status_fd {
                fm_proc::spawn::dup_fd_onto(fd, fm_proc::spawn::StdioSlot::Fixed(STATUS_HANDOFF_FD))?;
            }
            Ok(())
        })
    }?;

    // The child has its own copy of listener_end via fork; the master
    // doesn't need its copy once the child has dup2'd it onto HANDOFF_FD.
    drop(pair.listener_end);

    Ok(SpawnedListener { pid, master_end: pair.master_end })
}
