//! Thin fork/exec/waitpid wrappers. The listener uses these to start
//! workers; the master uses them to start listeners.

use fm_core::Pid;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{close, execvp, fork, ForkResult};
use std::collections::HashMap;
use std::ffi::CString;
use std::os::fd::{AsRawFd, RawFd};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),
    #[error("exec failed: {0}")]
    Exec(#[source] nix::Error),
    #[error("command had no argv[0]")]
    EmptyCommand,
}

/// Fork a child that execs `argv[0]` with the given arguments and
/// environment, first running `pre_exec` in the child (used to dup a
/// reporting-socket fd onto a well-known number, etc). `pre_exec` must only
/// perform async-signal-safe operations since it runs after `fork` and
/// before `exec`, with no other threads.
///
/// # Safety
/// `fork()` is unsafe because the child inherits only one thread of a
/// possibly-multi-threaded process; this supervisor keeps every process
/// single-threaded up to this point, so the usual fork+threads
/// hazards don't apply. `pre_exec` runs in that constrained child
/// environment and must not allocate in ways that could deadlock on a
/// inherited-but-now-gone lock.
pub unsafe fn fork_exec(
    argv: &[String],
    extra_env: &HashMap<String, String>,
    pre_exec: impl FnOnce() -> nix::Result<()>,
) -> Result<Pid, SpawnError> {
    if argv.is_empty() {
        return Err(SpawnError::EmptyCommand);
    }
    // SAFETY: per this function's own contract — single-threaded caller,
    // child only does async-signal-safe work before exec.
    match unsafe { fork() }.map_err(SpawnError::Fork)? {
        ForkResult::Parent { child } => Ok(child.as_raw()),
        ForkResult::Child => {
            if pre_exec().is_err() {
                // Can't log richly here (async-signal-safety), just bail.
                std::process::exit(127);
            }
            for (k, v) in extra_env {
                // SAFETY: child is single-threaded and about to exec; no
                // other code observes the environment concurrently.
                unsafe { std::env::set_var(k, v) };
            }
            let cargv: Vec<CString> = argv
                .iter()
                .map(|s| CString::new(s.as_bytes()).unwrap_or_default())
                .collect();
            let _ = execvp(&cargv[0], &cargv);
            // execvp only returns on error.
            std::process::exit(127);
        }
    }
}

/// Redirect fd `from` onto a well-known slot in the child, used by
/// `pre_exec` closures (e.g. handing the reporting socket to a listener on
/// a fixed fd number via `StdioSlot::Fixed`).
pub fn dup_fd_onto(from: RawFd, target: StdioSlot) -> nix::Result<()> {
    let to = match target {
        StdioSlot::Stdin => libc::STDIN_FILENO,
        StdioSlot::Stdout => libc::STDOUT_FILENO,
        StdioSlot::Fixed(fd) => fd,
    };
    // SAFETY: `from` and `to` are plain fd numbers; `dup2` itself cannot
    // violate memory safety, it only duplicates a file descriptor table
    // entry. Errors are returned, not ignored.
    let rc = unsafe { libc::dup2(from, to) };
    if rc < 0 {
        return Err(nix::Error::last());
    }
    Ok(())
}

pub enum StdioSlot {
    Stdin,
    Stdout,
    Fixed(RawFd),
}

/// Close a fd in the child, ignoring "already closed."
pub fn close_fd(fd: RawFd) {
    let _ = close(fd);
}

pub fn fd_raw(fd: &impl AsRawFd) -> RawFd {
    fd.as_raw_fd()
}

/// Non-blocking reap of one exited child. Returns `Ok(None)` both when
/// nothing has exited and when there are no children left: `ECHILD` is
/// treated as a "no children" sentinel, not an error.
pub fn try_reap_one() -> Result<Option<(Pid, bool)>, nix::Error> {
    match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::Exited(pid, code)) => Ok(Some((pid.as_raw(), code == 0))),
        Ok(WaitStatus::Signaled(pid, _, _)) => Ok(Some((pid.as_raw(), false))),
        Ok(_) => Ok(None),
        Err(nix::errno::Errno::ECHILD) => Ok(None),
        Err(e) => Err(e),
    }
}

/// One final blocking wait for a specific child, used at the end of a
/// shutdown drain.
pub fn wait_blocking(pid: Pid) -> Result<(), nix::Error> {
    use nix::unistd::Pid as NixPid;
    match waitpid(NixPid::from_raw(pid), None) {
        Ok(_) => Ok(()),
        Err(nix::errno::Errno::ECHILD) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Block until any child exits, for the tail of a shutdown drain once
/// non-blocking polling has nothing left to pick up. Returns `Ok(None)` if
/// there are no children left to wait for.
pub fn wait_blocking_any() -> Result<Option<(Pid, bool)>, nix::Error> {
    match waitpid(None, None) {
        Ok(WaitStatus::Exited(pid, code)) => Ok(Some((pid.as_raw(), code == 0))),
        Ok(WaitStatus::Signaled(pid, _, _)) => Ok(Some((pid.as_raw(), false))),
        Ok(_) => Ok(None),
        Err(nix::errno::Errno::ECHILD) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Send a signal to a pid, treating `ESRCH` ("already gone") as success.
pub fn kill_ignoring_esrch(pid: Pid, sig: nix::sys::signal::Signal) -> Result<(), nix::Error> {
    use nix::unistd::Pid as NixPid;
    match nix::sys::signal::kill(NixPid::from_raw(pid), sig) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(e),
    }
}
