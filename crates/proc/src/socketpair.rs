//! Creates the reporting socket pair shared between a master and one
//! listener generation.
//!
//! Both ends are created close-on-exec by default. The master keeps its end
//! untouched (it never execs over itself while the listener is alive); the
//! listener's end is `dup2`'d onto a fixed fd number in the child right
//! before `execvp`, which — per POSIX — clears `FD_CLOEXEC` on the new
//! descriptor, so it survives into the listener binary. That listener then
//! re-marks its own copy close-on-exec once it's read the fd number out of
//! `RESQUED_SOCKET`, so fds forked workers inherit never include it.

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

pub struct SocketPair {
    pub master_end: OwnedFd,
    pub listener_end: OwnedFd,
}

pub fn create() -> nix::Result<SocketPair> {
    let (master_end, listener_end) =
        socketpair(AddressFamily::Unix, SockType::Stream, None, SockFlag::SOCK_CLOEXEC)?;
    Ok(SocketPair { master_end, listener_end })
}

/// Re-mark a fd close-on-exec after it crossed an `exec` boundary and lost
/// the flag (a plain `dup2` always clears it).
pub fn mark_cloexec(fd: RawFd) -> nix::Result<()> {
    fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    Ok(())
}

pub fn raw(fd: &OwnedFd) -> RawFd {
    fd.as_raw_fd()
}
