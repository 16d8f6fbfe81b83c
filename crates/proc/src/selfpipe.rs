//! Self-pipe: the async-signal-safe bridge between a signal handler and the
//! regular event loop.
//!
//! A signal handler may not allocate, lock, or do blocking I/O. The only
//! thing it is allowed to do here is write one byte to a non-blocking pipe;
//! [`SleepyWaiter`](crate::waiter::SleepyWaiter) wakes up when that byte
//! arrives.

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::unistd::{pipe, read, write};
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};

#[derive(Debug)]
pub struct SelfPipe {
    read_fd: OwnedFd,
    write_fd: OwnedFd,
}

impl SelfPipe {
    pub fn new() -> nix::Result<Self> {
        let (read_fd, write_fd) = pipe()?;
        set_nonblocking(&read_fd)?;
        set_nonblocking(&write_fd)?;
        Ok(Self { read_fd, write_fd })
    }

    pub fn read_fd(&self) -> RawFd {
        self.read_fd.as_raw_fd()
    }

    /// The raw fd a signal handler should hold onto and write to. Handlers
    /// cannot own an `OwnedFd` (no drop semantics in signal context), so
    /// this hands back the bare integer.
    pub fn write_fd_raw(&self) -> RawFd {
        self.write_fd.as_raw_fd()
    }

    /// Drain every byte currently sitting in the pipe. Called from the main
    /// loop after a wake, never from the handler.
    pub fn drain(&self) {
        let mut buf = [0u8; 64];
        loop {
            match read(self.read_fd.as_raw_fd(), &mut buf) {
                Ok(0) => break,
                Ok(n) if n < buf.len() => break,
                Ok(_) => continue,
                Err(nix::errno::Errno::EAGAIN) => break,
                Err(nix::errno::Errno::EINTR) => continue,
                Err(_) => break,
            }
        }
    }
}

fn set_nonblocking(fd: &OwnedFd) -> nix::Result<()> {
    let flags = fcntl(fd.as_raw_fd(), FcntlArg::F_GETFL)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFL(flags))?;
    Ok(())
}

/// Async-signal-safe nudge: write one byte, ignore all errors (a full pipe
/// means the loop will wake anyway on its next pass).
///
/// # Safety
/// Must only be called with a fd that is known to stay open for the
/// process's lifetime (the self-pipe's write end); calling this from inside
/// a signal handler is the whole point, so it must not allocate or panic.
pub fn awake(write_fd: RawFd) {
    // SAFETY: `write_fd` is a valid, non-blocking fd owned by a `SelfPipe`
    // that outlives the signal handler; a single-byte write is
    // async-signal-safe and its result is deliberately discarded.
    let fd = unsafe { BorrowedFd::borrow_raw(write_fd) };
    let _ = write(fd, &[1u8]);
}
