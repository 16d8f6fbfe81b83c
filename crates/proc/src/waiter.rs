//! The sleepy waiter: block until a timeout elapses, a signal wakes us via
//! the self-pipe, or one of a caller-given set of fds becomes readable.

use crate::selfpipe::SelfPipe;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::os::fd::{AsFd, BorrowedFd, RawFd};
use std::time::Duration;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum WakeReason {
    Timeout,
    Signal,
    Readable,
}

pub struct SleepyWaiter<'a> {
    self_pipe: &'a SelfPipe,
}

impl<'a> SleepyWaiter<'a> {
    pub fn new(self_pipe: &'a SelfPipe) -> Self {
        Self { self_pipe }
    }

    /// Block for at most `duration`, waking early if any fd in `fds`
    /// becomes readable or a signal arrives. The self-pipe is always
    /// drained before returning `WakeReason::Signal` so the next call
    /// starts clean.
    pub fn wait(&self, duration: Duration, fds: &[RawFd]) -> WakeReason {
        let self_pipe_fd = self.self_pipe.read_fd();
        // SAFETY-free: PollFd just borrows the raw fds for the duration of
        // this call; none of them are closed while we hold the borrow.
        let borrowed: Vec<BorrowedFd> =
            std::iter::once(self_pipe_fd).chain(fds.iter().copied()).map(borrow).collect();
        let mut pollfds: Vec<PollFd> =
            borrowed.iter().map(|fd| PollFd::new(fd.as_fd(), PollFlags::POLLIN)).collect();

        let timeout = PollTimeout::try_from(duration.as_millis().min(i32::MAX as u128) as i32)
            .unwrap_or(PollTimeout::MAX);

        match poll(&mut pollfds, timeout) {
            Ok(0) => WakeReason::Timeout,
            Ok(_) => {
                let self_pipe_ready = pollfds[0]
                    .revents()
                    .map(|r| r.contains(PollFlags::POLLIN))
                    .unwrap_or(false);
                if self_pipe_ready {
                    self.self_pipe.drain();
                    WakeReason::Signal
                } else {
                    WakeReason::Readable
                }
            }
            Err(nix::errno::Errno::EINTR) => WakeReason::Signal,
            Err(_) => WakeReason::Timeout,
        }
    }
}

fn borrow(fd: RawFd) -> BorrowedFd<'static> {
    // SAFETY: every fd passed in here (the self-pipe's read end, and the
    // caller's status-socket fds) is kept alive by its owner for at least
    // the duration of this blocking call; we never store the BorrowedFd
    // past `wait`'s return.
    unsafe { BorrowedFd::borrow_raw(fd) }
}
