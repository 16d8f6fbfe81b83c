//! Installs `sigaction` handlers that enqueue onto a process-wide
//! [`SignalQueue`] and nudge a [`SelfPipe`].
//!
//! Real OS signal handlers cannot close over arbitrary state — they're bare
//! `extern "C" fn`s — so the queue and the self-pipe's write fd necessarily
//! live in process-wide statics. `SignalController` is the one object per
//! process that owns installing/querying them: each process kind (master,
//! listener) has exactly one, even though the storage underneath it can't
//! avoid being global.

use crate::selfpipe::awake;
use crate::signal_queue::SignalQueue;
use fm_core::SupervisorSignal;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal as NixSignal};
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};

static QUEUE: SignalQueue = SignalQueue::new();
static WAKE_FD: AtomicI32 = AtomicI32::new(-1);

extern "C" fn handle_signal(raw: libc::c_int) {
    QUEUE.push(raw);
    let fd = WAKE_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        awake(fd as RawFd);
    }
}

/// Map a `nix` signal to our process-neutral tag. Signals we don't install
/// a handler for never reach here.
fn from_nix(sig: NixSignal) -> Option<SupervisorSignal> {
    match sig {
        NixSignal::SIGHUP => Some(SupervisorSignal::Hup),
        NixSignal::SIGUSR2 => Some(SupervisorSignal::Usr2),
        NixSignal::SIGCONT => Some(SupervisorSignal::Cont),
        NixSignal::SIGINT => Some(SupervisorSignal::Int),
        NixSignal::SIGTERM => Some(SupervisorSignal::Term),
        NixSignal::SIGQUIT => Some(SupervisorSignal::Quit),
        NixSignal::SIGCHLD => Some(SupervisorSignal::Chld),
        #[cfg(target_os = "linux")]
        NixSignal::SIGPWR => Some(SupervisorSignal::Info),
        _ => None,
    }
}

/// Map our process-neutral tag to the real signal to raise, for callers
/// that need to send (not just receive) one of these signals.
pub fn to_nix(sig: SupervisorSignal) -> NixSignal {
    match sig {
        SupervisorSignal::Hup => NixSignal::SIGHUP,
        SupervisorSignal::Usr2 => NixSignal::SIGUSR2,
        SupervisorSignal::Cont => NixSignal::SIGCONT,
        SupervisorSignal::Int => NixSignal::SIGINT,
        SupervisorSignal::Term => NixSignal::SIGTERM,
        SupervisorSignal::Quit => NixSignal::SIGQUIT,
        SupervisorSignal::Chld => NixSignal::SIGCHLD,
        #[cfg(target_os = "linux")]
        SupervisorSignal::Info => NixSignal::SIGPWR,
        #[cfg(not(target_os = "linux"))]
        SupervisorSignal::Info => NixSignal::SIGINFO,
    }
}

/// Set SIGPIPE to SIG_IGN so a write to a reporting socket whose peer has
/// already exited returns `EPIPE` instead of killing the process. SIG_IGN
/// survives fork and exec, so children see it too unless they reset it.
pub fn ignore_sigpipe() -> nix::Result<()> {
    // SAFETY: SIG_IGN is a valid, stateless handler; no signal-table race
    // is possible this early, before any other handlers are installed.
    unsafe {
        sigaction(
            NixSignal::SIGPIPE,
            &SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty()),
        )
    }?;
    Ok(())
}

/// Installs handlers for the given signals and wires them to `wake_fd` (the
/// write end of the owning process's [`crate::selfpipe::SelfPipe`]).
///
/// Only one `SignalController` should exist per process; installing twice
/// simply re-registers the same handlers.
pub struct SignalController;

impl SignalController {
    /// # Safety
    /// Installs process-wide signal handlers via `sigaction`. Must be
    /// called before any other thread is spawned that might race on the
    /// handler table, and `wake_fd` must stay valid for the rest of the
    /// process's life.
    pub unsafe fn install(wake_fd: RawFd, signals: &[SupervisorSignal]) -> nix::Result<Self> {
        WAKE_FD.store(wake_fd as i32, Ordering::Relaxed);
        let action = SigAction::new(SigHandler::Handler(handle_signal), SaFlags::SA_RESTART, SigSet::empty());
        for &sig in signals {
            // SAFETY: `action` only performs the async-signal-safe queue
            // push and self-pipe write described above; `sigaction` itself
            // requires no other invariants beyond "don't race the handler
            // table," which the caller promises.
            unsafe {
                sigaction(to_nix(sig), &action)?;
            }
        }
        Ok(Self)
    }

    /// Pop the oldest pending signal, if any.
    pub fn pop(&self) -> Option<SupervisorSignal> {
        loop {
            let raw = QUEUE.pop()?;
            if let Some(sig) = NixSignal::try_from(raw).ok().and_then(from_nix) {
                return Some(sig);
            }
            // Not one we registered for (shouldn't happen); drop and retry.
        }
    }

    /// True if the self-pipe's read end should be polled: always, while
    /// this controller is alive. Exposed for callers that want to assert a
    /// wake_fd was set.
    pub fn is_installed() -> bool {
        WAKE_FD.load(Ordering::Relaxed) >= 0
    }
}
