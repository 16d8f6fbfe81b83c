//! Supervisor-relevant signal tags, independent of any signal-handling crate.
//!
//! Handlers enqueue these tags; the main loop pops and acts on them. Kept
//! free of `nix`/`libc` so `fm-core` has no process dependency —
//! `fm-proc` maps real `nix::sys::signal::Signal` values to/from this enum.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorSignal {
    Hup,
    Usr2,
    Cont,
    Int,
    Term,
    Quit,
    Chld,
    /// Optional diagnostic dump; only meaningful where the platform supports
    /// it. Never required for correctness.
    Info,
}

impl SupervisorSignal {
    /// True for the three signals that mean "shut down".
    pub fn is_shutdown(self) -> bool {
        matches!(self, Self::Int | Self::Term | Self::Quit)
    }
}
