//! fm-proc: process primitives — the self-pipe, the sleepy waiter, signal
//! handler installation, and fork/exec/waitpid wrappers.

pub mod selfpipe;
pub mod signal_queue;
pub mod signals;
pub mod socketpair;
pub mod spawn;
pub mod waiter;

pub use selfpipe::SelfPipe;
pub use signals::{to_nix as signal_to_nix, SignalController};
pub use socketpair::SocketPair;
pub use spawn::{SpawnError, StdioSlot};
pub use waiter::{SleepyWaiter, WakeReason};
