//! fm-core: shared value types for the foreman process supervisor.
//!
//! No process I/O, no signal handling — just the Backoff governor, worker
//! bookkeeping, queue identity, and the signal vocabulary the rest of the
//! workspace builds on.

pub mod backoff;
pub mod queue_key;
pub mod signal;
pub mod worker;

pub use backoff::Backoff;
pub use queue_key::QueueKey;
pub use signal::SupervisorSignal;
pub use worker::{Pid, WorkerRecord, WorkerState};
