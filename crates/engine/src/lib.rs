//! fm-engine: the listener and master state machines built on top of
//! fm-core's value types, fm-proc's process primitives, and fm-wire's
//! protocol.

pub mod listener;
pub mod listener_proxy;
pub mod master;

pub use listener::{expand_worker_slots, worker_commands, ListenerWorkers};
pub use listener_proxy::{ListenerProxy, ProxyEvent};
pub use master::{Action, MasterCore};
