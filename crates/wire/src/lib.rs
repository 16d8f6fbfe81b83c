//! fm-wire: the reporting-socket line protocol and `RESQUED_*` env packing.

pub mod env;
pub mod protocol;

pub use env::OldWorker;
pub use protocol::{ListenerMessage, WireError};
