//! Canonical identifier for the set of queues a worker drains.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifies what a [`crate::worker::WorkerRecord`] consumes. Two workers —
/// possibly in different listener generations — with the same `QueueKey`
/// are considered the same slot for handoff purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueKey(pub String);

impl QueueKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for QueueKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for QueueKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for QueueKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for QueueKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
