//! Listener-side bookkeeping for a single forked worker.

use crate::backoff::Backoff;
use crate::queue_key::QueueKey;

/// Raw process id. Kept as a bare integer here so `fm-core` stays free of a
/// process-management dependency; `fm-proc`/`fm-engine` convert to/from
/// `nix::unistd::Pid` at the edges.
pub type Pid = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    /// Occupying a slot that an older generation's worker (`blocked_on`)
    /// still holds; will not fork until that pid is observed to exit.
    Blocked,
    /// Terminal: set only when the whole listener is shutting down.
    Disposed,
}

/// One worker slot as tracked by a listener.
#[derive(Debug, Clone)]
pub struct WorkerRecord {
    queue_key: QueueKey,
    pid: Option<Pid>,
    state: WorkerState,
    blocked_on: Option<Pid>,
    backoff: Backoff,
}

impl WorkerRecord {
    pub fn new(queue_key: QueueKey) -> Self {
        Self { queue_key, pid: None, state: WorkerState::Idle, blocked_on: None, backoff: Backoff::new() }
    }

    /// Build a record that starts out blocked on an older generation's pid,
    /// used when a new listener inherits `oldWorkers` during handoff.
    pub fn new_blocked(queue_key: QueueKey, blocked_on: Pid) -> Self {
        Self {
            queue_key,
            pid: None,
            state: WorkerState::Blocked,
            blocked_on: Some(blocked_on),
            backoff: Backoff::new(),
        }
    }

    pub fn queue_key(&self) -> &QueueKey {
        &self.queue_key
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn blocked_on(&self) -> Option<Pid> {
        self.blocked_on
    }

    /// Seconds until this worker is next legally allowed to start, or
    /// `None` if it may start now.
    pub fn backing_off_for(&self) -> Option<std::time::Duration> {
        self.backoff.how_long()
    }

    /// Attempt to fork a child for this slot. `spawn` does the actual
    /// fork+exec and returns the child pid; it is only invoked when this
    /// worker is idle and not throttled by backoff. Returns the new pid on
    /// success.
    pub fn try_start<F, E>(&mut self, spawn: F) -> Result<Option<Pid>, E>
    where
        F: FnOnce(&QueueKey) -> Result<Pid, E>,
    {
        if self.state != WorkerState::Idle || self.backoff.wait() {
            return Ok(None);
        }
        let pid = spawn(&self.queue_key)?;
        self.backoff.started();
        self.state = WorkerState::Running;
        self.pid = Some(pid);
        Ok(Some(pid))
    }

    /// Mark this worker blocked on a peer pid in another generation.
    pub fn wait_for(&mut self, other_pid: Pid) {
        self.state = WorkerState::Blocked;
        self.blocked_on = Some(other_pid);
    }

    /// A peer pid this worker was blocked on has exited; if it matches,
    /// become idle and eligible to start. Returns true if it unblocked.
    pub fn unblock_if_matches(&mut self, exited_pid: Pid) -> bool {
        if self.state == WorkerState::Blocked && self.blocked_on == Some(exited_pid) {
            self.state = WorkerState::Idle;
            self.blocked_on = None;
            true
        } else {
            false
        }
    }

    /// The running child finished; transition back to idle and record the
    /// outcome in the per-worker backoff.
    pub fn finished(&mut self, success: bool) {
        self.pid = None;
        self.state = WorkerState::Idle;
        if success {
            // A clean exit while running is not itself a crash; only an
            // explicit `died()` from the caller (on nonzero/unexpected
            // exit) should grow the backoff. We still clear started_at's
            // relevance by leaving Backoff::started() to the next try_start.
        } else {
            self.backoff.died();
        }
    }

    /// Send a signal to the worker, iff it is currently running. Returns
    /// `false` if there was nothing to signal.
    pub fn has_running_pid(&self) -> bool {
        self.state == WorkerState::Running && self.pid.is_some()
    }

    pub fn dispose(&mut self) {
        self.state = WorkerState::Disposed;
        self.pid = None;
    }
}
