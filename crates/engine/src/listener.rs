//! The listener: owns a config snapshot and a bag of worker records, forks
//! and reaps workers, and reports events upstream.

use fm_config::QueueSpec;
use fm_core::{Pid, QueueKey, WorkerRecord, WorkerState};
use fm_wire::env::OldWorker;
use fm_wire::ListenerMessage;
use std::collections::HashMap;
use std::time::Duration;

const MAX_SLEEP: Duration = Duration::from_secs(60);

/// Expand `[[queue]]` specs into individual worker slots. A spec with
/// `worker_count = N` becomes N distinct queue keys (`"<key>.0"` ..
/// `"<key>.{N-1}"`) so the "at most one running worker per queue key"
/// invariant holds even when a queue wants several workers.
pub fn expand_worker_slots(specs: &[QueueSpec], old_workers: &[OldWorker]) -> Vec<WorkerRecord> {
    let mut workers = Vec::new();
    for spec in specs {
        for i in 0..spec.worker_count {
            let key = QueueKey::new(format!("{}.{i}", spec.queue_key));
            let inherited = old_workers.iter().find(|w| w.queue_key == key);
            workers.push(match inherited {
                Some(old) => WorkerRecord::new_blocked(key, old.pid),
                None => WorkerRecord::new(key),
            });
        }
    }
    workers
}

/// Map each expanded worker slot back to the command it should run. Kept in
/// lockstep with [`expand_worker_slots`]'s key-suffixing scheme so callers
/// never have to reimplement it to find a worker's argv.
pub fn worker_commands(specs: &[QueueSpec]) -> HashMap<QueueKey, Vec<String>> {
    let mut commands = HashMap::new();
    for spec in specs {
        for i in 0..spec.worker_count {
            commands.insert(QueueKey::new(format!("{}.{i}", spec.queue_key)), spec.command.clone());
        }
    }
    commands
}

/// The state owned by one listener process: its workers, keyed implicitly
/// by position (queue keys are unique within a listener by construction).
pub struct ListenerWorkers {
    workers: Vec<WorkerRecord>,
}

impl ListenerWorkers {
    pub fn new(workers: Vec<WorkerRecord>) -> Self {
        Self { workers }
    }

    pub fn workers(&self) -> &[WorkerRecord] {
        &self.workers
    }

    /// Step 1 of `run_workers_run`: fold in one exited child, producing the
    /// `-pid` message to report upstream. `success` mirrors whether the
    /// exit was clean (used to engage per-worker backoff on failure).
    pub fn reap(&mut self, pid: Pid, success: bool) -> Option<ListenerMessage> {
        let worker = self.workers.iter_mut().find(|w| w.pid() == Some(pid))?;
        worker.finished(success);
        Some(ListenerMessage::WorkerFinished { pid })
    }

    /// Step 2: master forwarded `exited_pid` (a worker from another
    /// generation that just finished); unblock any of our workers waiting
    /// on it.
    pub fn unblock(&mut self, exited_pid: Pid) {
        for worker in &mut self.workers {
            worker.unblock_if_matches(exited_pid);
        }
    }

    /// Step 3: try to start every idle, unthrottled worker. `spawn` does
    /// the real fork+exec and is called once per eligible worker.
    pub fn start_eligible<F, E>(&mut self, mut spawn: F) -> Vec<Result<ListenerMessage, E>>
    where
        F: FnMut(&QueueKey) -> Result<Pid, E>,
    {
        let mut out = Vec::new();
        for worker in &mut self.workers {
            if worker.state() != WorkerState::Idle || worker.backing_off_for().is_some() {
                continue;
            }
            let queue_key = worker.queue_key().clone();
            match worker.try_start(|q| spawn(q)) {
                Ok(Some(pid)) => out.push(Ok(ListenerMessage::WorkerStarted { pid, queue_key })),
                Ok(None) => {}
                Err(e) => out.push(Err(e)),
            }
        }
        out
    }

    /// How long the main loop may sleep: the smallest per-worker backoff
    /// remaining, capped at [`MAX_SLEEP`].
    pub fn sleep_duration(&self) -> Duration {
        self.workers
            .iter()
            .filter_map(|w| w.backing_off_for())
            .min()
            .unwrap_or(MAX_SLEEP)
            .min(MAX_SLEEP)
    }

    /// True once every worker has been disposed (used by shutdown).
    pub fn all_disposed(&self) -> bool {
        self.workers.iter().all(|w| w.state() == WorkerState::Disposed)
    }

    pub fn dispose_all(&mut self) {
        for w in &mut self.workers {
            w.dispose();
        }
    }

    /// Pids of workers currently running, for shutdown signal delivery.
    pub fn running_pids(&self) -> Vec<Pid> {
        self.workers.iter().filter(|w| w.has_running_pid()).filter_map(|w| w.pid()).collect()
    }
}
