//! Master-side view of one listener generation: its pid, its reporting
//! socket, and a mirror of which workers it last reported running.

use fm_core::{Pid, QueueKey};
use fm_wire::protocol::WireError;
use fm_wire::ListenerMessage;
use std::collections::HashMap;

/// Buffers partial reads off a reporting socket and splits them into
/// complete `\n`-terminated lines. Kept free of any real fd so it can be
/// exercised with plain byte slices.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed newly-read bytes in; returns every complete line they produced
    /// (oldest first), leaving a trailing partial line buffered for next
    /// time.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.drain(..=pos).collect::<Vec<u8>>();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            lines.push(line);
        }
        lines
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyEvent {
    Promoted,
    WorkerStarted { pid: Pid, queue_key: QueueKey },
    WorkerFinished { pid: Pid },
}

/// What the master knows about one listener generation.
pub struct ListenerProxy {
    pid: Pid,
    listener_id: u64,
    promoted: bool,
    running_workers: HashMap<QueueKey, Pid>,
    splitter: LineSplitter,
    disposed: bool,
}

impl ListenerProxy {
    pub fn new(pid: Pid, listener_id: u64) -> Self {
        Self {
            pid,
            listener_id,
            promoted: false,
            running_workers: HashMap::new(),
            splitter: LineSplitter::new(),
            disposed: false,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn listener_id(&self) -> u64 {
        self.listener_id
    }

    pub fn is_promoted(&self) -> bool {
        self.promoted
    }

    pub fn running_workers(&self) -> &HashMap<QueueKey, Pid> {
        &self.running_workers
    }

    /// Snapshot the currently-running workers as `OldWorker`s, for handing
    /// off to a successor generation.
    pub fn old_workers(&self) -> Vec<fm_wire::OldWorker> {
        self.running_workers
            .iter()
            .map(|(q, &p)| fm_wire::OldWorker { pid: p, queue_key: q.clone() })
            .collect()
    }

    /// Feed newly-read bytes from the reporting socket, applying every
    /// complete line to this proxy's state and returning the events it
    /// produced. Malformed lines are dropped; the protocol is diagnostic
    /// plumbing, not load-bearing for correctness.
    pub fn ingest(&mut self, bytes: &[u8]) -> Vec<ProxyEvent> {
        let mut events = Vec::new();
        for line in self.splitter.feed(bytes) {
            match ListenerMessage::decode(&line) {
                Ok(ListenerMessage::Running) => {
                    self.promoted = true;
                    events.push(ProxyEvent::Promoted);
                }
                Ok(ListenerMessage::WorkerStarted { pid, queue_key }) => {
                    self.running_workers.insert(queue_key.clone(), pid);
                    events.push(ProxyEvent::WorkerStarted { pid, queue_key });
                }
                Ok(ListenerMessage::WorkerFinished { pid }) => {
                    self.running_workers.retain(|_, &mut p| p != pid);
                    events.push(ProxyEvent::WorkerFinished { pid });
                }
                Err(WireError::Empty) => {}
                Err(e) => {
                    tracing::warn!(line, error = %e, "dropping malformed reporting-socket line");
                }
            }
        }
        events
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Idempotent: signaling/closing an already-disposed proxy is a no-op.
    pub fn dispose(&mut self) {
        self.disposed = true;
    }
}
