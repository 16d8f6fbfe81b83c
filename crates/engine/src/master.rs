//! The master's state machine: which listener generation is current, which
//! (if any) is still booting during a reload, and what to do about each
//! incoming signal or listener exit.
//!
//! This module only decides *what* should happen next; it never forks,
//! signals, or waits on anything itself; [`Action`] values carry the
//! decision out to a caller that owns real fds and pids.

use fm_core::{Backoff, Pid, SupervisorSignal};
use fm_wire::OldWorker;

use crate::listener_proxy::ListenerProxy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Fork a new listener generation, handing off `old_workers` via its
    /// environment so it starts those queue slots blocked rather than idle.
    ForkListener { listener_id: u64, old_workers: Vec<OldWorker> },
    SignalPid { pid: Pid, sig: SupervisorSignal },
    /// The booting generation reported `RUNNING`; it becomes current and the
    /// previous current (if any) should be asked to quit.
    PromoteBooting,
    /// A worker in the current (pre-handoff) generation exited; relay it to
    /// the booting generation over its reporting socket so a worker slot
    /// that generation inherited as blocked can unblock.
    ForwardToBooting { pid: Pid },
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No listener has ever been forked yet.
    Starting,
    /// One listener promoted and running normally.
    Running,
    /// A second generation is booting alongside a still-current one.
    HandingOff,
    /// A shutdown signal has been received; waiting for listeners to exit.
    ShuttingDown,
}

pub struct MasterCore {
    phase: Phase,
    current: Option<ListenerProxy>,
    booting: Option<ListenerProxy>,
    next_listener_id: u64,
    listener_backoff: Backoff,
    shutdown_signal: Option<SupervisorSignal>,
    paused: bool,
}

impl MasterCore {
    pub fn new() -> Self {
        Self {
            phase: Phase::Starting,
            current: None,
            booting: None,
            next_listener_id: 1,
            listener_backoff: Backoff::new(),
            shutdown_signal: None,
            paused: false,
        }
    }

    pub fn current(&self) -> Option<&ListenerProxy> {
        self.current.as_ref()
    }

    pub fn booting(&self) -> Option<&ListenerProxy> {
        self.booting.as_ref()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.phase == Phase::ShuttingDown
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Called once at startup, or whenever a fresh listener generation is
    /// needed and nothing is currently in flight.
    pub fn start_initial_listener(&mut self) -> Option<Action> {
        if self.paused || self.phase != Phase::Starting || self.listener_backoff.wait() {
            return None;
        }
        let listener_id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listener_backoff.started();
        Some(Action::ForkListener { listener_id, old_workers: Vec::new() })
    }

    /// `USR2` arrived: suspend job processing. The current listener (if any)
    /// is asked to quit and forgotten immediately so no new listener is
    /// forked until `resume()` is called, matching spec's "clear
    /// currentListener" semantics rather than waiting for it to be reaped.
    pub fn pause(&mut self) -> Vec<Action> {
        if self.paused {
            return Vec::new();
        }
        self.paused = true;
        let mut actions = Vec::new();
        if let Some(c) = self.current.take() {
            actions.push(Action::SignalPid { pid: c.pid(), sig: SupervisorSignal::Quit });
        }
        if self.phase != Phase::ShuttingDown {
            self.phase = Phase::Starting;
        }
        actions
    }

    /// `CONT` arrived: resume job processing and forward `CONT` to whatever
    /// listener generations are still alive (a booting one that survived
    /// a pause, most likely).
    pub fn resume(&mut self) -> Vec<Action> {
        self.paused = false;
        self.forward_to_listeners(SupervisorSignal::Cont)
    }

    /// Record that a just-forked listener is now the one we're waiting on.
    pub fn note_forked(&mut self, pid: Pid, listener_id: u64) {
        let proxy = ListenerProxy::new(pid, listener_id);
        match self.phase {
            Phase::Starting => {
                self.current = Some(proxy);
                self.phase = Phase::Running;
            }
            _ => {
                self.booting = Some(proxy);
                self.phase = Phase::HandingOff;
            }
        }
    }

    /// Feed bytes read off a listener's reporting socket; returns any
    /// resulting [`Action`]s (at most a promotion).
    pub fn ingest_from(&mut self, pid: Pid, bytes: &[u8]) -> Vec<Action> {
        let mut actions = Vec::new();
        let is_booting = self.booting.as_ref().is_some_and(|b| b.pid() == pid);
        let is_current = self.current.as_ref().is_some_and(|c| c.pid() == pid);

        if is_booting {
            if let Some(booting) = self.booting.as_mut() {
                let events = booting.ingest(bytes);
                if events.iter().any(|e| matches!(e, crate::listener_proxy::ProxyEvent::Promoted)) {
                    actions.push(Action::PromoteBooting);
                }
            }
        } else if is_current {
            let events = self.current.as_mut().map(|c| c.ingest(bytes)).unwrap_or_default();
            if self.booting.is_some() {
                for event in events {
                    if let crate::listener_proxy::ProxyEvent::WorkerFinished { pid } = event {
                        actions.push(Action::ForwardToBooting { pid });
                    }
                }
            }
        }
        actions
    }

    /// Apply a pending [`Action::PromoteBooting`]: swap booting into
    /// current, returning the old current's pid (if any) so the caller can
    /// signal it to quit.
    pub fn promote_booting(&mut self) -> Option<Pid> {
        let booting = self.booting.take()?;
        let old_pid = self.current.replace(booting).map(|p| p.pid());
        self.phase = Phase::Running;
        old_pid
    }

    /// A HUP arrived: begin (or restart) a handoff. If a handoff was
    /// already in flight, the still-booting generation is abandoned (the
    /// caller should kill it) and a fresh one is forked using the
    /// still-current generation's worker snapshot, not the abandoned one's.
    pub fn begin_reload(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.phase == Phase::ShuttingDown {
            return actions;
        }
        if let Some(stale) = self.booting.take() {
            actions.push(Action::SignalPid { pid: stale.pid(), sig: SupervisorSignal::Quit });
        }
        let old_workers = self.current.as_ref().map(|c| c.old_workers()).unwrap_or_default();
        let listener_id = self.next_listener_id;
        self.next_listener_id += 1;
        actions.push(Action::ForkListener { listener_id, old_workers });
        self.phase = Phase::HandingOff;
        actions
    }

    /// Forward a pause/resume signal to every live listener generation.
    pub fn forward_to_listeners(&self, sig: SupervisorSignal) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some(c) = &self.current {
            actions.push(Action::SignalPid { pid: c.pid(), sig });
        }
        if let Some(b) = &self.booting {
            actions.push(Action::SignalPid { pid: b.pid(), sig });
        }
        actions
    }

    /// A shutdown signal (INT/TERM/QUIT) arrived: forward it to every live
    /// listener and stop accepting reload/start requests.
    pub fn begin_shutdown(&mut self, sig: SupervisorSignal) -> Vec<Action> {
        self.phase = Phase::ShuttingDown;
        self.shutdown_signal = Some(sig);
        self.forward_to_listeners(sig)
    }

    /// A listener process was reaped. Returns `true` if every listener this
    /// master cares about has now exited and shutdown may complete.
    pub fn on_listener_exited(&mut self, pid: Pid, success: bool) -> Vec<Action> {
        let mut actions = Vec::new();
        let was_current = self.current.as_ref().is_some_and(|c| c.pid() == pid);
        let was_booting = self.booting.as_ref().is_some_and(|b| b.pid() == pid);

        if was_current {
            self.current = None;
        }
        if was_booting {
            self.booting = None;
        }

        if self.phase == Phase::ShuttingDown {
            if self.current.is_none() && self.booting.is_none() {
                actions.push(Action::Exit);
            }
            return actions;
        }

        if was_booting {
            // Exited mid-handoff, whether crashed or merely gone before
            // promoting: current generation (if any) keeps serving while we
            // retry, subject to the listener-level backoff.
            if !success {
                self.listener_backoff.died();
            }
            self.phase = if self.current.is_some() { Phase::Running } else { Phase::Starting };
        } else if was_current && self.booting.is_none() {
            // Current died with no handoff in flight: restart from scratch.
            if !success {
                self.listener_backoff.died();
            }
            self.phase = Phase::Starting;
        }

        actions
    }

    pub fn retry_delay(&self) -> Option<std::time::Duration> {
        self.listener_backoff.how_long()
    }
}

impl Default for MasterCore {
    fn default() -> Self {
        Self::new()
    }
}
