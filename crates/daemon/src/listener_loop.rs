//! The internal `listener` re-entry point: reconstructs a listener's state
//! from the `RESQUED_*` environment the master set before `exec`, then runs
//! its worker loop until a shutdown signal arrives.

use fm_adapters::{Procline, ProcSelfComm, StatusSink, WorkerStatus};
use fm_config::QueueConfig;
use fm_core::{Pid, SupervisorSignal};
use fm_engine::ListenerWorkers;
use fm_proc::waiter::{SleepyWaiter, WakeReason};
use fm_wire::env as wire_env;
use fm_wire::ListenerMessage;
use std::collections::HashMap;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use crate::error::DaemonError;

const MAX_SLEEP: Duration = Duration::from_secs(60);
/// Cadence between shutdown kill volleys. Spec calls for "≥1 s between
/// volleys"; the overall grace budget is enforced by the master (or the
/// `quit-and-wait` helper), not measured here.
const VOLLEY_INTERVAL: Duration = Duration::from_secs(1);

pub fn run_listener() -> Result<i32, DaemonError> {
    let _logging_guard = crate::logging::init_stderr();
    fm_proc::signals::ignore_sigpipe()?;

    let socket_fd: RawFd = read_env(wire_env::SOCKET_FD)?;
    let config_path_value = std::env::var(wire_env::CONFIG_PATH).unwrap_or_default();
    let state_value = std::env::var(wire_env::STATE).unwrap_or_default();
    let listener_id: u64 = read_env(wire_env::LISTENER_ID)?;
    let master_version: u32 = read_env(wire_env::MASTER_VERSION)?;

    // SAFETY: `socket_fd` was dup2'd onto this exact number by the master's
    // pre_exec closure right before `execvp`; we are its sole owner now.
    let socket = unsafe { OwnedFd::from_raw_fd(socket_fd) };
    fm_proc::socketpair::mark_cloexec(socket.as_raw_fd())?;

    let mut status: Option<StatusSink> = match std::env::var(wire_env::STATUS_FD) {
        Ok(value) => {
            let fd: RawFd = value.parse().map_err(|_| DaemonError::MalformedEnv {
                name: wire_env::STATUS_FD,
                value,
            })?;
            // SAFETY: dup2'd onto this exact number by the master's pre_exec
            // closure, alongside the reporting socket; we are its sole owner.
            Some(unsafe { StatusSink::from_raw_fd(fd) })
        }
        Err(_) => None,
    };

    tracing::info!(listener_id, master_version, pid = std::process::id(), "listener starting");

    let config_paths = wire_env::unpack_config_paths(&config_path_value);
    let old_workers = wire_env::unpack_state_lenient(&state_value);
    let specs = fm_config::TomlQueueConfig::load(&config_paths)?;
    let commands = fm_engine::worker_commands(&specs);
    let mut workers = ListenerWorkers::new(fm_engine::expand_worker_slots(&specs, &old_workers));

    let procline = ProcSelfComm;
    procline.set("foreman: listener (booting)");

    let self_pipe = fm_proc::selfpipe::SelfPipe::new()?;
    // SAFETY: installed once per process, before any workers are forked.
    let controller = unsafe {
        fm_proc::signals::SignalController::install(
            self_pipe.write_fd_raw(),
            &[
                SupervisorSignal::Cont,
                SupervisorSignal::Int,
                SupervisorSignal::Term,
                SupervisorSignal::Quit,
                SupervisorSignal::Chld,
            ],
        )
    }?;
    let waiter = SleepyWaiter::new(&self_pipe);

    write_line(&socket, &ListenerMessage::Running.encode());
    procline.set("foreman: listener");
    tracing::info!(listener_id, "listener running");

    let mut splitter = fm_engine::listener_proxy::LineSplitter::new();

    loop {
        while let Some((pid, success)) = fm_proc::spawn::try_reap_one()? {
            if let Some(msg) = workers.reap(pid, success) {
                tracing::info!(pid, success, "worker finished");
                write_line(&socket, &msg.encode());
                if let Some(s) = status.as_mut() {
                    s.worker(pid, WorkerStatus::Stop);
                }
            }
        }

        if workers.all_disposed() {
            break;
        }

        for result in workers.start_eligible(|queue_key| {
            let argv = commands.get(queue_key).cloned().unwrap_or_default();
            let mut env = HashMap::new();
            env.insert("RESQUED_QUEUE_KEY".to_string(), queue_key.to_string());
            // SAFETY: listener is single-threaded; child only execs.
            unsafe { fm_proc::spawn::fork_exec(&argv, &env, || Ok(())) }
        }) {
            match result {
                Ok(ListenerMessage::WorkerStarted { pid, queue_key }) => {
                    tracing::info!(pid, %queue_key, "worker started");
                    write_line(&socket, &ListenerMessage::WorkerStarted { pid, queue_key }.encode());
                    if let Some(s) = status.as_mut() {
                        s.worker(pid, WorkerStatus::Start);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "failed to start worker"),
            }
        }

        let sleep = workers.sleep_duration().min(MAX_SLEEP);
        match waiter.wait(sleep, &[socket.as_raw_fd()]) {
            WakeReason::Signal => {
                while let Some(sig) = controller.pop() {
                    match sig {
                        SupervisorSignal::Cont => {
                            tracing::info!("forwarding CONT to workers");
                            for pid in workers.running_pids() {
                                fm_proc::spawn::kill_ignoring_esrch(pid, nix::sys::signal::Signal::SIGCONT)?;
                            }
                        }
                        s if s.is_shutdown() => {
                            tracing::info!(?s, "shutting down workers");
                            procline.set("foreman: listener (shutting down)");
                            shutdown(&mut workers, &socket, &mut status, s)?;
                        }
                        SupervisorSignal::Chld => {}
                        _ => {}
                    }
                }
            }
            WakeReason::Readable => {
                let mut buf = [0u8; 4096];
                match nix::unistd::read(socket.as_raw_fd(), &mut buf) {
                    Ok(0) => {
                        // The master is gone: its end of the reporting
                        // socket closed. Nothing left to report to, so shut
                        // down the same way a QUIT would.
                        tracing::info!(listener_id, "reporting socket closed, master gone; shutting down");
                        procline.set("foreman: listener (shutting down)");
                        shutdown(&mut workers, &socket, &mut status, SupervisorSignal::Quit)?;
                    }
                    Err(_) => {}
                    Ok(n) => {
                        for line in splitter.feed(&buf[..n]) {
                            if let Ok(ListenerMessage::WorkerFinished { pid }) = ListenerMessage::decode(&line) {
                                workers.unblock(pid);
                            }
                        }
                    }
                }
            }
            WakeReason::Timeout => {}
        }
    }

    tracing::info!(listener_id, "listener exiting");
    Ok(0)
}

/// `burn_down_workers`: reap whatever has already exited, and if anyone's
/// still running, re-send the signal and sleep before checking again —
/// a worker that missed the first volley (e.g. a race with its own signal
/// handler installation right after fork) gets hit again rather than
/// leaving the listener blocked forever in one final `waitpid`.
fn shutdown(
    workers: &mut ListenerWorkers,
    socket: &OwnedFd,
    status: &mut Option<StatusSink>,
    sig: SupervisorSignal,
) -> Result<(), DaemonError> {
    let nix_sig = fm_proc::signal_to_nix(sig);
    loop {
        while let Some((pid, success)) = fm_proc::spawn::try_reap_one()? {
            reap_worker(workers, socket, status, pid, success);
        }
        if workers.running_pids().is_empty() {
            break;
        }
        for pid in workers.running_pids() {
            fm_proc::spawn::kill_ignoring_esrch(pid, nix_sig)?;
        }
        std::thread::sleep(VOLLEY_INTERVAL);
    }
    // One final blocking wait in case a child exited between the loop's
    // last WNOHANG reap and its now-empty check.
    if let Some((pid, success)) = fm_proc::spawn::wait_blocking_any()? {
        reap_worker(workers, socket, status, pid, success);
    }
    workers.dispose_all();
    Ok(())
}

fn reap_worker(
    workers: &mut ListenerWorkers,
    socket: &OwnedFd,
    status: &mut Option<StatusSink>,
    pid: Pid,
    success: bool,
) {
    if let Some(msg) = workers.reap(pid, success) {
        write_line(socket, &msg.encode());
        if let Some(s) = status.as_mut() {
            s.worker(pid, WorkerStatus::Stop);
        }
    }
}

fn write_line(fd: &OwnedFd, line: &str) {
    // SAFETY: `fd` is the listener's reporting socket, owned for the
    // process's lifetime; this borrow does not outlive the call.
    let borrowed: BorrowedFd = unsafe { BorrowedFd::borrow_raw(fd.as_raw_fd()) };
    let _ = nix::unistd::write(borrowed, line.as_bytes());
}

fn read_env<T: std::str::FromStr>(key: &'static str) -> Result<T, DaemonError> {
    let value = std::env::var(key).map_err(|_| DaemonError::MissingEnv(key))?;
    value.parse().map_err(|_| DaemonError::MalformedEnv { name: key, value })
}
