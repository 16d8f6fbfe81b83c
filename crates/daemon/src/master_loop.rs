//! The master process's main loop: fork listeners, relay their reporting
//! sockets, forward signals, and drive reload/shutdown handoffs.

use fm_adapters::{ListenerStatus, StatusSink};
use fm_core::{Pid, SupervisorSignal};
use fm_engine::{Action, MasterCore};
use fm_proc::waiter::{SleepyWaiter, WakeReason};
use std::collections::HashMap;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::DaemonError;
use crate::handoff::spawn_listener;

pub struct MasterOpts {
    pub config_paths: Vec<PathBuf>,
    pub pidfile: Option<PathBuf>,
    pub exec_on_hup: bool,
    pub fast_exit: bool,
    pub status_pipe: Option<RawFd>,
    pub log_file: Option<PathBuf>,
}

const IDLE_SLEEP: Duration = Duration::from_secs(5);

pub fn run_master(opts: MasterOpts) -> Result<i32, DaemonError> {
    let _logging_guard = match &opts.log_file {
        Some(path) => crate::logging::init_file(path)?,
        None => crate::logging::init_stderr(),
    };

    let _pidfile_guard = opts
        .pidfile
        .as_ref()
        .map(fm_adapters::PidFile::acquire)
        .transpose()?;

    let mut status = opts.status_pipe.map(|fd| {
        // SAFETY: the status pipe fd, if given, was opened by whatever
        // spawned us and handed down for our exclusive use as a write end.
        unsafe { StatusSink::from_raw_fd(fd) }
    });

    fm_proc::signals::ignore_sigpipe()?;

    let self_pipe = fm_proc::selfpipe::SelfPipe::new()?;
    let mut signals = vec![
        SupervisorSignal::Hup,
        SupervisorSignal::Usr2,
        SupervisorSignal::Cont,
        SupervisorSignal::Int,
        SupervisorSignal::Term,
        SupervisorSignal::Quit,
        SupervisorSignal::Chld,
    ];
    #[cfg(feature = "info-dump")]
    signals.push(SupervisorSignal::Info);

    // SAFETY: installed once, before any other threads exist in this process.
    let controller = unsafe { fm_proc::signals::SignalController::install(self_pipe.write_fd_raw(), &signals) }?;
    let waiter = SleepyWaiter::new(&self_pipe);

    let exe = std::env::current_exe()?;
    let master_version = std::process::id();
    let mut core = MasterCore::new();
    let mut sockets: HashMap<Pid, OwnedFd> = HashMap::new();

    tracing::info!(pid = std::process::id(), "master starting");

    if let Some(action) = core.start_initial_listener() {
        apply(&mut core, &exe, &opts, master_version, &mut sockets, &mut status, vec![action])?;
    }

    loop {
        while let Some((pid, success)) = fm_proc::spawn::try_reap_one()? {
            sockets.remove(&pid);
            if let Some(s) = status.as_mut() {
                s.listener(pid, ListenerStatus::Stop);
            }
            tracing::info!(pid, success, "listener exited");
            let actions = core.on_listener_exited(pid, success);
            apply(&mut core, &exe, &opts, master_version, &mut sockets, &mut status, actions)?;
        }

        if let Some(action) = core.start_initial_listener() {
            apply(&mut core, &exe, &opts, master_version, &mut sockets, &mut status, vec![action])?;
        }

        if core.is_shutting_down() && (sockets.is_empty() || opts.fast_exit) {
            tracing::info!(fast_exit = opts.fast_exit, "master exiting");
            break;
        }

        let fds: Vec<RawFd> = sockets.values().map(|f| f.as_raw_fd()).collect();
        let sleep = core.retry_delay().unwrap_or(IDLE_SLEEP);

        match waiter.wait(sleep, &fds) {
            WakeReason::Signal => {
                while let Some(sig) = controller.pop() {
                    let actions = handle_signal(&mut core, sig, opts.exec_on_hup);
                    apply(&mut core, &exe, &opts, master_version, &mut sockets, &mut status, actions)?;
                }
            }
            WakeReason::Readable => {
                let pids: Vec<Pid> = sockets.keys().copied().collect();
                for pid in pids {
                    let Some(fd) = sockets.get(&pid).map(|f| f.as_raw_fd()) else { continue };
                    let mut buf = [0u8; 4096];
                    match nix::unistd::read(fd, &mut buf) {
                        Ok(0) | Err(_) => {}
                        Ok(n) => {
                            let actions = core.ingest_from(pid, &buf[..n]);
                            apply(&mut core, &exe, &opts, master_version, &mut sockets, &mut status, actions)?;
                        }
                    }
                }
            }
            WakeReason::Timeout => {}
        }
    }

    Ok(0)
}

fn handle_signal(core: &mut MasterCore, sig: SupervisorSignal, exec_on_hup: bool) -> Vec<Action> {
    match sig {
        SupervisorSignal::Hup => {
            if exec_on_hup {
                tracing::warn!("exec_on_hup requested but not implemented; falling back to ordinary reload");
            }
            tracing::info!("reloading configuration");
            core.begin_reload()
        }
        SupervisorSignal::Usr2 => {
            tracing::info!("pausing job processing");
            core.pause()
        }
        SupervisorSignal::Cont => {
            tracing::info!("resuming job processing");
            core.resume()
        }
        SupervisorSignal::Int | SupervisorSignal::Term | SupervisorSignal::Quit => {
            tracing::info!(?sig, "shutting down");
            core.begin_shutdown(sig)
        }
        SupervisorSignal::Chld => Vec::new(),
        SupervisorSignal::Info => {
            #[cfg(feature = "info-dump")]
            crate::info_dump::log_snapshot();
            Vec::new()
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn apply(
    core: &mut MasterCore,
    exe: &std::path::Path,
    opts: &MasterOpts,
    master_version: u32,
    sockets: &mut HashMap<Pid, OwnedFd>,
    status: &mut Option<StatusSink>,
    actions: Vec<Action>,
) -> Result<(), DaemonError> {
    for action in actions {
        match action {
            Action::ForkListener { listener_id, old_workers } => {
                let spawned = spawn_listener(
                    exe,
                    &opts.config_paths,
                    listener_id,
                    master_version,
                    &old_workers,
                    opts.status_pipe,
                )?;
                tracing::info!(pid = spawned.pid, listener_id, "forked listener");
                core.note_forked(spawned.pid, listener_id);
                sockets.insert(spawned.pid, spawned.master_end);
                if let Some(s) = status.as_mut() {
                    s.listener(spawned.pid, ListenerStatus::Start);
                }
            }
            Action::SignalPid { pid, sig } => {
                fm_proc::spawn::kill_ignoring_esrch(pid, fm_proc::signal_to_nix(sig))?;
            }
            Action::PromoteBooting => {
                if let Some(old_pid) = core.promote_booting() {
                    tracing::info!(new_pid = ?core.current().map(|c| c.pid()), old_pid, "promoted new listener");
                    fm_proc::spawn::kill_ignoring_esrch(old_pid, nix::sys::signal::Signal::SIGQUIT)?;
                    if let Some(s) = status.as_mut() {
                        if let Some(c) = core.current() {
                            s.listener(c.pid(), ListenerStatus::Ready);
                        }
                    }
                }
            }
            Action::ForwardToBooting { pid } => {
                if let Some(booting_pid) = core.booting().map(|b| b.pid()) {
                    if let Some(fd) = sockets.get(&booting_pid).map(|f| f.as_raw_fd()) {
                        let line = fm_wire::ListenerMessage::WorkerFinished { pid }.encode();
                        // SAFETY: `fd` borrows a socket still owned by `sockets`,
                        // alive for the duration of this call.
                        let borrowed = unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) };
                        let _ = nix::unistd::write(borrowed, line.as_bytes());
                    }
                }
            }
            Action::Exit => {}
        }
    }
    Ok(())
}
