//! If the master itself is killed while two listener generations are alive,
//! each one notices its reporting socket close and quits on its own rather
//! than lingering as an orphan.

use crate::support::{master, write_config};
use nix::sys::signal::Signal;
use std::time::Duration;

fn listener_pids(lines: &[String], status: &str) -> Vec<i32> {
    lines
        .iter()
        .filter_map(|l| {
            let mut parts = l.splitn(3, ',');
            let kind = parts.next()?;
            let pid = parts.next()?;
            let st = parts.next()?;
            (kind == "listener" && st == status).then(|| pid.parse().ok()).flatten()
        })
        .collect()
}

fn is_alive(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None::<Signal>).is_ok()
}

#[test]
fn orphaned_listeners_self_terminate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path(), "foreman.toml", &[("alpha", 1, &["sleep", "30"])]);
    let m = master(dir.path(), &config).spawn();

    let lines = m.wait_for(Duration::from_secs(5), |lines| !listener_pids(lines, "start").is_empty());
    let old_pid = listener_pids(&lines, "start")[0];

    m.signal(Signal::SIGHUP);
    let lines = m.wait_for(Duration::from_secs(5), |lines| listener_pids(lines, "start").len() >= 2);
    let new_pid = *listener_pids(&lines, "start").iter().find(|&&p| p != old_pid).expect("booting generation");

    // Bypass graceful shutdown entirely.
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(m.pid()), Signal::SIGKILL).expect("kill master");

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while (is_alive(old_pid) || is_alive(new_pid)) && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(!is_alive(old_pid), "old listener {old_pid} should have exited after master death");
    assert!(!is_alive(new_pid), "booting listener {new_pid} should have exited after master death");
}
