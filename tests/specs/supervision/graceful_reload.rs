//! SIGHUP starts a second listener generation alongside the current one;
//! once it reports ready the old generation is asked to quit.

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

#[test]
fn reload_promotes_new_generation_and_retires_old() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path(), "foreman.toml", &[("alpha", 1, &["sleep", "30"])]);
    let m = master(dir.path(), &config).spawn();

    let lines = m.wait_for(Duration::from_secs(5), |lines| !listener_pids(lines, "start").is_empty());
    let old_pid = listener_pids(&lines, "start")[0];

    m.signal(Signal::SIGHUP);

    let lines = m.wait_for(Duration::from_secs(5), |lines| listener_pids(lines, "start").len() >= 2);
    let starts = listener_pids(&lines, "start");
    assert!(starts.contains(&old_pid), "old listener should still be in the log: {lines:?}");
    let new_pid = *starts.iter().find(|&&p| p != old_pid).expect("a second listener pid");

    let lines = m.wait_for(Duration::from_secs(5), |lines| listener_pids(lines, "ready").contains(&new_pid));
    assert!(!listener_pids(&lines, "ready").contains(&old_pid), "only the new generation reports ready");

    m.wait_for(Duration::from_secs(5), |lines| listener_pids(lines, "stop").contains(&old_pid));

    m.signal(Signal::SIGQUIT);
    m.kill();
}
