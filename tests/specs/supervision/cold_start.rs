//! Starting from nothing: one listener generation forks, then one worker
//! per configured queue.

use crate::support::{master, write_config};
use nix::sys::signal::Signal;
use std::time::Duration;

#[test]
fn forks_listener_then_one_worker_per_queue() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(
        dir.path(),
        "foreman.toml",
        &[("alpha", 1, &["sleep", "30"]), ("beta", 1, &["sleep", "30"])],
    );
    let m = master(dir.path(), &config).spawn();

    let lines = m.wait_for(Duration::from_secs(5), |lines| {
        lines.iter().filter(|l| l.starts_with("worker,") && l.ends_with(",start")).count() >= 2
    });

    assert!(lines.iter().any(|l| l.starts_with("listener,") && l.ends_with(",start")), "no listener start line: {lines:?}");
    assert!(!lines.iter().any(|l| l.contains(",stop")), "nothing should have died yet: {lines:?}");

    m.signal(Signal::SIGQUIT);
    m.kill();
}
