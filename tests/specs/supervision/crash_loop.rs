//! A listener that can never successfully boot (unparseable config) gets
//! refork attempts that back off rather than spin tightly.

use crate::support::{master, write_broken_config};
use nix::sys::signal::Signal;
use std::time::{Duration, Instant};

fn distinct_listener_starts(lines: &[String]) -> usize {
    use std::collections::HashSet;
    lines
        .iter()
        .filter(|l| l.starts_with("listener,") && l.ends_with(",start"))
        .collect::<HashSet<_>>()
        .len()
}

#[test]
fn backs_off_between_restart_attempts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_broken_config(dir.path(), "foreman.toml");
    let m = master(dir.path(), &config).spawn();

    let start = Instant::now();
    m.wait_for(Duration::from_secs(30), |lines| distinct_listener_starts(lines) >= 3);
    let elapsed = start.elapsed();

    // Three generations means at least two backoff waits (1s, then 2s):
    // a tight respawn loop would clear this in well under a second.
    assert!(elapsed >= Duration::from_secs(2), "restarts happened too fast to be backed off: {elapsed:?}");

    m.signal(Signal::SIGQUIT);
    m.kill();
}
