//! USR2 stops the current listener from starting new workers; CONT lets it
//! resume.

use crate::support::{master, write_config};
use nix::sys::signal::Signal;
use std::time::Duration;

fn worker_starts(lines: &[String]) -> usize {
    lines.iter().filter(|l| l.starts_with("worker,") && l.ends_with(",start")).count()
}

#[test]
fn pause_blocks_restarts_until_resumed() {
    let dir = tempfile::tempdir().expect("tempdir");
    // A worker that exits immediately, so the listener keeps trying to
    // restart it once (subject to backoff) unless paused.
    let config = write_config(dir.path(), "foreman.toml", &[("alpha", 1, &["true"])]);
    let m = master(dir.path(), &config).spawn();

    m.wait_for(Duration::from_secs(5), |lines| worker_starts(lines) >= 1);

    m.signal(Signal::SIGUSR2);
    std::thread::sleep(Duration::from_millis(300));
    let count_at_pause = worker_starts(&m.status_lines());
    std::thread::sleep(Duration::from_secs(2));
    assert_eq!(
        worker_starts(&m.status_lines()),
        count_at_pause,
        "no new worker should start while paused"
    );

    m.signal(Signal::SIGCONT);
    m.wait_for(Duration::from_secs(10), |lines| worker_starts(lines) > count_at_pause);

    m.signal(Signal::SIGQUIT);
    m.kill();
}
