//! The `quit-and-wait` helper sends QUIT and polls the pidfile's liveness,
//! succeeding once the master is gone and timing out with a distinct code
//! if it isn't.

use crate::support::{cli, master, write_config};
use std::time::Duration;

#[test]
fn exits_zero_once_master_is_gone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path(), "foreman.toml", &[("alpha", 1, &["sleep", "30"])]);
    let m = master(dir.path(), &config).spawn();
    m.wait_for(Duration::from_secs(5), |lines| lines.iter().any(|l| l.contains(",start")));

    let pidfile = m.pidfile_path();
    cli().args(&["quit-and-wait", pidfile.to_str().expect("utf8 path")]).code(0);
}

#[test]
fn times_out_when_the_master_ignores_quit() {
    let dir = tempfile::tempdir().expect("tempdir");
    // SIGQUIT is ignored, so the worker (and the listener waiting on it)
    // never exits within the grace period.
    let config = write_config(dir.path(), "foreman.toml", &[("alpha", 1, &["sh", "-c", "trap '' QUIT; sleep 30"])]);
    let m = master(dir.path(), &config).spawn();
    m.wait_for(Duration::from_secs(5), |lines| lines.iter().any(|l| l.contains(",start")));

    let pidfile = m.pidfile_path();
    cli()
        .args(&["quit-and-wait", pidfile.to_str().expect("utf8 path"), "--grace-period", "6"])
        .code(99);

    m.kill();
}
