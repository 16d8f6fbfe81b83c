//! `quit-and-wait`: read a pidfile, send `QUIT`, and poll liveness until the
//! process exits or a grace period elapses.

use clap::Args;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid as NixPid;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const GRACE_MARGIN: Duration = Duration::from_secs(5);

#[derive(Args)]
pub struct QuitAndWaitArgs {
    pidfile: PathBuf,

    /// Total seconds to allow for shutdown. The helper itself only polls
    /// for `grace_period - 5s`, leaving headroom for its own overhead.
    #[arg(long = "grace-period", default_value_t = 10)]
    grace_period: u64,
}

pub fn run(args: QuitAndWaitArgs) -> anyhow::Result<i32> {
    let pid = fm_adapters::read_pid(&args.pidfile)?;
    let nix_pid = NixPid::from_raw(pid);

    kill(nix_pid, Signal::SIGQUIT)?;

    let budget = Duration::from_secs(args.grace_period).saturating_sub(GRACE_MARGIN);
    let deadline = Instant::now() + budget;

    loop {
        if let Err(nix::errno::Errno::ESRCH) = kill(nix_pid, None::<Signal>) {
            return Ok(0);
        }
        if Instant::now() >= deadline {
            return Ok(99);
        }
        sleep(POLL_INTERVAL);
    }
}
