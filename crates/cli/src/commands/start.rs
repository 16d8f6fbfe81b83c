use clap::Args;
use fm_daemon::MasterOpts;
use std::path::PathBuf;

#[derive(Args)]
pub struct StartArgs {
    /// Path to a queue config file. May be given more than once; later
    /// files add queues but may not redefine one an earlier file declared.
    #[arg(long = "config", required = true)]
    config: Vec<PathBuf>,

    /// Where to write this master's pid. Held with an exclusive lock for
    /// as long as the master runs.
    #[arg(long = "pidfile")]
    pidfile: Option<PathBuf>,

    /// On SIGHUP, re-exec the master binary itself before reloading
    /// listeners (currently falls back to an ordinary reload with a
    /// logged warning; see DESIGN.md).
    #[arg(long = "exec-on-hup")]
    exec_on_hup: bool,

    /// On shutdown, exit as soon as the signal has been forwarded instead
    /// of waiting for every listener generation to drain.
    #[arg(long = "fast-exit")]
    fast_exit: bool,

    /// An already-open fd to write machine-readable lifecycle status lines
    /// to (`listener,<pid>,<status>` / `worker,<pid>,<status>`).
    #[arg(long = "status-pipe")]
    status_pipe: Option<i32>,

    /// Write logs to this file instead of stderr.
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,
}

pub fn run(args: StartArgs) -> anyhow::Result<i32> {
    let opts = MasterOpts {
        config_paths: args.config,
        pidfile: args.pidfile,
        exec_on_hup: args.exec_on_hup,
        fast_exit: args.fast_exit,
        status_pipe: args.status_pipe,
        log_file: args.log_file,
    };
    Ok(fm_daemon::run_master(opts)?)
}
