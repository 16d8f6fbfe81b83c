//! `foreman`: the CLI entry point. Parses arguments and dispatches into
//! `fm-daemon`'s master/listener loops, or handles `quit-and-wait` directly.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "foreman",
    about = "Supervises background job worker processes",
    version,
    disable_version_flag = true
)]
struct Cli {
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: (),

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the master process.
    Start(commands::start::StartArgs),
    /// Internal: re-entry point exec'd by the master for each listener
    /// generation. Never invoked directly.
    #[command(hide = true)]
    Listener,
    /// Send a graceful-shutdown signal to a running master and wait for it
    /// to exit.
    QuitAndWait(commands::quit_and_wait::QuitAndWaitArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let exit_code = match cli.command {
        Command::Start(args) => commands::start::run(args)?,
        Command::Listener => commands::listener::run()?,
        Command::QuitAndWait(args) => commands::quit_and_wait::run(args)?,
    };
    std::process::exit(exit_code);
}
