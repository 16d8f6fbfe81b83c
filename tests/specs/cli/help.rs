//! CLI surface: help, version, and subcommand visibility.

use crate::support::cli;

#[test]
fn no_args_exits_nonzero() {
    cli().fails();
}

#[test]
fn help_shows_usage_and_subcommands() {
    cli()
        .args(&["--help"])
        .passes()
        .stdout_has("Usage:")
        .stdout_has("start")
        .stdout_has("quit-and-wait");
}

#[test]
fn lowercase_v_prints_version() {
    cli().args(&["-v"]).passes().stdout_has(env!("CARGO_PKG_VERSION"));
}
