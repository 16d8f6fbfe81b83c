pub fn run() -> anyhow::Result<i32> {
    Ok(fm_daemon::run_listener()?)
}
