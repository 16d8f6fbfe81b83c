//! Optional `SIGPWR`/`SIGINFO` diagnostic snapshot: reports resident memory
//! usage, or nothing on platforms without a practical way to read it. Gated
//! behind the `info-dump` feature since it's never required for correctness.

use std::sync::atomic::{AtomicU64, Ordering};

static LAST_RSS_KB: AtomicU64 = AtomicU64::new(0);

pub fn log_snapshot() {
    match read_rss_kb() {
        Some(rss) => {
            let previous = LAST_RSS_KB.swap(rss, Ordering::Relaxed);
            let delta = rss as i64 - previous as i64;
            tracing::info!(rss_kb = rss, delta_kb = delta, "memory snapshot");
        }
        None => tracing::info!("memory snapshot unsupported on this platform"),
    }
}

#[cfg(target_os = "linux")]
fn read_rss_kb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status.lines().find_map(|line| {
        line.strip_prefix("VmRSS:").map(str::trim).and_then(|rest| {
            rest.split_whitespace().next().and_then(|n| n.parse().ok())
        })
    })
}

#[cfg(not(target_os = "linux"))]
fn read_rss_kb() -> Option<u64> {
    None
}
