//! Restart governor: exponential backoff with a cap, reset after sustained uptime.

use std::time::{Duration, Instant};

/// Seconds a process must stay up since its last `started()` before a
/// subsequent `died()` is treated as an isolated failure rather than part of
/// a crash loop.
pub const STABILITY_WINDOW: Duration = Duration::from_secs(60);

/// Ceiling on the backoff interval. Not specified by the source; chosen to
/// keep restart latency bounded while still throttling fork storms.
pub const MAX_INTERVAL: Duration = Duration::from_secs(60);

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Exponential backoff with a stability-window reset.
///
/// `died()` always grows the interval — a crash always costs at least
/// [`MIN_INTERVAL`] before the next restart is permitted, never zero.
/// Whether the attempt that just died had survived at least
/// [`STABILITY_WINDOW`] is recorded and only takes effect on the *next*
/// `started()`, which resets the interval to zero for that fresh attempt —
/// a process that ran fine for a while and then crashed once shouldn't
/// leave its successor penalized like a thrasher, but the crash that just
/// happened still has to wait.
#[derive(Debug, Clone)]
pub struct Backoff {
    started_at: Option<Instant>,
    last_fail_at: Option<Instant>,
    interval: Duration,
    reset_on_next_start: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self {
            started_at: None,
            last_fail_at: None,
            interval: Duration::ZERO,
            reset_on_next_start: false,
        }
    }

    /// Record that an attempt began now. If the previous attempt survived
    /// at least [`STABILITY_WINDOW`] before dying, this is where that grace
    /// takes effect: the interval drops back to zero for this attempt.
    pub fn started(&mut self) {
        if self.reset_on_next_start {
            self.interval = Duration::ZERO;
            self.reset_on_next_start = false;
        }
        self.started_at = Some(Instant::now());
    }

    /// Record that the attempt just ended in failure. Growth is
    /// unconditional; the stability-window grace is only queued for the
    /// next `started()`, never applied retroactively to this failure.
    pub fn died(&mut self) {
        let now = Instant::now();
        self.reset_on_next_start =
            self.started_at.is_some_and(|at| now.duration_since(at) >= STABILITY_WINDOW);
        self.interval = (self.interval * 2).max(MIN_INTERVAL).min(MAX_INTERVAL);
        self.last_fail_at = Some(now);
    }

    /// True while a restart is still being throttled.
    pub fn wait(&self) -> bool {
        self.how_long().is_some()
    }

    /// Seconds remaining before a restart is permitted, or `None` if one is
    /// permitted now.
    pub fn how_long(&self) -> Option<Duration> {
        let last_fail_at = self.last_fail_at?;
        let elapsed = Instant::now().duration_since(last_fail_at);
        if elapsed >= self.interval {
            None
        } else {
            Some(self.interval - elapsed)
        }
    }
}
