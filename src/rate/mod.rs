//! Rate & Timeout Governor (RTG): throughput cap, control-channel keepalive,
//! and per-file stall detection (§4.5).

use std::time::{Duration, Instant};

/// `limit_transfer_rate(n, bytes_per_sec, clock_ticks)` (§4.5): tracks bytes
/// sent within the current one-second window and reports how long the
/// caller should sleep to keep cumulative throughput at or below the cap.
/// Resets on each transition from idle, i.e. whenever a window with zero
/// bytes elapses before the next call.
pub struct TransferRateLimiter {
    bytes_per_sec: Option<u64>,
    window_start: Instant,
    window_bytes: u64,
}

impl TransferRateLimiter {
    #[must_use]
    pub fn new(bytes_per_sec: Option<u64>) -> Self {
        Self { bytes_per_sec, window_start: Instant::now(), window_bytes: 0 }
    }

    #[must_use]
    pub fn with_clock(bytes_per_sec: Option<u64>, now: Instant) -> Self {
        Self { bytes_per_sec, window_start: now, window_bytes: 0 }
    }

    /// Records `n` more bytes sent at time `now` and returns the duration
    /// the caller should sleep before sending more, if any.
    pub fn throttle(&mut self, n: u64, now: Instant) -> Option<Duration> {
        let Some(cap) = self.bytes_per_sec else { return None };
        if cap == 0 {
            return None;
        }

        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.window_start = now;
            self.window_bytes = 0;
        }

        self.window_bytes += n;
        if self.window_bytes <= cap {
            return None;
        }

        let overshoot = self.window_bytes - cap;
        let sleep_secs = overshoot as f64 / cap as f64;
        Some(Duration::from_secs_f64(sleep_secs))
    }
}

/// STAT keepalive on the control channel (§4.5: "a STAT probe is sent... if
/// no activity for `max(transfer_timeout - 5, MIN_KEEP_ALIVE_INTERVAL)`").
pub struct Keepalive {
    interval: Duration,
    last_activity: Instant,
}

/// Floor below which the keepalive interval never shrinks, regardless of
/// how small `transfer_timeout` is configured.
pub const MIN_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5);

impl Keepalive {
    #[must_use]
    pub fn new(transfer_timeout: Duration, now: Instant) -> Self {
        let interval = transfer_timeout.saturating_sub(Duration::from_secs(5)).max(MIN_KEEP_ALIVE_INTERVAL);
        Self { interval, last_activity: now }
    }

    pub fn mark_activity(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Whether a keepalive probe is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        now.duration_since(self.last_activity) >= self.interval
    }
}

/// Per-file stall detection (§4.5/§4.3.1 step 9: "`TIMEOUT_TRANSFER`... total
/// elapsed since `start_transfer_time_file > transfer_timeout`").
pub struct StallGuard {
    transfer_timeout: Duration,
    started_at: Instant,
}

impl StallGuard {
    #[must_use]
    pub fn start(transfer_timeout: Duration, now: Instant) -> Self {
        Self { transfer_timeout, started_at: now }
    }

    #[must_use]
    pub fn is_stalled(&self, now: Instant) -> bool {
        now.duration_since(self.started_at) > self.transfer_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_rate_never_throttles() {
        let mut limiter = TransferRateLimiter::new(None);
        assert_eq!(limiter.throttle(10_000_000, Instant::now()), None);
    }

    #[test]
    fn exceeding_cap_within_window_yields_sleep() {
        let start = Instant::now();
        let mut limiter = TransferRateLimiter::with_clock(Some(1000), start);
        assert_eq!(limiter.throttle(500, start), None);
        let sleep = limiter.throttle(700, start).expect("should throttle once over cap");
        assert!(sleep > Duration::ZERO);
    }

    #[test]
    fn new_window_resets_accumulated_bytes() {
        let start = Instant::now();
        let mut limiter = TransferRateLimiter::with_clock(Some(1000), start);
        limiter.throttle(1000, start);
        let later = start + Duration::from_secs(2);
        assert_eq!(limiter.throttle(100, later), None);
    }

    #[test]
    fn keepalive_respects_floor_interval() {
        let now = Instant::now();
        let ka = Keepalive::new(Duration::from_secs(6), now);
        assert!(!ka.is_due(now + Duration::from_secs(4)));
        assert!(ka.is_due(now + Duration::from_secs(6)));
    }

    #[test]
    fn keepalive_applies_minimum_floor_for_short_timeouts() {
        let now = Instant::now();
        let ka = Keepalive::new(Duration::from_secs(3), now);
        assert!(!ka.is_due(now + Duration::from_secs(4)));
        assert!(ka.is_due(now + MIN_KEEP_ALIVE_INTERVAL));
    }

    #[test]
    fn stall_guard_detects_exceeded_timeout() {
        let now = Instant::now();
        let guard = StallGuard::start(Duration::from_secs(10), now);
        assert!(!guard.is_stalled(now + Duration::from_secs(5)));
        assert!(guard.is_stalled(now + Duration::from_secs(11)));
    }
}
