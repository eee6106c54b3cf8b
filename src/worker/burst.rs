//! Burst loop (§4.3.2): accepting another batch on the same control
//! connection without a full reconnect.

use std::time::{Duration, Instant};

use bitflags::bitflags;

bitflags! {
    /// What changed in the handed-off batch relative to the previous one,
    /// dictating which INIT/TUNE/CD steps must re-run (§4.3.2).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ValuesChanged: u8 {
        const USER_CHANGED       = 0x01;
        const TYPE_CHANGED       = 0x02;
        const AUTH_CHANGED       = 0x04;
        const TARGET_DIR_CHANGED = 0x08;
    }
}

/// Disconnect policy governing whether another burst iteration is allowed.
#[derive(Debug, Clone, Copy)]
pub struct BurstPolicy {
    pub keep_connected_disconnect: bool,
    pub keep_connected: Duration,
    pub disconnect_after: Option<Duration>,
}

impl BurstPolicy {
    /// Whether a new burst iteration may start given `elapsed` since
    /// connect (§4.3.2: "Burst is suppressed when either
    /// `KEEP_CONNECTED_DISCONNECT` and elapsed since connect >
    /// `keep_connected`, or `disconnect > 0` and elapsed > `disconnect`").
    #[must_use]
    pub fn allows_burst(&self, elapsed_since_connect: Duration) -> bool {
        if self.keep_connected_disconnect && elapsed_since_connect > self.keep_connected {
            return false;
        }
        if let Some(disconnect) = self.disconnect_after {
            if elapsed_since_connect > disconnect {
                return false;
            }
        }
        true
    }
}

/// Tracks burst-loop state across iterations on one connection.
pub struct BurstState {
    pub connected_at: Instant,
    pub iterations: u32,
}

impl BurstState {
    #[must_use]
    pub fn new(connected_at: Instant) -> Self {
        Self { connected_at, iterations: 0 }
    }

    pub fn record_iteration(&mut self) {
        self.iterations += 1;
    }

    #[must_use]
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.duration_since(self.connected_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_suppressed_past_keep_connected_window() {
        let policy =
            BurstPolicy { keep_connected_disconnect: true, keep_connected: Duration::from_secs(60), disconnect_after: None };
        assert!(policy.allows_burst(Duration::from_secs(30)));
        assert!(!policy.allows_burst(Duration::from_secs(90)));
    }

    #[test]
    fn burst_suppressed_past_disconnect_timer() {
        let policy = BurstPolicy {
            keep_connected_disconnect: false,
            keep_connected: Duration::ZERO,
            disconnect_after: Some(Duration::from_secs(120)),
        };
        assert!(policy.allows_burst(Duration::from_secs(100)));
        assert!(!policy.allows_burst(Duration::from_secs(130)));
    }

    #[test]
    fn values_changed_tracks_independent_flags() {
        let changed = ValuesChanged::TYPE_CHANGED | ValuesChanged::TARGET_DIR_CHANGED;
        assert!(changed.contains(ValuesChanged::TYPE_CHANGED));
        assert!(!changed.contains(ValuesChanged::USER_CHANGED));
    }
}
