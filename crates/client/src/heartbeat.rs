//! Liveness monitor counters.
//!
//! The play transport does not always notice silent connection death, so the
//! session pings on a fixed interval and counts unanswered pings. The
//! counters live here; the serve loop drives the interval and the router
//! feeds pongs back in.

use std::sync::atomic::{AtomicU32, Ordering};

/// Outcome of one heartbeat interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeartbeatTick {
    /// Emit a ping and keep counting.
    SendPing,
    /// The threshold of unanswered pings was reached; the connection is
    /// presumed dead.
    Failed,
}

#[derive(Debug)]
pub(crate) struct Heartbeat {
    outstanding: AtomicU32,
    threshold: u32,
}

impl Heartbeat {
    pub fn new(threshold: u32) -> Self {
        Self {
            outstanding: AtomicU32::new(0),
            threshold,
        }
    }

    /// Called once per ping interval while connected.
    pub fn on_interval(&self) -> HeartbeatTick {
        if self.outstanding.load(Ordering::SeqCst) >= self.threshold {
            HeartbeatTick::Failed
        } else {
            self.outstanding.fetch_add(1, Ordering::SeqCst);
            HeartbeatTick::SendPing
        }
    }

    /// Every pong clears the backlog.
    pub fn on_pong(&self) {
        self.outstanding.store(0, Ordering::SeqCst);
    }

    /// Re-armed on every transition into Connected.
    pub fn reset(&self) {
        self.outstanding.store(0, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn outstanding(&self) -> u32 {
        self.outstanding.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fails_after_threshold_unanswered_intervals() {
        let heartbeat = Heartbeat::new(3);
        assert_eq!(heartbeat.on_interval(), HeartbeatTick::SendPing);
        assert_eq!(heartbeat.on_interval(), HeartbeatTick::SendPing);
        assert_eq!(heartbeat.on_interval(), HeartbeatTick::SendPing);
        assert_eq!(heartbeat.on_interval(), HeartbeatTick::Failed);
        // Stays failed until reset.
        assert_eq!(heartbeat.on_interval(), HeartbeatTick::Failed);
    }

    #[test]
    fn pong_resets_the_backlog() {
        let heartbeat = Heartbeat::new(2);
        assert_eq!(heartbeat.on_interval(), HeartbeatTick::SendPing);
        assert_eq!(heartbeat.on_interval(), HeartbeatTick::SendPing);
        assert_eq!(heartbeat.outstanding(), 2);

        heartbeat.on_pong();
        assert_eq!(heartbeat.outstanding(), 0);
        assert_eq!(heartbeat.on_interval(), HeartbeatTick::SendPing);
    }

    #[test]
    fn reset_re_arms_after_failure() {
        let heartbeat = Heartbeat::new(1);
        assert_eq!(heartbeat.on_interval(), HeartbeatTick::SendPing);
        assert_eq!(heartbeat.on_interval(), HeartbeatTick::Failed);

        heartbeat.reset();
        assert_eq!(heartbeat.on_interval(), HeartbeatTick::SendPing);
    }
}
