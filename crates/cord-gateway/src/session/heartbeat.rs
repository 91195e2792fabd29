//! Heartbeat bookkeeping
//!
//! Tracks whether the last heartbeat was acknowledged so a silent connection
//! can be detected on the next tick.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct Heartbeat {
    interval: Option<Duration>,
    last_sent: Option<Instant>,
    awaiting_ack: bool,
    latency: Option<Duration>,
}

impl Heartbeat {
    pub fn start(&mut self, interval: Duration) {
        self.interval = Some(interval);
        self.last_sent = None;
        self.awaiting_ack = false;
    }

    /// Stop tracking; the last measured latency is kept
    pub fn stop(&mut self) {
        self.interval = None;
        self.last_sent = None;
        self.awaiting_ack = false;
    }

    pub fn sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
        self.awaiting_ack = true;
    }

    /// A beat the server asked for; it never counts toward zombie detection
    pub fn requested(&mut self, now: Instant) {
        if !self.awaiting_ack {
            self.last_sent = Some(now);
        }
    }

    /// Record an ACK, returning the round trip if a beat was outstanding
    pub fn acknowledged(&mut self, now: Instant) -> Option<Duration> {
        self.awaiting_ack = false;
        let latency = now.saturating_duration_since(self.last_sent?);
        self.latency = Some(latency);
        Some(latency)
    }

    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    #[must_use]
    pub fn is_awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }

    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }
}
