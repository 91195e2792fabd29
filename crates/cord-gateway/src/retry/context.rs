//! Reconnect bookkeeping for one shard
//!
//! Owned by the session state machine; never shared between shards.

use std::time::Duration;

/// Attempt counter and connection status across a reconnect cycle
#[derive(Debug, Clone)]
pub struct RetryContext {
    first_backoff: Duration,
    max_backoff_interval: Duration,
    attempts: u32,
    connected: bool,
    reset_count: u32,
}

impl RetryContext {
    #[must_use]
    pub fn new(first_backoff: Duration, max_backoff_interval: Duration) -> Self {
        Self {
            first_backoff,
            max_backoff_interval,
            attempts: 1,
            connected: false,
            reset_count: 0,
        }
    }

    /// Record a failed attempt
    pub fn next(&mut self) {
        self.connected = false;
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Record a completed handshake
    pub fn reset(&mut self) {
        self.connected = true;
        self.attempts = 1;
        self.reset_count = self.reset_count.saturating_add(1);
    }

    /// Forget the current cycle without counting a failure
    pub fn clear(&mut self) {
        self.connected = false;
        self.attempts = 1;
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Number of handshakes completed so far
    #[must_use]
    pub fn reset_count(&self) -> u32 {
        self.reset_count
    }

    #[must_use]
    pub fn first_backoff(&self) -> Duration {
        self.first_backoff
    }

    #[must_use]
    pub fn max_backoff_interval(&self) -> Duration {
        self.max_backoff_interval
    }
}
