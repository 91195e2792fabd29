//! Global rate limiter
//!
//! Three gates in front of every exchange:
//! - A shared `limited_until` instant set after a global 429. Waiters sleep
//!   until that one instant, so they all resume together.
//! - A permit quota (GCRA via governor).
//! - A semaphore bounding requests in flight.

use crate::bucket::deadline_after;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parking_lot::Mutex;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep_until, Instant};

pub struct GlobalRateLimiter {
    limited_until: Mutex<Option<Instant>>,
    quota: DefaultDirectRateLimiter,
    in_flight: Arc<Semaphore>,
}

impl GlobalRateLimiter {
    /// `permits` requests per `refill`, at most `parallelism` in flight
    #[must_use]
    pub fn new(permits: NonZeroU32, refill: Duration, parallelism: usize) -> Self {
        let period = refill
            .checked_div(permits.get())
            .filter(|p| !p.is_zero())
            .unwrap_or(Duration::from_nanos(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(permits))
            .allow_burst(permits);
        Self {
            limited_until: Mutex::new(None),
            quota: RateLimiter::direct(quota),
            in_flight: Arc::new(Semaphore::new(parallelism.max(1))),
        }
    }

    /// Block every caller for `duration` from now
    pub fn rate_limit_for(&self, duration: Duration) {
        let until = deadline_after(Instant::now(), duration);
        *self.limited_until.lock() = Some(until);
        tracing::warn!(
            retry_after_ms = duration.as_millis() as u64,
            "Global rate limit hit"
        );
    }

    /// Time left in the current global limit window
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.limited_until
            .lock()
            .map_or(Duration::ZERO, |until| {
                until.saturating_duration_since(Instant::now())
            })
    }

    /// Wait out the global limit window, if one is active
    pub async fn wait(&self) {
        loop {
            let until = *self.limited_until.lock();
            match until {
                // The window may be extended while sleeping
                Some(until) if until > Instant::now() => sleep_until(until).await,
                _ => return,
            }
        }
    }

    /// Run `operation` once all global gates allow it
    pub async fn with_limiter<F, T>(&self, operation: F) -> T
    where
        F: Future<Output = T>,
    {
        self.wait().await;
        self.quota.until_ready().await;
        // Never closed, the semaphore lives as long as the limiter
        let _permit = self.in_flight.acquire().await.ok();
        operation.await
    }

    /// Requests currently allowed to start immediately
    #[must_use]
    pub fn available_parallelism(&self) -> usize {
        self.in_flight.available_permits()
    }
}

impl std::fmt::Debug for GlobalRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalRateLimiter")
            .field("remaining", &self.remaining())
            .field("available_parallelism", &self.available_parallelism())
            .finish()
    }
}
