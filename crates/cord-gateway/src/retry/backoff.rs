//! Exponential backoff with jitter

use cord_common::JitterMode;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Duration;

/// Unjittered delay for an attempt: `first * 2^(attempt - 1)` within `[first, max]`
///
/// Attempt 0 is treated like attempt 1. Overflow yields `max`.
#[must_use]
pub fn base_delay(attempt: u32, first: Duration, max: Duration) -> Duration {
    let raw = 2u32
        .checked_pow(attempt.saturating_sub(1))
        .and_then(|factor| first.checked_mul(factor))
        .unwrap_or(max);
    raw.max(first).min(max)
}

/// Backoff generator owning its random source
#[derive(Debug, Clone)]
pub struct Backoff {
    first: Duration,
    max: Duration,
    jitter: JitterMode,
    rng: StdRng,
}

impl Backoff {
    #[must_use]
    pub fn new(first: Duration, max: Duration, jitter: JitterMode) -> Self {
        Self {
            first,
            max,
            jitter,
            rng: StdRng::from_entropy(),
        }
    }

    /// Same as [`Backoff::new`] with a reproducible random source
    #[must_use]
    pub fn with_seed(first: Duration, max: Duration, jitter: JitterMode, seed: u64) -> Self {
        Self {
            first,
            max,
            jitter,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Jittered delay for `attempt`, never above `max`
    ///
    /// `Random` stays within `[first, max]`. `Full` may go down to zero.
    pub fn delay(&mut self, attempt: u32) -> Duration {
        let base = base_delay(attempt, self.first, self.max);
        let nanos = u64::try_from(base.as_nanos()).unwrap_or(u64::MAX);

        match self.jitter {
            JitterMode::None => base,
            JitterMode::Full => Duration::from_nanos(self.rng.gen_range(0..=nanos)).min(self.max),
            JitterMode::Random => Duration::from_nanos(self.rng.gen_range(nanos / 2..=nanos))
                .max(self.first)
                .min(self.max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST: Duration = Duration::from_secs(2);
    const MAX: Duration = Duration::from_secs(120);

    #[test]
    fn test_base_delay_doubles() {
        assert_eq!(base_delay(1, FIRST, MAX), Duration::from_secs(2));
        assert_eq!(base_delay(2, FIRST, MAX), Duration::from_secs(4));
        assert_eq!(base_delay(3, FIRST, MAX), Duration::from_secs(8));
        assert_eq!(base_delay(6, FIRST, MAX), Duration::from_secs(64));
        assert_eq!(base_delay(7, FIRST, MAX), MAX);
    }

    #[test]
    fn test_base_delay_attempt_zero() {
        assert_eq!(base_delay(0, FIRST, MAX), FIRST);
    }

    #[test]
    fn test_base_delay_overflow_clamps_to_max() {
        assert_eq!(base_delay(40, FIRST, MAX), MAX);
        assert_eq!(base_delay(u32::MAX, FIRST, MAX), MAX);
    }

    #[test]
    fn test_base_delay_monotonic_and_bounded() {
        let mut previous = Duration::ZERO;
        for attempt in 1..=64 {
            let delay = base_delay(attempt, FIRST, MAX);
            assert!(delay >= previous, "attempt {attempt} decreased");
            assert!(delay >= FIRST && delay <= MAX);
            previous = delay;
        }
    }

    #[test]
    fn test_no_jitter_matches_base() {
        let mut backoff = Backoff::new(FIRST, MAX, JitterMode::None);
        for attempt in 1..=10 {
            assert_eq!(backoff.delay(attempt), base_delay(attempt, FIRST, MAX));
        }
    }

    #[test]
    fn test_jitter_windows() {
        let mut full = Backoff::with_seed(FIRST, MAX, JitterMode::Full, 7);
        let mut random = Backoff::with_seed(FIRST, MAX, JitterMode::Random, 7);
        for attempt in 1..=20 {
            let base = base_delay(attempt, FIRST, MAX);

            let delay = full.delay(attempt);
            assert!(delay <= base);

            let delay = random.delay(attempt);
            assert!(delay >= base / 2 && delay <= base);
            assert!(delay >= FIRST);
        }
    }

    #[test]
    fn test_random_jitter_never_below_first() {
        let mut backoff = Backoff::with_seed(FIRST, MAX, JitterMode::Random, 1);
        for _ in 0..100 {
            assert_eq!(backoff.delay(1), FIRST);
        }
    }

    #[test]
    fn test_seeded_backoff_is_reproducible() {
        let mut a = Backoff::with_seed(FIRST, MAX, JitterMode::Full, 42);
        let mut b = Backoff::with_seed(FIRST, MAX, JitterMode::Full, 42);
        for attempt in 1..=10 {
            assert_eq!(a.delay(attempt), b.delay(attempt));
        }
    }
}
