//! Reconnect options
//!
//! One struct covers both the backoff bounds and the retry budget.

use super::Backoff;
use crate::error::{GatewayError, GatewayResult};
use cord_common::{JitterMode, ReconnectConfig, MIN_FIRST_BACKOFF_MS};
use std::time::Duration;

/// Smallest accepted first backoff
pub const MIN_FIRST_BACKOFF: Duration = Duration::from_millis(MIN_FIRST_BACKOFF_MS);

/// Validated reconnect options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOptions {
    first_backoff: Duration,
    max_backoff_interval: Duration,
    max_retries: Option<u32>,
    jitter: JitterMode,
    seed: Option<u64>,
}

impl RetryOptions {
    #[must_use]
    pub fn builder() -> RetryOptionsBuilder {
        RetryOptionsBuilder::default()
    }

    #[must_use]
    pub fn first_backoff(&self) -> Duration {
        self.first_backoff
    }

    #[must_use]
    pub fn max_backoff_interval(&self) -> Duration {
        self.max_backoff_interval
    }

    /// `None` means unbounded
    #[must_use]
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    #[must_use]
    pub fn jitter(&self) -> JitterMode {
        self.jitter
    }

    /// Build the backoff generator these options describe
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        match self.seed {
            Some(seed) => Backoff::with_seed(
                self.first_backoff,
                self.max_backoff_interval,
                self.jitter,
                seed,
            ),
            None => Backoff::new(self.first_backoff, self.max_backoff_interval, self.jitter),
        }
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            first_backoff: MIN_FIRST_BACKOFF,
            max_backoff_interval: Duration::from_secs(120),
            max_retries: None,
            jitter: JitterMode::Random,
            seed: None,
        }
    }
}

impl TryFrom<&ReconnectConfig> for RetryOptions {
    type Error = GatewayError;

    fn try_from(config: &ReconnectConfig) -> Result<Self, Self::Error> {
        let mut builder = RetryOptions::builder()
            .first_backoff(Duration::from_millis(config.first_backoff_ms))
            .max_backoff_interval(Duration::from_millis(config.max_backoff_ms))
            .jitter(config.jitter);
        if let Some(max) = config.max_retries {
            builder = builder.max_retries(max);
        }
        builder.build()
    }
}

/// Builder for [`RetryOptions`]
#[derive(Debug, Clone, Default)]
pub struct RetryOptionsBuilder {
    options: RetryOptions,
}

impl RetryOptionsBuilder {
    /// Delay before the first retry, at least 2 seconds
    #[must_use]
    pub fn first_backoff(mut self, first: Duration) -> Self {
        self.options.first_backoff = first;
        self
    }

    /// Upper bound for any retry delay
    #[must_use]
    pub fn max_backoff_interval(mut self, max: Duration) -> Self {
        self.options.max_backoff_interval = max;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max: u32) -> Self {
        self.options.max_retries = Some(max);
        self
    }

    #[must_use]
    pub fn jitter(mut self, jitter: JitterMode) -> Self {
        self.options.jitter = jitter;
        self
    }

    /// Seed the jitter source for reproducible delays
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.options.seed = Some(seed);
        self
    }

    pub fn build(self) -> GatewayResult<RetryOptions> {
        let options = self.options;
        if options.first_backoff < MIN_FIRST_BACKOFF {
            return Err(GatewayError::InvalidOptions(format!(
                "first backoff {:?} is below {:?}",
                options.first_backoff, MIN_FIRST_BACKOFF
            )));
        }
        if options.max_backoff_interval < options.first_backoff {
            return Err(GatewayError::InvalidOptions(format!(
                "max backoff {:?} is below first backoff {:?}",
                options.max_backoff_interval, options.first_backoff
            )));
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RetryOptions::builder().build().unwrap();
        assert_eq!(options.first_backoff(), Duration::from_secs(2));
        assert_eq!(options.max_backoff_interval(), Duration::from_secs(120));
        assert_eq!(options.max_retries(), None);
        assert_eq!(options.jitter(), JitterMode::Random);
    }

    #[test]
    fn test_rejects_short_first_backoff() {
        let result = RetryOptions::builder()
            .first_backoff(Duration::from_millis(1999))
            .build();
        assert!(matches!(result, Err(GatewayError::InvalidOptions(_))));
    }

    #[test]
    fn test_rejects_max_below_first() {
        let result = RetryOptions::builder()
            .first_backoff(Duration::from_secs(10))
            .max_backoff_interval(Duration::from_secs(5))
            .build();
        assert!(matches!(result, Err(GatewayError::InvalidOptions(_))));
    }

    #[test]
    fn test_max_equal_to_first_is_valid() {
        let options = RetryOptions::builder()
            .first_backoff(Duration::from_secs(3))
            .max_backoff_interval(Duration::from_secs(3))
            .max_retries(0)
            .build()
            .unwrap();
        assert_eq!(options.max_retries(), Some(0));
    }

    #[test]
    fn test_from_reconnect_config() {
        let config = ReconnectConfig {
            first_backoff_ms: 5_000,
            max_backoff_ms: 60_000,
            max_retries: Some(3),
            jitter: JitterMode::None,
        };
        let options = RetryOptions::try_from(&config).unwrap();
        assert_eq!(options.first_backoff(), Duration::from_secs(5));
        assert_eq!(options.max_backoff_interval(), Duration::from_secs(60));
        assert_eq!(options.max_retries(), Some(3));

        let mut backoff = options.backoff();
        assert_eq!(backoff.delay(2), Duration::from_secs(10));
    }
}
