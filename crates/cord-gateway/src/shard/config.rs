//! Shard configuration

use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{IdentifyPayload, IdentifyProperties, Intents, ShardInfo};
use crate::retry::RetryOptions;
use cord_common::AppConfig;
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;

/// Default gateway URL, API v10 with JSON encoding
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Outbound user payloads per minute, leaving room for heartbeats
pub const DEFAULT_OUTBOUND_PER_MINUTE: u32 = 115;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_EVENT_BUFFER: usize = 256;

/// Everything a shard needs to run
#[derive(Debug, Clone)]
pub struct ShardConfig {
    url: String,
    identify: IdentifyPayload,
    retry: RetryOptions,
    outbound_per_minute: NonZeroU32,
    connect_timeout: Duration,
    event_buffer: usize,
    resume: Option<(String, u64)>,
}

impl ShardConfig {
    #[must_use]
    pub fn builder(token: impl Into<String>) -> ShardConfigBuilder {
        ShardConfigBuilder::new(token.into())
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn identify(&self) -> &IdentifyPayload {
        &self.identify
    }

    #[must_use]
    pub fn shard(&self) -> ShardInfo {
        self.identify.shard
    }

    #[must_use]
    pub fn retry(&self) -> &RetryOptions {
        &self.retry
    }

    #[must_use]
    pub fn outbound_per_minute(&self) -> NonZeroU32 {
        self.outbound_per_minute
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Capacity of the event broadcast channel
    #[must_use]
    pub fn event_buffer(&self) -> usize {
        self.event_buffer
    }

    /// Session to resume on the first connection
    #[must_use]
    pub fn resume(&self) -> Option<(&str, u64)> {
        self.resume.as_ref().map(|(id, seq)| (id.as_str(), *seq))
    }
}

impl TryFrom<&AppConfig> for ShardConfig {
    type Error = GatewayError;

    fn try_from(config: &AppConfig) -> Result<Self, Self::Error> {
        let gateway = &config.gateway;
        ShardConfig::builder(gateway.token.clone())
            .url(gateway.url.clone())
            .shard(ShardInfo::new(gateway.shard_index, gateway.shard_count))
            .intents(Intents::from_bits_truncate(gateway.intents))
            .large_threshold(gateway.large_threshold)
            .outbound_per_minute(gateway.outbound_per_minute)
            .connect_timeout(Duration::from_secs(gateway.connect_timeout_secs))
            .retry(RetryOptions::try_from(&config.reconnect)?)
            .build()
    }
}

/// Builder for [`ShardConfig`]
#[derive(Debug, Clone)]
pub struct ShardConfigBuilder {
    token: String,
    url: String,
    shard: ShardInfo,
    intents: Intents,
    large_threshold: u32,
    presence: Option<Value>,
    properties: IdentifyProperties,
    retry: RetryOptions,
    outbound_per_minute: u32,
    connect_timeout: Duration,
    event_buffer: usize,
    resume: Option<(String, u64)>,
}

impl ShardConfigBuilder {
    fn new(token: String) -> Self {
        Self {
            token,
            url: DEFAULT_GATEWAY_URL.to_string(),
            shard: ShardInfo::default(),
            intents: Intents::default(),
            large_threshold: 250,
            presence: None,
            properties: IdentifyProperties::default(),
            retry: RetryOptions::default(),
            outbound_per_minute: DEFAULT_OUTBOUND_PER_MINUTE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            event_buffer: DEFAULT_EVENT_BUFFER,
            resume: None,
        }
    }

    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    #[must_use]
    pub fn shard(mut self, shard: ShardInfo) -> Self {
        self.shard = shard;
        self
    }

    #[must_use]
    pub fn intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    /// Member count above which a guild is sent without offline members
    #[must_use]
    pub fn large_threshold(mut self, threshold: u32) -> Self {
        self.large_threshold = threshold;
        self
    }

    /// Initial presence sent with IDENTIFY
    #[must_use]
    pub fn presence(mut self, presence: Value) -> Self {
        self.presence = Some(presence);
        self
    }

    #[must_use]
    pub fn properties(mut self, properties: IdentifyProperties) -> Self {
        self.properties = properties;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn outbound_per_minute(mut self, per_minute: u32) -> Self {
        self.outbound_per_minute = per_minute;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    /// Resume a known session instead of identifying on the first HELLO
    #[must_use]
    pub fn resume(mut self, session_id: impl Into<String>, sequence: u64) -> Self {
        self.resume = Some((session_id.into(), sequence));
        self
    }

    pub fn build(self) -> GatewayResult<ShardConfig> {
        if self.token.is_empty() {
            return Err(GatewayError::InvalidOptions("token is empty".into()));
        }
        if self.shard.count == 0 || self.shard.index >= self.shard.count {
            return Err(GatewayError::InvalidOptions(format!(
                "shard {} is out of range",
                self.shard
            )));
        }
        if !(50..=250).contains(&self.large_threshold) {
            return Err(GatewayError::InvalidOptions(format!(
                "large threshold {} must be between 50 and 250",
                self.large_threshold
            )));
        }
        let outbound_per_minute = NonZeroU32::new(self.outbound_per_minute).ok_or_else(|| {
            GatewayError::InvalidOptions("outbound_per_minute must be positive".into())
        })?;
        if self.event_buffer == 0 {
            return Err(GatewayError::InvalidOptions(
                "event buffer must be positive".into(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(GatewayError::InvalidOptions(
                "connect timeout must be positive".into(),
            ));
        }

        let mut identify = IdentifyPayload::new(self.token, self.shard, self.intents)
            .large_threshold(self.large_threshold)
            .properties(self.properties);
        if let Some(presence) = self.presence {
            identify = identify.presence(presence);
        }

        Ok(ShardConfig {
            url: self.url,
            identify,
            retry: self.retry,
            outbound_per_minute,
            connect_timeout: self.connect_timeout,
            event_buffer: self.event_buffer,
            resume: self.resume,
        })
    }
}
