//! Application configuration structs
//!
//! Loads configuration from environment variables, falling back to defaults.

use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Smallest accepted first reconnect backoff, in milliseconds
pub const MIN_FIRST_BACKOFF_MS: u64 = 2_000;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: GatewayConfig,
    pub reconnect: ReconnectConfig,
    pub rest: RestConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            other => Err(ConfigError::InvalidValue("APP_ENV", other.to_string())),
        }
    }
}

/// Gateway connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Bot token sent in IDENTIFY and RESUME
    pub token: String,
    #[serde(default = "default_gateway_url")]
    pub url: String,
    #[serde(default)]
    pub shard_index: u32,
    #[serde(default = "default_shard_count")]
    pub shard_count: u32,
    /// Raw intent bits
    #[serde(default = "default_intents")]
    pub intents: u64,
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u32,
    /// User payloads allowed per minute, heartbeats excluded
    #[serde(default = "default_outbound_per_minute")]
    pub outbound_per_minute: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Jitter applied to reconnect backoff delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JitterMode {
    /// Use the computed delay as is
    None,
    /// Uniform in `[0, delay]`
    Full,
    /// Uniform in `[delay / 2, delay]`
    #[default]
    Random,
}

impl FromStr for JitterMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "full" => Ok(Self::Full),
            "random" => Ok(Self::Random),
            other => Err(ConfigError::InvalidValue("RECONNECT_JITTER", other.to_string())),
        }
    }
}

/// Gateway reconnect configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_first_backoff_ms")]
    pub first_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// `None` retries forever
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub jitter: JitterMode,
}

impl ReconnectConfig {
    /// Check the backoff bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.first_backoff_ms < MIN_FIRST_BACKOFF_MS {
            return Err(ConfigError::InvalidValue(
                "RECONNECT_FIRST_BACKOFF_MS",
                format!("{} is below {MIN_FIRST_BACKOFF_MS}", self.first_backoff_ms),
            ));
        }
        if self.max_backoff_ms < self.first_backoff_ms {
            return Err(ConfigError::InvalidValue(
                "RECONNECT_MAX_BACKOFF_MS",
                format!(
                    "{} is below the first backoff {}",
                    self.max_backoff_ms, self.first_backoff_ms
                ),
            ));
        }
        Ok(())
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            first_backoff_ms: default_first_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_retries: None,
            jitter: JitterMode::default(),
        }
    }
}

/// What a full bucket queue does with a new submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SaturationPolicy {
    /// Wait for room in the queue
    #[default]
    Block,
    /// Fail immediately with a saturation error
    Reject,
}

impl FromStr for SaturationPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::InvalidValue(
                "REST_SATURATION_POLICY",
                other.to_string(),
            )),
        }
    }
}

/// REST router configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_rest_base_url")]
    pub base_url: String,
    #[serde(default = "default_global_permits")]
    pub global_permits: u32,
    #[serde(default = "default_global_refill_ms")]
    pub global_refill_ms: u64,
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    #[serde(default = "default_bucket_capacity")]
    pub bucket_capacity: usize,
    #[serde(default)]
    pub saturation_policy: SaturationPolicy,
    #[serde(default = "default_max_rate_limit_retries")]
    pub max_rate_limit_retries: u32,
    /// `None` keeps bucket queues for the process lifetime
    #[serde(default)]
    pub bucket_idle_eviction_secs: Option<u64>,
    #[serde(default = "default_rest_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: default_rest_base_url(),
            global_permits: default_global_permits(),
            global_refill_ms: default_global_refill_ms(),
            parallelism: default_parallelism(),
            bucket_capacity: default_bucket_capacity(),
            saturation_policy: SaturationPolicy::default(),
            max_rate_limit_retries: default_max_rate_limit_retries(),
            bucket_idle_eviction_secs: None,
            timeout_secs: default_rest_timeout_secs(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "cord".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg/?v=10&encoding=json".to_string()
}

fn default_shard_count() -> u32 {
    1
}

fn default_intents() -> u64 {
    // Every non-privileged intent
    53_575_421
}

fn default_large_threshold() -> u32 {
    250
}

fn default_outbound_per_minute() -> u32 {
    115
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_first_backoff_ms() -> u64 {
    MIN_FIRST_BACKOFF_MS
}

fn default_max_backoff_ms() -> u64 {
    120_000
}

fn default_rest_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_global_permits() -> u32 {
    50
}

fn default_global_refill_ms() -> u64 {
    1_000
}

fn default_parallelism() -> usize {
    12
}

fn default_bucket_capacity() -> usize {
    64
}

fn default_max_rate_limit_retries() -> u32 {
    5
}

fn default_rest_timeout_secs() -> u64 {
    30
}

/// Parse an optional variable, failing on values that are present but malformed
fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        _ => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: parse_var(&lookup, "APP_ENV")?.unwrap_or_default(),
            },
            gateway: GatewayConfig {
                token: lookup("DISCORD_TOKEN")
                    .filter(|s| !s.trim().is_empty())
                    .ok_or(ConfigError::MissingVar("DISCORD_TOKEN"))?,
                url: lookup("GATEWAY_URL").unwrap_or_else(default_gateway_url),
                shard_index: parse_var(&lookup, "SHARD_INDEX")?.unwrap_or(0),
                shard_count: parse_var(&lookup, "SHARD_COUNT")?
                    .unwrap_or_else(default_shard_count),
                intents: parse_var(&lookup, "GATEWAY_INTENTS")?.unwrap_or_else(default_intents),
                large_threshold: parse_var(&lookup, "GATEWAY_LARGE_THRESHOLD")?
                    .unwrap_or_else(default_large_threshold),
                outbound_per_minute: parse_var(&lookup, "GATEWAY_OUTBOUND_PER_MINUTE")?
                    .unwrap_or_else(default_outbound_per_minute),
                connect_timeout_secs: parse_var(&lookup, "GATEWAY_CONNECT_TIMEOUT_SECS")?
                    .unwrap_or_else(default_connect_timeout_secs),
            },
            reconnect: ReconnectConfig {
                first_backoff_ms: parse_var(&lookup, "RECONNECT_FIRST_BACKOFF_MS")?
                    .unwrap_or_else(default_first_backoff_ms),
                max_backoff_ms: parse_var(&lookup, "RECONNECT_MAX_BACKOFF_MS")?
                    .unwrap_or_else(default_max_backoff_ms),
                max_retries: parse_var(&lookup, "RECONNECT_MAX_RETRIES")?,
                jitter: parse_var(&lookup, "RECONNECT_JITTER")?.unwrap_or_default(),
            },
            rest: RestConfig {
                base_url: lookup("REST_BASE_URL").unwrap_or_else(default_rest_base_url),
                global_permits: parse_var(&lookup, "REST_GLOBAL_PERMITS")?
                    .unwrap_or_else(default_global_permits),
                global_refill_ms: parse_var(&lookup, "REST_GLOBAL_REFILL_MS")?
                    .unwrap_or_else(default_global_refill_ms),
                parallelism: parse_var(&lookup, "REST_PARALLELISM")?
                    .unwrap_or_else(default_parallelism),
                bucket_capacity: parse_var(&lookup, "REST_BUCKET_CAPACITY")?
                    .unwrap_or_else(default_bucket_capacity),
                saturation_policy: parse_var(&lookup, "REST_SATURATION_POLICY")?
                    .unwrap_or_default(),
                max_rate_limit_retries: parse_var(&lookup, "REST_MAX_RATE_LIMIT_RETRIES")?
                    .unwrap_or_else(default_max_rate_limit_retries),
                bucket_idle_eviction_secs: parse_var(&lookup, "REST_BUCKET_IDLE_EVICTION_SECS")?,
                timeout_secs: parse_var(&lookup, "REST_TIMEOUT_SECS")?
                    .unwrap_or_else(default_rest_timeout_secs),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reconnect.validate()?;

        if self.gateway.shard_count == 0 || self.gateway.shard_index >= self.gateway.shard_count {
            return Err(ConfigError::InvalidValue(
                "SHARD_INDEX",
                format!(
                    "shard {} is out of range for {} shards",
                    self.gateway.shard_index, self.gateway.shard_count
                ),
            ));
        }
        if !(50..=250).contains(&self.gateway.large_threshold) {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_LARGE_THRESHOLD",
                self.gateway.large_threshold.to_string(),
            ));
        }
        if self.gateway.outbound_per_minute == 0 {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_OUTBOUND_PER_MINUTE",
                "0".to_string(),
            ));
        }
        if self.rest.global_permits == 0 || self.rest.global_refill_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "REST_GLOBAL_PERMITS",
                format!(
                    "{} permits per {}ms",
                    self.rest.global_permits, self.rest.global_refill_ms
                ),
            ));
        }
        if self.rest.parallelism == 0 {
            return Err(ConfigError::InvalidValue("REST_PARALLELISM", "0".to_string()));
        }
        if self.rest.bucket_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "REST_BUCKET_CAPACITY",
                "0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
