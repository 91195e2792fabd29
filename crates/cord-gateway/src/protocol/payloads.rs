//! Payload definitions
//!
//! The control payloads the session itself reads or writes. Dispatch payloads
//! other than READY are passed through untouched.

use super::Intents;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload for op 10 (Hello)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

/// Shard index and total, serialized as `[index, count]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct ShardInfo {
    pub index: u32,
    pub count: u32,
}

impl ShardInfo {
    #[must_use]
    pub const fn new(index: u32, count: u32) -> Self {
        Self { index, count }
    }
}

impl Default for ShardInfo {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

impl From<[u32; 2]> for ShardInfo {
    fn from([index, count]: [u32; 2]) -> Self {
        Self { index, count }
    }
}

impl From<ShardInfo> for [u32; 2] {
    fn from(shard: ShardInfo) -> Self {
        [shard.index, shard.count]
    }
}

impl std::fmt::Display for ShardInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.index, self.count)
    }
}

/// Payload for op 2 (Identify)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub properties: IdentifyProperties,
    pub large_threshold: u32,
    pub shard: ShardInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<Value>,
    pub intents: u64,
}

impl IdentifyPayload {
    #[must_use]
    pub fn new(token: impl Into<String>, shard: ShardInfo, intents: Intents) -> Self {
        Self {
            token: token.into(),
            properties: IdentifyProperties::default(),
            large_threshold: 250,
            shard,
            presence: None,
            intents: intents.bits(),
        }
    }

    #[must_use]
    pub fn large_threshold(mut self, threshold: u32) -> Self {
        self.large_threshold = threshold;
        self
    }

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
}

/// Client connection properties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl IdentifyProperties {
    /// Create properties with the library name as browser and device
    #[must_use]
    pub fn new() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "cord".to_string(),
            device: "cord".to_string(),
        }
    }

    #[must_use]
    pub fn os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    #[must_use]
    pub fn browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = browser.into();
        self
    }

    #[must_use]
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload for op 6 (Resume)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    /// Last sequence number received
    pub seq: u64,
}

/// The fields of the READY dispatch the session keeps
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
}
