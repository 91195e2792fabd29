//! Gateway frame envelope
//!
//! Every frame in either direction is `{op, d, s, t}`.

use super::{HelloPayload, IdentifyPayload, OpCode, ReadyPayload, ResumePayload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway message format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// Operation code
    pub op: OpCode,

    /// Event data, `null` when the opcode carries none
    #[serde(default)]
    pub d: Value,

    /// Sequence number (dispatch only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event name (dispatch only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayMessage {
    /// Create a frame without sequence or event name
    #[must_use]
    pub fn new(op: OpCode, d: Value) -> Self {
        Self {
            op,
            d,
            s: None,
            t: None,
        }
    }

    // === Client Messages ===

    /// Heartbeat carrying the last sequence seen, `null` before any dispatch
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::new(
            OpCode::Heartbeat,
            last_sequence.map_or(Value::Null, |s| Value::Number(s.into())),
        )
    }

    #[must_use]
    pub fn identify(payload: &IdentifyPayload) -> Self {
        Self::new(
            OpCode::Identify,
            serde_json::to_value(payload).unwrap_or_default(),
        )
    }

    #[must_use]
    pub fn resume(payload: &ResumePayload) -> Self {
        Self::new(
            OpCode::Resume,
            serde_json::to_value(payload).unwrap_or_default(),
        )
    }

    // === Server Messages ===

    /// Dispatch frame, as the server sends it
    #[must_use]
    pub fn dispatch(event_type: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d: data,
            s: Some(sequence),
            t: Some(event_type.into()),
        }
    }

    #[must_use]
    pub fn hello(heartbeat_interval_ms: u64) -> Self {
        Self::new(
            OpCode::Hello,
            serde_json::json!({ "heartbeat_interval": heartbeat_interval_ms }),
        )
    }

    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::new(OpCode::HeartbeatAck, Value::Null)
    }

    #[must_use]
    pub fn reconnect() -> Self {
        Self::new(OpCode::Reconnect, Value::Null)
    }

    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::new(OpCode::InvalidSession, Value::Bool(resumable))
    }

    // === Parsing ===

    /// Try to parse as a Hello payload (op=10)
    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.op != OpCode::Hello {
            return None;
        }
        serde_json::from_value(self.d.clone()).ok()
    }

    /// Try to parse as a READY dispatch
    pub fn as_ready(&self) -> Option<ReadyPayload> {
        if self.op != OpCode::Dispatch || self.t.as_deref() != Some("READY") {
            return None;
        }
        serde_json::from_value(self.d.clone()).ok()
    }

    /// Try to parse as an Identify payload (op=2)
    pub fn as_identify(&self) -> Option<IdentifyPayload> {
        if self.op != OpCode::Identify {
            return None;
        }
        serde_json::from_value(self.d.clone()).ok()
    }

    /// Try to parse as a Resume payload (op=6)
    pub fn as_resume(&self) -> Option<ResumePayload> {
        if self.op != OpCode::Resume {
            return None;
        }
        serde_json::from_value(self.d.clone()).ok()
    }

    /// Resumable flag of an Invalid Session frame (op=9)
    ///
    /// A missing or non-boolean `d` counts as not resumable.
    pub fn invalid_session_resumable(&self) -> Option<bool> {
        if self.op != OpCode::InvalidSession {
            return None;
        }
        Some(self.d.as_bool().unwrap_or(false))
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayMessage(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayMessage(op={})", self.op)
        }
    }
}
