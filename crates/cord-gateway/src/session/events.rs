//! Events a shard emits to its consumers

use crate::error::GatewayError;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle notification, immutable once created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStateChange {
    /// Handshake completed
    Connected,
    /// Connection lost or closed, stored session discarded on shutdown
    Disconnected,
    /// Closed on request with the session kept for a later resume
    DisconnectedResume,
    /// First retry of a cycle, next connection identifies
    RetryStarted { backoff: Duration },
    /// First retry of a cycle, next connection resumes
    RetryResumeStarted { backoff: Duration },
    /// Handshake completed after `attempt` attempts
    RetrySucceeded { attempt: u32 },
    /// Attempt `attempt` failed, retrying after `backoff` (zero when giving up)
    RetryFailed { attempt: u32, backoff: Duration },
}

impl GatewayStateChange {
    #[must_use]
    pub const fn connected() -> Self {
        Self::Connected
    }

    #[must_use]
    pub const fn disconnected() -> Self {
        Self::Disconnected
    }

    #[must_use]
    pub const fn disconnected_resume() -> Self {
        Self::DisconnectedResume
    }

    #[must_use]
    pub const fn retry_started(backoff: Duration) -> Self {
        Self::RetryStarted { backoff }
    }

    #[must_use]
    pub const fn retry_resume_started(backoff: Duration) -> Self {
        Self::RetryResumeStarted { backoff }
    }

    #[must_use]
    pub const fn retry_succeeded(attempt: u32) -> Self {
        Self::RetrySucceeded { attempt }
    }

    #[must_use]
    pub const fn retry_failed(attempt: u32, backoff: Duration) -> Self {
        Self::RetryFailed { attempt, backoff }
    }

    /// Backoff carried by retry variants
    #[must_use]
    pub const fn backoff(&self) -> Option<Duration> {
        match self {
            Self::RetryStarted { backoff }
            | Self::RetryResumeStarted { backoff }
            | Self::RetryFailed { backoff, .. } => Some(*backoff),
            _ => None,
        }
    }

    /// Attempt count carried by retry variants
    #[must_use]
    pub const fn attempt(&self) -> Option<u32> {
        match self {
            Self::RetrySucceeded { attempt } | Self::RetryFailed { attempt, .. } => Some(*attempt),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
            Self::DisconnectedResume => "DisconnectedResume",
            Self::RetryStarted { .. } => "RetryStarted",
            Self::RetryResumeStarted { .. } => "RetryResumeStarted",
            Self::RetrySucceeded { .. } => "RetrySucceeded",
            Self::RetryFailed { .. } => "RetryFailed",
        }
    }
}

impl std::fmt::Display for GatewayStateChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RetryStarted { backoff } | Self::RetryResumeStarted { backoff } => {
                write!(f, "{}(backoff={backoff:?})", self.name())
            }
            Self::RetrySucceeded { attempt } => write!(f, "{}(attempt={attempt})", self.name()),
            Self::RetryFailed { attempt, backoff } => {
                write!(f, "{}(attempt={attempt}, backoff={backoff:?})", self.name())
            }
            _ => f.write_str(self.name()),
        }
    }
}

/// A dispatch frame passed through without interpretation
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchEvent {
    /// Event name, e.g. `MESSAGE_CREATE`
    pub name: String,
    pub sequence: Option<u64>,
    pub data: Value,
}

/// Everything a shard publishes
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    StateChange(GatewayStateChange),
    Dispatch(DispatchEvent),
    /// The session stopped; `Some` when it gave up on its own
    Terminated(Option<Arc<GatewayError>>),
}

impl GatewayEvent {
    /// The state change, if this is one
    #[must_use]
    pub fn as_state_change(&self) -> Option<GatewayStateChange> {
        match self {
            Self::StateChange(change) => Some(*change),
            _ => None,
        }
    }
}
