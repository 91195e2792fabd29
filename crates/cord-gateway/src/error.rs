//! Gateway error types

use crate::protocol::CloseFrame;

/// Errors reported by the transport layer
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Connect timed out")]
    Timeout,

    #[error("Connection closed without a close frame")]
    Reset,

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Heartbeat was not acknowledged")]
    Zombie,
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

/// Errors surfaced to the owner of a shard
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Gateway closed the connection with a fatal code: {0}")]
    FatalClose(CloseFrame),

    #[error("Gave up reconnecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Shard task is no longer running")]
    ChannelClosed,

    #[error("Shard is not connected")]
    NotConnected,

    #[error("Payload not allowed: {0}")]
    NotSendable(String),

    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl GatewayError {
    /// Whether the shard stopped and will not reconnect by itself
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalClose(_) | Self::RetriesExhausted { .. })
    }
}

/// Gateway result type alias
pub type GatewayResult<T> = Result<T, GatewayError>;
