//! Transport boundary
//!
//! The shard runner only sees text frames and close frames. The WebSocket
//! implementation lives in [`websocket`]; tests plug in scripted transports.

mod websocket;

pub use websocket::WebSocketTransport;

use crate::error::TransportError;
use crate::protocol::CloseFrame;
use async_trait::async_trait;

/// A frame received from the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Close(CloseFrame),
}

/// Opens gateway connections
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Box<dyn GatewayConnection>, TransportError>;
}

/// One open duplex connection
///
/// `recv` must be cancel safe, the runner polls it inside `select!`.
#[async_trait]
pub trait GatewayConnection: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next frame, `None` once the stream ended without a close frame
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>>;

    async fn close(&mut self, frame: CloseFrame) -> Result<(), TransportError>;
}

/// Carry the query string of `base` over to a resume URL that lacks one
#[must_use]
pub fn resume_url_with_query(resume_url: &str, base: &str) -> String {
    if resume_url.contains('?') {
        return resume_url.to_string();
    }
    match base.split_once('?') {
        Some((_, query)) => {
            let trimmed = resume_url.trim_end_matches('/');
            format!("{trimmed}/?{query}")
        }
        None => resume_url.to_string(),
    }
}
