//! WebSocket transport over tokio-tungstenite

use super::{GatewayConnection, Inbound, Transport};
use crate::error::TransportError;
use crate::protocol::CloseFrame;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Connects with `tokio_tungstenite::connect_async`, TLS for `wss://` URLs
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn GatewayConnection>, TransportError> {
        let (stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::debug!(url = %url, status = %response.status(), "WebSocket handshake completed");
        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl GatewayConnection for WebSocketConnection {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };
            match message {
                Message::Text(text) => return Some(Ok(Inbound::Text(text))),
                Message::Close(frame) => {
                    let frame = frame.map_or_else(
                        || CloseFrame::new(CloseFrame::NO_STATUS, ""),
                        |f| CloseFrame::new(u16::from(f.code), f.reason.into_owned()),
                    );
                    return Some(Ok(Inbound::Close(frame)));
                }
                Message::Binary(bytes) => {
                    tracing::warn!(len = bytes.len(), "Binary gateway frame dropped");
                }
                // Pongs are queued by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self, frame: CloseFrame) -> Result<(), TransportError> {
        let ws_frame = WsCloseFrame {
            code: WsCloseCode::from(frame.code),
            reason: frame.reason.into(),
        };
        match self.stream.close(Some(ws_frame)).await {
            Ok(())
            | Err(
                tokio_tungstenite::tungstenite::Error::ConnectionClosed
                | tokio_tungstenite::tungstenite::Error::AlreadyClosed,
            ) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
