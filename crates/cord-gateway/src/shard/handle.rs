//! Shard handle
//!
//! The public face of a running shard. Cheap to share behind an `Arc`; the
//! driver task stops once the handle is dropped.

use super::runner::{ShardCommand, ShardRunner, SharedStatus};
use super::ShardConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{GatewayMessage, ShardInfo};
use crate::session::{GatewayEvent, SessionState};
use crate::transport::{Transport, WebSocketTransport};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

const COMMAND_BUFFER: usize = 32;

/// One gateway shard
pub struct Shard {
    info: ShardInfo,
    commands: mpsc::Sender<ShardCommand>,
    events: broadcast::Sender<GatewayEvent>,
    status: SharedStatus,
    outbound: DefaultDirectRateLimiter,
    task: JoinHandle<()>,
}

impl Shard {
    /// Spawn a shard over the WebSocket transport
    ///
    /// Must be called inside a tokio runtime. The shard stays idle until
    /// [`connect`](Self::connect).
    #[must_use]
    pub fn new(config: ShardConfig) -> Self {
        Self::with_transport(config, WebSocketTransport)
    }

    #[must_use]
    pub fn with_transport(config: ShardConfig, transport: impl Transport) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(config.event_buffer());
        let status = SharedStatus::default();

        let runner = ShardRunner::new(
            &config,
            Arc::new(transport),
            command_rx,
            events.clone(),
            Arc::clone(&status),
        );
        let task = tokio::spawn(runner.run());

        Self {
            info: config.shard(),
            commands: command_tx,
            events,
            status,
            outbound: RateLimiter::direct(Quota::per_minute(config.outbound_per_minute())),
            task,
        }
    }

    #[must_use]
    pub fn info(&self) -> ShardInfo {
        self.info
    }

    /// Receive state changes, dispatches and termination
    ///
    /// Events published before subscribing are not replayed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    /// Start connecting; a no-op while a session is already running
    pub async fn connect(&self) -> GatewayResult<()> {
        self.commands
            .send(ShardCommand::Connect)
            .await
            .map_err(|_| GatewayError::ChannelClosed)
    }

    /// Close the connection and stop reconnecting
    ///
    /// With `allow_resume` the session id and sequence are kept so a later
    /// [`connect`](Self::connect) resumes. Returns once the shard is terminated.
    pub async fn shutdown(&self, allow_resume: bool) -> GatewayResult<()> {
        let (done, wait) = oneshot::channel();
        self.commands
            .send(ShardCommand::Shutdown { allow_resume, done })
            .await
            .map_err(|_| GatewayError::ChannelClosed)?;
        wait.await.map_err(|_| GatewayError::ChannelClosed)
    }

    /// Send a user payload such as a presence update
    ///
    /// Waits for the outbound rate limiter. Session control opcodes are rejected.
    pub async fn send(&self, message: GatewayMessage) -> GatewayResult<()> {
        if !message.op.is_user_sendable() {
            return Err(GatewayError::NotSendable(message.op.to_string()));
        }
        self.outbound.until_ready().await;

        let (reply, response) = oneshot::channel();
        self.commands
            .send(ShardCommand::Send { message, reply })
            .await
            .map_err(|_| GatewayError::ChannelClosed)?;
        response.await.map_err(|_| GatewayError::ChannelClosed)?
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.status.read().state
    }

    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.status.read().session_id.clone()
    }

    /// Highest sequence received
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.status.read().sequence
    }

    /// Round trip of the last acknowledged heartbeat
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.status.read().latency
    }

    /// Whether the driver task is still running
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("info", &self.info)
            .field("state", &self.state())
            .finish()
    }
}
