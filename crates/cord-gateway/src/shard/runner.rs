//! Shard driver task
//!
//! Owns the session machine, the transport and the timers. Commands, frames,
//! heartbeat ticks and backoff expiry are funneled through one loop so every
//! input runs to completion before the next is looked at.

use crate::error::{GatewayError, GatewayResult, TransportError};
use crate::protocol::{CloseFrame, GatewayMessage, ShardInfo};
use crate::session::{
    Action, ConnectionOutcome, GatewayEvent, Input, SessionMachine, SessionState,
};
use crate::transport::{resume_url_with_query, GatewayConnection, Inbound, Transport};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep, timeout, Instant, Interval, MissedTickBehavior, Sleep};

use super::ShardConfig;

/// Upper bound for the close handshake of a connection being dropped
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) enum ShardCommand {
    Connect,
    Shutdown {
        allow_resume: bool,
        done: oneshot::Sender<()>,
    },
    Send {
        message: GatewayMessage,
        reply: oneshot::Sender<GatewayResult<()>>,
    },
}

/// Snapshot readable from the handle
#[derive(Debug, Clone, Default)]
pub(crate) struct StatusSnapshot {
    pub state: SessionState,
    pub session_id: Option<String>,
    pub sequence: Option<u64>,
    pub latency: Option<Duration>,
}

pub(crate) type SharedStatus = Arc<RwLock<StatusSnapshot>>;

/// What woke the loop
enum Wake {
    Command(Option<ShardCommand>),
    Heartbeat,
    Backoff,
    Inbound(Option<Result<Inbound, TransportError>>),
}

pub(crate) struct ShardRunner {
    shard: ShardInfo,
    url: String,
    connect_timeout: Duration,
    transport: Arc<dyn Transport>,
    machine: SessionMachine,
    commands: mpsc::Receiver<ShardCommand>,
    events: broadcast::Sender<GatewayEvent>,
    status: SharedStatus,
    connection: Option<Box<dyn GatewayConnection>>,
    heartbeat: Option<Interval>,
    retry_timer: Option<Pin<Box<Sleep>>>,
    /// Shutdowns that arrived mid-connect, answered once processed
    shutdown_waiters: Vec<oneshot::Sender<()>>,
}

impl ShardRunner {
    pub(crate) fn new(
        config: &ShardConfig,
        transport: Arc<dyn Transport>,
        commands: mpsc::Receiver<ShardCommand>,
        events: broadcast::Sender<GatewayEvent>,
        status: SharedStatus,
    ) -> Self {
        let mut machine = SessionMachine::new(config.identify().clone(), config.retry().clone());
        if let Some((session_id, sequence)) = config.resume() {
            machine = machine.with_resume(session_id, sequence);
        }
        Self {
            shard: config.shard(),
            url: config.url().to_string(),
            connect_timeout: config.connect_timeout(),
            transport,
            machine,
            commands,
            events,
            status,
            connection: None,
            heartbeat: None,
            retry_timer: None,
            shutdown_waiters: Vec::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        tracing::debug!(shard = %self.shard, "Shard task started");
        loop {
            let wake = tokio::select! {
                command = self.commands.recv() => Wake::Command(command),
                () = next_tick(&mut self.heartbeat) => Wake::Heartbeat,
                () = expired(&mut self.retry_timer) => Wake::Backoff,
                inbound = next_frame(&mut self.connection) => Wake::Inbound(inbound),
            };

            match wake {
                Wake::Command(None) => break,
                Wake::Command(Some(command)) => self.on_command(command).await,
                Wake::Heartbeat => self.process(Input::HeartbeatTick).await,
                Wake::Backoff => {
                    self.retry_timer = None;
                    self.process(Input::BackoffElapsed).await;
                }
                Wake::Inbound(inbound) => {
                    if let Some(input) = self.on_inbound(inbound) {
                        self.process(input).await;
                    }
                }
            }
        }

        // Every handle is gone
        if self.machine.state() != SessionState::Terminated {
            self.process(Input::Shutdown {
                allow_resume: false,
            })
            .await;
        }
        tracing::debug!(shard = %self.shard, "Shard task stopped");
    }

    async fn on_command(&mut self, command: ShardCommand) {
        match command {
            ShardCommand::Connect => self.process(Input::Connect).await,
            ShardCommand::Shutdown { allow_resume, done } => {
                self.process(Input::Shutdown { allow_resume }).await;
                let _ = done.send(());
            }
            ShardCommand::Send { message, reply } => {
                let result = self.send_user_payload(message).await;
                let _ = reply.send(result);
            }
        }
    }

    async fn send_user_payload(&mut self, message: GatewayMessage) -> GatewayResult<()> {
        if self.machine.state() != SessionState::Connected {
            return Err(GatewayError::NotConnected);
        }
        let text = message.to_json()?;
        let Some(connection) = self.connection.as_mut() else {
            return Err(GatewayError::NotConnected);
        };
        match connection.send(text).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.connection = None;
                self.process(Input::Connection(ConnectionOutcome::Failed(err.clone())))
                    .await;
                Err(GatewayError::Transport(err))
            }
        }
    }

    fn on_inbound(&mut self, inbound: Option<Result<Inbound, TransportError>>) -> Option<Input> {
        let outcome = match inbound {
            Some(Ok(Inbound::Text(text))) => {
                return match GatewayMessage::from_json(&text) {
                    Ok(message) => {
                        tracing::trace!(shard = %self.shard, frame = %message, "Frame received");
                        Some(Input::Frame(message))
                    }
                    Err(e) => {
                        tracing::warn!(shard = %self.shard, error = %e, "Undecodable frame dropped");
                        None
                    }
                };
            }
            Some(Ok(Inbound::Close(frame))) => ConnectionOutcome::Closed(frame),
            Some(Err(err)) => ConnectionOutcome::Failed(err),
            None => ConnectionOutcome::Failed(TransportError::Reset),
        };
        self.connection = None;
        Some(Input::Connection(outcome))
    }

    /// Run `input` and every input its actions produce
    async fn process(&mut self, input: Input) {
        let mut queue = VecDeque::from([input]);
        while let Some(input) = queue.pop_front() {
            for action in self.machine.handle(input) {
                if let Some(next) = self.apply(action).await {
                    queue.push_back(next);
                }
            }
        }
        self.publish_status();
        for done in self.shutdown_waiters.drain(..) {
            let _ = done.send(());
        }
    }

    async fn apply(&mut self, action: Action) -> Option<Input> {
        match action {
            Action::OpenTransport { resume_url } => {
                let url = resume_url.map_or_else(
                    || self.url.clone(),
                    |resume| resume_url_with_query(&resume, &self.url),
                );
                return Some(self.open(&url).await);
            }
            Action::Send(message) => return self.send_control(message).await,
            Action::CloseTransport(frame) => self.close(frame).await,
            Action::StartHeartbeat(period) => {
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.heartbeat = Some(interval);
            }
            Action::StopHeartbeat => self.heartbeat = None,
            Action::ScheduleRetry(delay) => self.retry_timer = Some(Box::pin(sleep(delay))),
            Action::CancelRetry => self.retry_timer = None,
            Action::Emit(change) => {
                tracing::info!(shard = %self.shard, event = %change, "Gateway state change");
                self.publish(GatewayEvent::StateChange(change));
            }
            Action::Dispatch(event) => {
                tracing::debug!(shard = %self.shard, event = %event.name, seq = ?event.sequence, "Dispatch");
                self.publish(GatewayEvent::Dispatch(event));
            }
            Action::Terminate(error) => {
                match &error {
                    Some(err) => {
                        tracing::error!(shard = %self.shard, error = %err, "Shard terminated");
                    }
                    None => tracing::info!(shard = %self.shard, "Shard terminated"),
                }
                self.publish(GatewayEvent::Terminated(error.map(Arc::new)));
            }
        }
        None
    }

    /// Connect while still listening for commands
    ///
    /// A shutdown arriving mid-connect abandons the attempt and is returned
    /// as the next input instead of the connection outcome.
    async fn open(&mut self, url: &str) -> Input {
        tracing::info!(shard = %self.shard, url = %url, "Opening gateway connection");
        let transport = Arc::clone(&self.transport);
        let connect = timeout(self.connect_timeout, transport.connect(url));
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    let outcome = match result {
                        Ok(Ok(connection)) => {
                            self.connection = Some(connection);
                            ConnectionOutcome::Opened
                        }
                        Ok(Err(err)) => ConnectionOutcome::Failed(err),
                        Err(_) => ConnectionOutcome::Failed(TransportError::Timeout),
                    };
                    return Input::Connection(outcome);
                }
                command = self.commands.recv() => {
                    if let Some(input) = self.on_command_while_connecting(command) {
                        tracing::debug!(shard = %self.shard, "Connection attempt abandoned");
                        return input;
                    }
                }
            }
        }
    }

    fn on_command_while_connecting(&mut self, command: Option<ShardCommand>) -> Option<Input> {
        match command {
            // Every handle is gone
            None => Some(Input::Shutdown {
                allow_resume: false,
            }),
            Some(ShardCommand::Shutdown { allow_resume, done }) => {
                self.shutdown_waiters.push(done);
                Some(Input::Shutdown { allow_resume })
            }
            Some(ShardCommand::Connect) => {
                tracing::debug!(shard = %self.shard, "Connect ignored, already connecting");
                None
            }
            Some(ShardCommand::Send { reply, .. }) => {
                let _ = reply.send(Err(GatewayError::NotConnected));
                None
            }
        }
    }

    async fn send_control(&mut self, message: GatewayMessage) -> Option<Input> {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(shard = %self.shard, error = %e, op = %message.op, "Failed to encode frame");
                return None;
            }
        };
        let connection = self.connection.as_mut()?;
        tracing::trace!(shard = %self.shard, op = %message.op, "Sending frame");
        match connection.send(text).await {
            Ok(()) => None,
            Err(err) => {
                self.connection = None;
                Some(Input::Connection(ConnectionOutcome::Failed(err)))
            }
        }
    }

    async fn close(&mut self, frame: CloseFrame) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };
        tracing::debug!(shard = %self.shard, close = %frame, "Closing gateway connection");
        match timeout(CLOSE_TIMEOUT, connection.close(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(shard = %self.shard, error = %e, "Close handshake failed"),
            Err(_) => tracing::debug!(shard = %self.shard, "Close handshake timed out"),
        }
    }

    fn publish(&self, event: GatewayEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn publish_status(&self) {
        let mut status = self.status.write();
        status.state = self.machine.state();
        status.session_id = self.machine.session_id().map(str::to_string);
        status.sequence = self.machine.sequence();
        status.latency = self.machine.heartbeat_latency();
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn expired(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

async fn next_frame(
    connection: &mut Option<Box<dyn GatewayConnection>>,
) -> Option<Result<Inbound, TransportError>> {
    match connection {
        Some(connection) => connection.recv().await,
        None => pending().await,
    }
}
