//! Session state machine
//!
//! A synchronous transition function. The shard runner feeds it one [`Input`]
//! at a time from a single task and carries out the returned [`Action`]s, so
//! frames and timer ticks never race on the retry context or sequence.

use super::{
    ConnectionOutcome, DispatchEvent, GatewayStateChange, Heartbeat, SessionState,
};
use crate::error::GatewayError;
use crate::protocol::{
    CloseClassification, CloseFrame, GatewayMessage, IdentifyPayload, OpCode, ResumePayload,
    ShardInfo,
};
use crate::retry::{Backoff, RetryContext, RetryOptions};
use std::time::Duration;
use tokio::time::Instant;

/// Something that happened to the shard
#[derive(Debug)]
pub enum Input {
    /// Explicit connect request
    Connect,
    Connection(ConnectionOutcome),
    Frame(GatewayMessage),
    HeartbeatTick,
    BackoffElapsed,
    /// Explicit shutdown, keeping the session when `allow_resume` is set
    Shutdown { allow_resume: bool },
}

/// Something the runner must do
#[derive(Debug)]
pub enum Action {
    /// Open a transport, to the resume URL when one is given
    OpenTransport { resume_url: Option<String> },
    Send(GatewayMessage),
    /// Close and drop the current transport; no outcome will be reported for it
    CloseTransport(CloseFrame),
    StartHeartbeat(Duration),
    StopHeartbeat,
    ScheduleRetry(Duration),
    CancelRetry,
    Emit(GatewayStateChange),
    Dispatch(DispatchEvent),
    /// The session stopped, with the error when it gave up on its own
    Terminate(Option<GatewayError>),
}

/// Session id and sequence held across connections
#[derive(Debug, Clone, Default)]
struct StoredSession {
    id: Option<String>,
    resume_url: Option<String>,
    sequence: Option<u64>,
}

impl StoredSession {
    fn resumable(&self) -> Option<(&str, u64)> {
        Some((self.id.as_deref()?, self.sequence?))
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Connect, identify or resume, and reconnect logic for one shard
#[derive(Debug)]
pub struct SessionMachine {
    shard: ShardInfo,
    identify: IdentifyPayload,
    options: RetryOptions,
    backoff: Backoff,
    retry: RetryContext,
    state: SessionState,
    session: StoredSession,
    heartbeat: Heartbeat,
}

impl SessionMachine {
    #[must_use]
    pub fn new(identify: IdentifyPayload, options: RetryOptions) -> Self {
        Self {
            shard: identify.shard,
            backoff: options.backoff(),
            retry: RetryContext::new(options.first_backoff(), options.max_backoff_interval()),
            identify,
            options,
            state: SessionState::Fresh,
            session: StoredSession::default(),
            heartbeat: Heartbeat::default(),
        }
    }

    /// Start from a known session so the first HELLO resumes it
    #[must_use]
    pub fn with_resume(mut self, session_id: impl Into<String>, sequence: u64) -> Self {
        self.session.id = Some(session_id.into());
        self.session.sequence = Some(sequence);
        self
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn retry(&self) -> &RetryContext {
        &self.retry
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session.id.as_deref()
    }

    /// Highest sequence seen
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.session.sequence
    }

    #[must_use]
    pub fn heartbeat_latency(&self) -> Option<Duration> {
        self.heartbeat.latency()
    }

    #[must_use]
    pub fn shard(&self) -> ShardInfo {
        self.shard
    }

    /// Apply one input and return what the runner has to do, in order
    pub fn handle(&mut self, input: Input) -> Vec<Action> {
        let mut actions = Vec::new();
        match input {
            Input::Connect => self.on_connect(&mut actions),
            Input::Connection(ConnectionOutcome::Opened) => self.on_opened(),
            Input::Connection(ConnectionOutcome::Closed(frame)) => {
                tracing::info!(shard = %self.shard, close = %frame, "Gateway connection closed");
                self.on_connection_lost(frame.classification(), Some(frame), &mut actions);
            }
            Input::Connection(ConnectionOutcome::Failed(err)) => {
                tracing::warn!(shard = %self.shard, error = %err, "Gateway transport failed");
                self.on_connection_lost(CloseClassification::Resume, None, &mut actions);
            }
            Input::Frame(msg) => self.on_frame(msg, &mut actions),
            Input::HeartbeatTick => self.on_heartbeat_tick(&mut actions),
            Input::BackoffElapsed => self.on_backoff_elapsed(&mut actions),
            Input::Shutdown { allow_resume } => self.on_shutdown(allow_resume, &mut actions),
        }
        actions
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(shard = %self.shard, from = %self.state, to = %next, "Session state changed");
        self.state = next;
    }

    fn resume_url(&self) -> Option<String> {
        self.session
            .resumable()
            .and(self.session.resume_url.clone())
    }

    fn on_connect(&mut self, actions: &mut Vec<Action>) {
        if !matches!(self.state, SessionState::Fresh | SessionState::Terminated) {
            tracing::debug!(shard = %self.shard, state = %self.state, "Connect ignored, session already running");
            return;
        }
        self.transition(SessionState::Connecting);
        actions.push(Action::OpenTransport {
            resume_url: self.resume_url(),
        });
    }

    fn on_opened(&mut self) {
        if self.state == SessionState::Connecting {
            self.transition(SessionState::AwaitingHello);
        }
    }

    fn on_backoff_elapsed(&mut self, actions: &mut Vec<Action>) {
        if self.state != SessionState::RetryWaiting {
            return;
        }
        self.transition(SessionState::Connecting);
        actions.push(Action::OpenTransport {
            resume_url: self.resume_url(),
        });
    }

    fn on_frame(&mut self, msg: GatewayMessage, actions: &mut Vec<Action>) {
        if !matches!(
            self.state,
            SessionState::AwaitingHello
                | SessionState::Identifying
                | SessionState::Resuming
                | SessionState::Connected
        ) {
            tracing::debug!(shard = %self.shard, state = %self.state, frame = %msg, "Frame dropped, no live connection");
            return;
        }
        if self.state == SessionState::AwaitingHello && msg.op != OpCode::Hello {
            tracing::warn!(shard = %self.shard, frame = %msg, "Frame before HELLO dropped");
            return;
        }

        if let Some(sequence) = msg.s {
            self.record_sequence(sequence);
        }

        match msg.op {
            OpCode::Hello => self.on_hello(&msg, actions),
            OpCode::Dispatch => self.on_dispatch(msg, actions),
            OpCode::Heartbeat => {
                // Server asked for an immediate beat
                actions.push(Action::Send(GatewayMessage::heartbeat(self.session.sequence)));
                self.heartbeat.requested(Instant::now());
            }
            OpCode::HeartbeatAck => {
                if let Some(latency) = self.heartbeat.acknowledged(Instant::now()) {
                    tracing::trace!(
                        shard = %self.shard,
                        latency_ms = latency.as_millis() as u64,
                        "Heartbeat acknowledged"
                    );
                }
            }
            OpCode::Reconnect => {
                tracing::info!(shard = %self.shard, "Gateway requested a reconnect");
                actions.push(Action::CloseTransport(CloseFrame::resume("reconnect requested")));
                self.on_connection_lost(CloseClassification::Resume, None, actions);
            }
            OpCode::InvalidSession => {
                let resumable = msg.invalid_session_resumable().unwrap_or(false);
                self.on_invalid_session(resumable, actions);
            }
            op => {
                tracing::warn!(shard = %self.shard, op = %op, "Unexpected opcode from gateway, frame dropped");
            }
        }
    }

    fn record_sequence(&mut self, sequence: u64) {
        let current = self.session.sequence.unwrap_or(0);
        if sequence <= current && self.session.sequence.is_some() {
            if sequence < current {
                tracing::debug!(shard = %self.shard, sequence, current, "Out of order sequence ignored");
            }
            return;
        }
        self.session.sequence = Some(sequence);
    }

    fn on_hello(&mut self, msg: &GatewayMessage, actions: &mut Vec<Action>) {
        if self.state != SessionState::AwaitingHello {
            tracing::warn!(shard = %self.shard, state = %self.state, "Unexpected HELLO dropped");
            return;
        }
        let Some(hello) = msg.as_hello().filter(|h| h.heartbeat_interval > 0) else {
            tracing::warn!(shard = %self.shard, "Malformed HELLO dropped");
            return;
        };

        let interval = Duration::from_millis(hello.heartbeat_interval);
        self.heartbeat.start(interval);
        actions.push(Action::StartHeartbeat(interval));

        if self.retry.is_connected() {
            self.send_identify(actions);
        } else {
            self.send_resume_or_identify(actions);
        }
    }

    fn send_resume_or_identify(&mut self, actions: &mut Vec<Action>) {
        let resume = self.session.resumable().map(|(id, seq)| ResumePayload {
            token: self.identify.token.clone(),
            session_id: id.to_string(),
            seq,
        });
        match resume {
            Some(payload) => {
                tracing::info!(shard = %self.shard, session_id = %payload.session_id, seq = payload.seq, "Resuming session");
                self.transition(SessionState::Resuming);
                actions.push(Action::Send(GatewayMessage::resume(&payload)));
            }
            None => self.send_identify(actions),
        }
    }

    fn send_identify(&mut self, actions: &mut Vec<Action>) {
        tracing::info!(shard = %self.shard, "Identifying");
        self.transition(SessionState::Identifying);
        actions.push(Action::Send(GatewayMessage::identify(&self.identify)));
    }

    fn on_dispatch(&mut self, msg: GatewayMessage, actions: &mut Vec<Action>) {
        let Some(name) = msg.t.clone() else {
            tracing::warn!(shard = %self.shard, "Dispatch without event name dropped");
            return;
        };

        match name.as_str() {
            "READY" => match msg.as_ready() {
                Some(ready) => {
                    self.session.id = Some(ready.session_id);
                    self.session.resume_url = ready.resume_gateway_url;
                    if self.state == SessionState::Identifying {
                        self.enter_connected(actions);
                    }
                }
                None => tracing::warn!(shard = %self.shard, "READY without session id"),
            },
            "RESUMED" if self.state == SessionState::Resuming => self.enter_connected(actions),
            _ => {}
        }

        actions.push(Action::Dispatch(DispatchEvent {
            name,
            sequence: msg.s,
            data: msg.d,
        }));
    }

    fn enter_connected(&mut self, actions: &mut Vec<Action>) {
        let attempt = self.retry.attempts();
        self.transition(SessionState::Connected);
        if attempt > 1 {
            actions.push(Action::Emit(GatewayStateChange::retry_succeeded(attempt)));
        }
        self.retry.reset();
        tracing::info!(shard = %self.shard, attempt, "Shard connected");
        actions.push(Action::Emit(GatewayStateChange::connected()));
    }

    fn on_invalid_session(&mut self, resumable: bool, actions: &mut Vec<Action>) {
        if !self.state.is_heartbeating() {
            tracing::warn!(shard = %self.shard, state = %self.state, "Unexpected INVALID_SESSION dropped");
            return;
        }
        tracing::info!(shard = %self.shard, resumable, "Session invalidated by gateway");
        if resumable {
            self.send_resume_or_identify(actions);
        } else {
            self.session.clear();
            actions.push(Action::CloseTransport(CloseFrame::normal()));
            self.on_connection_lost(CloseClassification::Reidentify, None, actions);
        }
    }

    fn on_heartbeat_tick(&mut self, actions: &mut Vec<Action>) {
        if !self.state.is_heartbeating() {
            return;
        }
        if self.heartbeat.is_awaiting_ack() {
            tracing::warn!(shard = %self.shard, "Heartbeat not acknowledged, connection is a zombie");
            actions.push(Action::CloseTransport(CloseFrame::resume("heartbeat not acknowledged")));
            self.on_connection_lost(CloseClassification::Resume, None, actions);
            return;
        }
        actions.push(Action::Send(GatewayMessage::heartbeat(self.session.sequence)));
        self.heartbeat.sent(Instant::now());
    }

    fn on_connection_lost(
        &mut self,
        classification: CloseClassification,
        close: Option<CloseFrame>,
        actions: &mut Vec<Action>,
    ) {
        if !self.state.has_transport() {
            tracing::debug!(shard = %self.shard, state = %self.state, "Connection loss ignored");
            return;
        }

        let was_connected = self.state == SessionState::Connected;
        self.transition(SessionState::Disconnecting);
        self.heartbeat.stop();
        actions.push(Action::StopHeartbeat);
        if was_connected {
            actions.push(Action::Emit(GatewayStateChange::disconnected()));
        }

        match classification {
            CloseClassification::Resume => {}
            CloseClassification::Reidentify => {
                tracing::info!(shard = %self.shard, "Stored session discarded");
                self.session.clear();
            }
            CloseClassification::Fatal => {
                let frame = close.unwrap_or_else(|| CloseFrame::new(CloseFrame::NO_STATUS, ""));
                tracing::error!(shard = %self.shard, close = %frame, "Fatal close, not reconnecting");
                self.session.clear();
                self.retry.clear();
                self.transition(SessionState::Terminated);
                actions.push(Action::Terminate(Some(GatewayError::FatalClose(frame))));
                return;
            }
        }

        self.schedule_retry(actions);
    }

    fn schedule_retry(&mut self, actions: &mut Vec<Action>) {
        let attempt = self.retry.attempts();

        // `attempt - 1` retries already happened in this cycle
        if self.options.max_retries().is_some_and(|max| attempt > max) {
            tracing::error!(shard = %self.shard, attempt, "Reconnect attempts exhausted");
            self.retry.clear();
            self.transition(SessionState::Terminated);
            actions.push(Action::Emit(GatewayStateChange::retry_failed(
                attempt,
                Duration::ZERO,
            )));
            actions.push(Action::Terminate(Some(GatewayError::RetriesExhausted {
                attempts: attempt,
            })));
            return;
        }

        let backoff = self.backoff.delay(attempt);
        let change = if attempt > 1 {
            GatewayStateChange::retry_failed(attempt - 1, backoff)
        } else if self.session.resumable().is_some() {
            GatewayStateChange::retry_resume_started(backoff)
        } else {
            GatewayStateChange::retry_started(backoff)
        };

        self.retry.next();
        self.transition(SessionState::RetryWaiting);
        tracing::warn!(
            shard = %self.shard,
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            resumable = self.session.resumable().is_some(),
            "Reconnecting after backoff"
        );
        actions.push(Action::Emit(change));
        actions.push(Action::ScheduleRetry(backoff));
    }

    fn on_shutdown(&mut self, allow_resume: bool, actions: &mut Vec<Action>) {
        if self.state == SessionState::Terminated {
            return;
        }
        tracing::info!(shard = %self.shard, allow_resume, "Shutting down shard");

        self.heartbeat.stop();
        actions.push(Action::StopHeartbeat);
        actions.push(Action::CancelRetry);
        if allow_resume {
            actions.push(Action::CloseTransport(CloseFrame::resume("client shutdown")));
            actions.push(Action::Emit(GatewayStateChange::disconnected_resume()));
        } else {
            self.session.clear();
            actions.push(Action::CloseTransport(CloseFrame::normal()));
            actions.push(Action::Emit(GatewayStateChange::disconnected()));
        }

        self.retry.clear();
        self.transition(SessionState::Terminated);
        actions.push(Action::Terminate(None));
    }
}
