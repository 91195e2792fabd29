//! Mock servers for integration tests
//!
//! Both servers bind `127.0.0.1:0` and run on a background task that lives
//! as long as the server value.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use cord_gateway::protocol::{GatewayMessage, OpCode};
use cord_gateway::{GatewayEvent, GatewayStateChange};
use parking_lot::Mutex;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Session id handed out by the mock gateway
pub const MOCK_SESSION_ID: &str = "mock-session";

/// Default wait for an expected event
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

async fn bind() -> Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    Ok((listener, addr))
}

// ============================================================================
// REST
// ============================================================================

/// A response the mock REST server will return
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    headers: Vec<(&'static str, String)>,
    body: String,
}

impl MockResponse {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn ok_json(body: serde_json::Value) -> Self {
        Self::status(200).body(body.to_string())
    }

    /// Per-route 429 with the delay in both header and body
    pub fn rate_limited(retry_after: f64) -> Self {
        Self::status(429)
            .header("x-ratelimit-remaining", "0")
            .header("x-ratelimit-reset-after", &retry_after.to_string())
            .header("x-ratelimit-scope", "user")
            .body(
                json!({
                    "message": "You are being rate limited.",
                    "retry_after": retry_after,
                    "global": false
                })
                .to_string(),
            )
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// A request as received by the mock REST server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: String,
    pub received_at: Instant,
}

#[derive(Default)]
struct RestState {
    scripts: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Answers each path from its script, then with `200 {}`
pub struct MockRestServer {
    pub addr: SocketAddr,
    state: Arc<RestState>,
    _handle: JoinHandle<()>,
}

impl MockRestServer {
    pub async fn start() -> Result<Self> {
        let (listener, addr) = bind().await?;
        let state = Arc::new(RestState::default());
        let app = Router::new()
            .fallback(handle_rest)
            .with_state(Arc::clone(&state));

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue `response` for the next request to `path`
    pub fn script(&self, path: &str, response: MockResponse) {
        self.state
            .scripts
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

async fn handle_rest(
    State(state): State<Arc<RestState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri.path().to_string();
    state.requests.lock().push(RecordedRequest {
        method,
        path: path.clone(),
        query: uri.query().map(str::to_string),
        headers,
        body,
        received_at: Instant::now(),
    });

    let scripted = state
        .scripts
        .lock()
        .get_mut(&path)
        .and_then(VecDeque::pop_front)
        .unwrap_or_else(|| MockResponse::ok_json(json!({})));

    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    for (name, value) in scripted.headers {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
    let status = StatusCode::from_u16(scripted.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, headers, scripted.body).into_response()
}

// ============================================================================
// Gateway
// ============================================================================

struct GatewayState {
    heartbeat_interval_ms: u64,
    resume_url: String,
    sequence: AtomicU64,
    received: Mutex<Vec<GatewayMessage>>,
    connections: Mutex<Vec<String>>,
    close: broadcast::Sender<u16>,
}

/// Minimal gateway: HELLO on connect, READY for IDENTIFY, RESUMED for
/// RESUME and an ACK for every heartbeat
pub struct MockGateway {
    pub addr: SocketAddr,
    state: Arc<GatewayState>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    pub async fn start(heartbeat_interval: Duration) -> Result<Self> {
        let (listener, addr) = bind().await?;
        let (close, _) = broadcast::channel(4);
        let state = Arc::new(GatewayState {
            heartbeat_interval_ms: heartbeat_interval.as_millis() as u64,
            resume_url: format!("ws://{addr}/resume"),
            sequence: AtomicU64::new(0),
            received: Mutex::new(Vec::new()),
            connections: Mutex::new(Vec::new()),
            close,
        });
        let app = Router::new()
            .fallback(handle_upgrade)
            .with_state(Arc::clone(&state));

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// Gateway URL with the usual query string
    pub fn url(&self) -> String {
        format!("ws://{}/?v=10&encoding=json", self.addr)
    }

    /// Close every open connection with `code`
    pub fn close_all(&self, code: u16) {
        let _ = self.state.close.send(code);
    }

    pub fn received_ops(&self) -> Vec<OpCode> {
        self.state.received.lock().iter().map(|m| m.op).collect()
    }

    pub fn count_op(&self, op: OpCode) -> usize {
        self.received_ops().into_iter().filter(|o| *o == op).count()
    }

    pub fn received(&self) -> Vec<GatewayMessage> {
        self.state.received.lock().clone()
    }

    /// Request paths of every accepted connection
    pub fn connection_paths(&self) -> Vec<String> {
        self.state.connections.lock().clone()
    }
}

async fn handle_upgrade(
    State(state): State<Arc<GatewayState>>,
    uri: Uri,
    ws: WebSocketUpgrade,
) -> Response {
    state.connections.lock().push(uri.path().to_string());
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn send_message(socket: &mut WebSocket, message: &GatewayMessage) -> Result<()> {
    socket.send(Message::Text(message.to_json()?)).await?;
    Ok(())
}

async fn serve_socket(mut socket: WebSocket, state: Arc<GatewayState>) {
    let mut close = state.close.subscribe();
    if send_message(&mut socket, &GatewayMessage::hello(state.heartbeat_interval_ms))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            code = close.recv() => {
                if let Ok(code) = code {
                    let frame = CloseFrame { code, reason: "mock close".into() };
                    let _ = socket.send(Message::Close(Some(frame))).await;
                }
                return;
            }
            frame = socket.recv() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_)) | Err(_)) | None => return,
                    Some(Ok(_)) => continue,
                };
                let Ok(message) = GatewayMessage::from_json(&text) else {
                    continue;
                };
                let reply = reply_to(&state, &message);
                state.received.lock().push(message);
                if let Some(reply) = reply {
                    if send_message(&mut socket, &reply).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

fn reply_to(state: &GatewayState, message: &GatewayMessage) -> Option<GatewayMessage> {
    match message.op {
        OpCode::Identify => {
            let seq = state.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            Some(GatewayMessage::dispatch(
                "READY",
                seq,
                json!({
                    "v": 10,
                    "session_id": MOCK_SESSION_ID,
                    "resume_gateway_url": state.resume_url,
                }),
            ))
        }
        OpCode::Resume => {
            let seq = state.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            Some(GatewayMessage::dispatch("RESUMED", seq, json!({})))
        }
        OpCode::Heartbeat => Some(GatewayMessage::heartbeat_ack()),
        _ => None,
    }
}

/// Wait for the next event matching `predicate`
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<GatewayEvent>,
    mut predicate: F,
) -> Result<GatewayEvent>
where
    F: FnMut(&GatewayEvent) -> bool,
{
    tokio::time::timeout(EVENT_TIMEOUT, async {
        loop {
            let event = events.recv().await?;
            if predicate(&event) {
                return Ok::<_, anyhow::Error>(event);
            }
        }
    })
    .await?
}

/// Wait for a specific state change
pub async fn wait_for_state(
    events: &mut broadcast::Receiver<GatewayEvent>,
    expected: fn(&GatewayStateChange) -> bool,
) -> Result<GatewayStateChange> {
    let event = wait_for_event(events, |event| {
        event.as_state_change().is_some_and(|change| expected(&change))
    })
    .await?;
    event
        .as_state_change()
        .ok_or_else(|| anyhow::anyhow!("expected a state change"))
}
