//! Per-bucket request queue
//!
//! Every bucket gets a worker task draining a bounded channel, which keeps
//! one exchange in flight per bucket and serves requests in submission order.

use super::{BucketKey, BucketState, RateLimitHeaders, RateLimitHit};
use crate::error::{RestError, RestResult};
use crate::exchange::{HttpExchange, HttpRequest, HttpResponse};
use crate::global::GlobalRateLimiter;
use cord_common::SaturationPolicy;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, Instant};
use uuid::Uuid;

/// Counts a request against its queue until dropped
#[derive(Debug)]
pub(crate) struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub(crate) struct QueuedRequest {
    pub request: HttpRequest,
    pub request_id: Uuid,
    pub reply: oneshot::Sender<RestResult<HttpResponse>>,
    pub _active: ActiveGuard,
}

/// Shared by the queue handle and its worker
#[derive(Debug)]
struct Shared {
    key: BucketKey,
    state: Mutex<BucketState>,
    active: Arc<AtomicUsize>,
    last_used: Mutex<Instant>,
}

/// Settings every bucket worker shares
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub exchange: Arc<dyn HttpExchange>,
    pub global: Arc<GlobalRateLimiter>,
    pub max_rate_limit_retries: u32,
}

/// Handle to one bucket's queue
#[derive(Debug, Clone)]
pub struct BucketQueue {
    sender: mpsc::Sender<QueuedRequest>,
    shared: Arc<Shared>,
}

impl BucketQueue {
    /// Spawn the worker for `key`; must run inside a tokio runtime
    pub(crate) fn spawn(key: BucketKey, capacity: usize, context: WorkerContext) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let shared = Arc::new(Shared {
            key,
            state: Mutex::new(BucketState::default()),
            active: Arc::new(AtomicUsize::new(0)),
            last_used: Mutex::new(Instant::now()),
        });
        let worker = Worker {
            shared: Arc::clone(&shared),
            context,
        };
        tokio::spawn(worker.run(receiver));
        Self { sender, shared }
    }

    #[must_use]
    pub fn key(&self) -> &BucketKey {
        &self.shared.key
    }

    /// Copy of the last known state
    #[must_use]
    pub fn state(&self) -> BucketState {
        self.shared.state.lock().clone()
    }

    /// Requests queued or in flight
    #[must_use]
    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Time since the last exchange finished
    #[must_use]
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.shared.last_used.lock())
    }

    /// Register a request that is about to be submitted
    pub(crate) fn track(&self) -> ActiveGuard {
        self.shared.active.fetch_add(1, Ordering::AcqRel);
        ActiveGuard(Arc::clone(&self.shared.active))
    }

    pub(crate) async fn submit(
        &self,
        request: QueuedRequest,
        policy: SaturationPolicy,
    ) -> RestResult<()> {
        match policy {
            SaturationPolicy::Block => self
                .sender
                .send(request)
                .await
                .map_err(|_| RestError::Cancelled),
            SaturationPolicy::Reject => self.sender.try_send(request).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    tracing::warn!(bucket = %self.shared.key, "Bucket queue saturated, request rejected");
                    RestError::QueueSaturated {
                        bucket: self.shared.key.to_string(),
                    }
                }
                mpsc::error::TrySendError::Closed(_) => RestError::Cancelled,
            }),
        }
    }
}

struct Worker {
    shared: Arc<Shared>,
    context: WorkerContext,
}

impl Worker {
    async fn run(self, mut receiver: mpsc::Receiver<QueuedRequest>) {
        while let Some(queued) = receiver.recv().await {
            if queued.reply.is_closed() {
                tracing::debug!(
                    bucket = %self.shared.key,
                    request_id = %queued.request_id,
                    "Request cancelled before it started"
                );
                continue;
            }
            let Some(result) = self.execute(&queued).await else {
                continue;
            };
            *self.shared.last_used.lock() = Instant::now();
            let _ = queued.reply.send(result);
        }
        tracing::debug!(bucket = %self.shared.key, "Bucket worker stopped");
    }

    /// `None` when the caller went away before the first exchange started
    async fn execute(&self, queued: &QueuedRequest) -> Option<RestResult<HttpResponse>> {
        let key = &self.shared.key;
        let mut retries = 0u32;
        loop {
            let wait = self.shared.state.lock().wait_time(Instant::now());
            if let Some(wait) = wait {
                tracing::debug!(
                    bucket = %key,
                    request_id = %queued.request_id,
                    wait_ms = wait.as_millis() as u64,
                    "Bucket exhausted, waiting for reset"
                );
                sleep(wait).await;
            }
            if retries == 0 && queued.reply.is_closed() {
                return None;
            }

            tracing::debug!(bucket = %key, request_id = %queued.request_id, "Sending request");
            let exchange = self.context.exchange.execute(queued.request.clone());
            let response = match self.context.global.with_limiter(exchange).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(bucket = %key, request_id = %queued.request_id, error = %err, "Exchange failed");
                    return Some(Err(err));
                }
            };

            let now = Instant::now();
            let headers = RateLimitHeaders::parse(&response.headers);
            if response.status != 429 {
                *self.shared.state.lock() = BucketState::from_headers(&headers, now);
                tracing::debug!(
                    bucket = %key,
                    request_id = %queued.request_id,
                    status = response.status,
                    remaining = ?headers.remaining,
                    "Request completed"
                );
                return Some(Ok(response));
            }

            let hit = RateLimitHit::from_response(&headers, &response.body);
            if hit.global {
                self.context.global.rate_limit_for(hit.retry_after);
            } else {
                *self.shared.state.lock() =
                    BucketState::exhausted_for(&headers, hit.retry_after, now);
            }
            tracing::warn!(
                bucket = %key,
                request_id = %queued.request_id,
                global = hit.global,
                retry_after_ms = hit.retry_after.as_millis() as u64,
                retries,
                "Rate limited"
            );

            if retries >= self.context.max_rate_limit_retries {
                return Some(Err(RestError::RateLimited {
                    bucket: key.to_string(),
                    attempts: retries + 1,
                }));
            }
            retries += 1;
        }
    }
}
