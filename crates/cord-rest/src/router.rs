//! REST router
//!
//! Resolves the bucket of each request, hands it to that bucket's queue and
//! post-processes the response. Queues are created lazily on first use.

use crate::bucket::{BucketKey, BucketQueue, BucketState, QueuedRequest, WorkerContext};
use crate::error::{RestError, RestResult};
use crate::exchange::{HttpExchange, ReqwestExchange};
use crate::global::GlobalRateLimiter;
use crate::request::{DiscordRequest, RestResponse};
use crate::transform::ResponseTransformer;
use cord_common::{RestConfig, SaturationPolicy};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::num::NonZeroU32;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Smallest period between eviction sweeps
const MIN_EVICTION_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Requests allowed per `global_refill`
    pub global_permits: NonZeroU32,
    pub global_refill: Duration,
    /// Requests in flight across all buckets
    pub parallelism: usize,
    /// Requests queued per bucket before the saturation policy applies
    pub bucket_capacity: usize,
    pub saturation_policy: SaturationPolicy,
    pub max_rate_limit_retries: u32,
    /// Drop queues idle for this long; `None` keeps them forever
    pub bucket_idle_eviction: Option<Duration>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self::from(&RestConfig::default())
    }
}

impl RouterOptions {
    #[must_use]
    pub fn global_limit(mut self, permits: NonZeroU32, refill: Duration) -> Self {
        self.global_permits = permits;
        self.global_refill = refill;
        self
    }

    #[must_use]
    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    #[must_use]
    pub fn bucket_capacity(mut self, capacity: usize) -> Self {
        self.bucket_capacity = capacity;
        self
    }

    #[must_use]
    pub fn saturation_policy(mut self, policy: SaturationPolicy) -> Self {
        self.saturation_policy = policy;
        self
    }

    #[must_use]
    pub fn max_rate_limit_retries(mut self, retries: u32) -> Self {
        self.max_rate_limit_retries = retries;
        self
    }

    #[must_use]
    pub fn bucket_idle_eviction(mut self, idle: Option<Duration>) -> Self {
        self.bucket_idle_eviction = idle;
        self
    }
}

impl From<&RestConfig> for RouterOptions {
    fn from(config: &RestConfig) -> Self {
        Self {
            global_permits: NonZeroU32::new(config.global_permits).unwrap_or(NonZeroU32::MIN),
            global_refill: Duration::from_millis(config.global_refill_ms),
            parallelism: config.parallelism,
            bucket_capacity: config.bucket_capacity,
            saturation_policy: config.saturation_policy,
            max_rate_limit_retries: config.max_rate_limit_retries,
            bucket_idle_eviction: config.bucket_idle_eviction_secs.map(Duration::from_secs),
        }
    }
}

struct RouterInner {
    context: WorkerContext,
    options: RouterOptions,
    buckets: DashMap<BucketKey, BucketQueue>,
    transformers: RwLock<Vec<Arc<dyn ResponseTransformer>>>,
}

/// Rate limit aware REST client
///
/// Cheap to clone; clones share buckets and the global limiter.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    #[must_use]
    pub fn new(exchange: Arc<dyn HttpExchange>, options: RouterOptions) -> Self {
        let global = GlobalRateLimiter::new(
            options.global_permits,
            options.global_refill,
            options.parallelism,
        );
        let context = WorkerContext {
            exchange,
            global: Arc::new(global),
            max_rate_limit_retries: options.max_rate_limit_retries,
        };
        Self {
            inner: Arc::new(RouterInner {
                context,
                options,
                buckets: DashMap::new(),
                transformers: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Router talking to `config.base_url` over reqwest
    pub fn from_config(config: &RestConfig, token: &str) -> RestResult<Self> {
        let exchange = ReqwestExchange::new(
            config.base_url.as_str(),
            token,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self::new(Arc::new(exchange), RouterOptions::from(config)))
    }

    #[must_use]
    pub fn with_transformer(self, transformer: impl ResponseTransformer) -> Self {
        self.add_transformer(transformer);
        self
    }

    /// Transformers run in the order they were added
    pub fn add_transformer(&self, transformer: impl ResponseTransformer) {
        self.inner.transformers.write().push(Arc::new(transformer));
    }

    #[must_use]
    pub fn options(&self) -> &RouterOptions {
        &self.inner.options
    }

    #[must_use]
    pub fn global(&self) -> &GlobalRateLimiter {
        &self.inner.context.global
    }

    /// Last known state of `key`, `None` if it has no queue
    #[must_use]
    pub fn bucket_state(&self, key: &BucketKey) -> Option<BucketState> {
        self.inner.buckets.get(key).map(|queue| queue.state())
    }

    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.inner.buckets.len()
    }

    /// Execute `request`, absorbing rate limits
    ///
    /// Non-success responses that no transformer emptied are returned as
    /// [`RestError::Status`]. Dropping the future before the request reaches
    /// the front of its queue withdraws it.
    #[instrument(skip(self, request), fields(route = %request.route(), request_id = tracing::field::Empty))]
    pub async fn execute(&self, request: DiscordRequest) -> RestResult<RestResponse> {
        let route = request.route();
        let key = request.bucket_key();
        let http = request.into_http()?;
        let request_id = Uuid::new_v4();
        tracing::Span::current().record("request_id", tracing::field::display(request_id));

        let (reply, response) = oneshot::channel();
        let (queue, queued) = {
            // The entry guard keeps eviction out until the request is counted
            let queue = self.inner.buckets.entry(key.clone()).or_insert_with(|| {
                tracing::debug!(bucket = %key, "Creating bucket queue");
                BucketQueue::spawn(
                    key.clone(),
                    self.inner.options.bucket_capacity,
                    self.inner.context.clone(),
                )
            });
            let active = queue.track();
            (
                queue.value().clone(),
                QueuedRequest {
                    request: http,
                    request_id,
                    reply,
                    _active: active,
                },
            )
        };
        queue
            .submit(queued, self.inner.options.saturation_policy)
            .await?;

        let response = response.await.map_err(|_| RestError::Cancelled)??;
        let mut response = RestResponse::from(response);
        let transformers = self.inner.transformers.read().clone();
        for transformer in &transformers {
            response = transformer.transform(&route, response);
        }

        if !response.is_success() && !response.is_empty() {
            tracing::debug!(status = response.status(), "Request failed");
            return Err(RestError::Status {
                status: response.status(),
                route: route.to_string(),
                body: response.text(),
            });
        }
        Ok(response)
    }

    /// Drop queues with nothing pending that sat unused for the idle period
    ///
    /// Returns how many were removed. Does nothing without an idle period.
    pub fn evict_idle(&self) -> usize {
        let Some(idle) = self.inner.options.bucket_idle_eviction else {
            return 0;
        };
        let now = Instant::now();
        let before = self.inner.buckets.len();
        self.inner.buckets.retain(|key, queue| {
            let keep = queue.active() > 0 || queue.idle_for(now) < idle;
            if !keep {
                tracing::debug!(bucket = %key, "Evicting idle bucket");
            }
            keep
        });
        before.saturating_sub(self.inner.buckets.len())
    }

    /// Periodically run [`Router::evict_idle`] until the router is dropped
    ///
    /// `None` when no idle period is configured.
    pub fn spawn_eviction_task(&self) -> Option<JoinHandle<()>> {
        let idle = self.inner.options.bucket_idle_eviction?;
        let inner: Weak<RouterInner> = Arc::downgrade(&self.inner);
        let period = idle.max(MIN_EVICTION_PERIOD);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let evicted = Router { inner }.evict_idle();
                if evicted > 0 {
                    tracing::info!(evicted, "Evicted idle bucket queues");
                }
            }
        }))
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("buckets", &self.bucket_count())
            .field("global", self.global())
            .field("options", self.options())
            .finish_non_exhaustive()
    }
}
