//! Rate limit buckets

mod key;
mod queue;
mod state;

pub use key::{BucketKey, MAJOR_PARAMETERS};
pub use queue::BucketQueue;
pub(crate) use queue::{QueuedRequest, WorkerContext};
pub(crate) use state::deadline_after;
pub use state::{BucketState, RateLimitHeaders, RateLimitHit, MAX_RATE_LIMIT_DELAY};
