//! Reconnect policy
//!
//! Backoff computation, the per-shard retry context and the options that
//! configure both.

mod backoff;
mod context;
mod options;

pub use backoff::{base_delay, Backoff};
pub use context::RetryContext;
pub use options::{RetryOptions, RetryOptionsBuilder, MIN_FIRST_BACKOFF};
