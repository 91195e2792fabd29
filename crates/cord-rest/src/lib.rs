//! # cord-rest
//!
//! Discord REST client that absorbs rate limits: requests are serialized per
//! bucket, 429s are retried after the advertised delay and a global limiter
//! gates every exchange.

pub mod bucket;
pub mod error;
pub mod exchange;
pub mod global;
pub mod request;
pub mod route;
pub mod router;
pub mod transform;

#[cfg(test)]
mod testing;

pub use bucket::{BucketKey, BucketState};
pub use error::{RestError, RestResult};
pub use exchange::{HttpExchange, HttpRequest, HttpResponse, ReqwestExchange};
pub use global::GlobalRateLimiter;
pub use request::{DiscordRequest, RestResponse};
pub use route::{catalog, Method, Route};
pub use router::{Router, RouterOptions};
pub use transform::{EmptyIfNotFound, EmptyOnErrorStatus, ResponseTransformer, RouteMatcher};
