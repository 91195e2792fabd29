//! Bucket state and rate limit header parsing
//!
//! Reset times are derived from the response itself (`Reset-After`, or
//! `Reset` minus the server `Date`) so client clock drift never matters.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;

pub const LIMIT: &str = "x-ratelimit-limit";
pub const REMAINING: &str = "x-ratelimit-remaining";
pub const RESET: &str = "x-ratelimit-reset";
pub const RESET_AFTER: &str = "x-ratelimit-reset-after";
pub const BUCKET: &str = "x-ratelimit-bucket";
pub const GLOBAL: &str = "x-ratelimit-global";
pub const SCOPE: &str = "x-ratelimit-scope";
pub const RETRY_AFTER: &str = "retry-after";
pub const DATE: &str = "date";

/// Used when a 429 carries no delay at all
const FALLBACK_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Ceiling for any delay a response asks for
pub const MAX_RATE_LIMIT_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Rate limit headers of one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_after: Option<Duration>,
    pub bucket: Option<String>,
    pub global: bool,
    pub scope: Option<String>,
    pub retry_after: Option<Duration>,
}

impl RateLimitHeaders {
    #[must_use]
    pub fn parse(headers: &HeaderMap) -> Self {
        let reset_after = header_secs(headers, RESET_AFTER).or_else(|| reset_from_date(headers));
        Self {
            limit: header_str(headers, LIMIT).and_then(|v| v.parse().ok()),
            remaining: header_str(headers, REMAINING).and_then(|v| v.parse().ok()),
            reset_after,
            bucket: header_str(headers, BUCKET).map(str::to_string),
            global: header_str(headers, GLOBAL).is_some_and(|v| v.eq_ignore_ascii_case("true")),
            scope: header_str(headers, SCOPE).map(str::to_string),
            retry_after: header_secs(headers, RETRY_AFTER),
        }
    }

    /// Whether the response carried any bucket information
    #[must_use]
    pub fn has_bucket_info(&self) -> bool {
        self.limit.is_some() || self.remaining.is_some() || self.reset_after.is_some()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

fn header_secs(headers: &HeaderMap, name: &str) -> Option<Duration> {
    header_str(headers, name)
        .and_then(|v| v.parse::<f64>().ok())
        .and_then(secs_to_duration)
}

fn secs_to_duration(secs: f64) -> Option<Duration> {
    (secs.is_finite() && secs >= 0.0)
        .then(|| Duration::from_secs_f64(secs.min(MAX_RATE_LIMIT_DELAY.as_secs_f64())))
}

/// `now + delay`, with the delay capped at [`MAX_RATE_LIMIT_DELAY`]
pub(crate) fn deadline_after(now: Instant, delay: Duration) -> Instant {
    let delay = delay.min(MAX_RATE_LIMIT_DELAY);
    now.checked_add(delay).unwrap_or(now)
}

/// `Reset` is an epoch timestamp, measured against the server's own clock
fn reset_from_date(headers: &HeaderMap) -> Option<Duration> {
    let reset: f64 = header_str(headers, RESET)?.parse().ok()?;
    let date = DateTime::parse_from_rfc2822(header_str(headers, DATE)?).ok()?;
    let server_now = date.with_timezone(&Utc).timestamp_millis() as f64 / 1000.0;
    secs_to_duration((reset - server_now).max(0.0))
}

/// Body of a 429 response
#[derive(Debug, Clone, Default, Deserialize)]
struct RateLimitBody {
    #[serde(default)]
    retry_after: Option<f64>,
    #[serde(default)]
    global: bool,
}

/// How a 429 must be honored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHit {
    pub retry_after: Duration,
    pub global: bool,
}

impl RateLimitHit {
    /// Combine headers and body of a 429; the body wins when both are present
    #[must_use]
    pub fn from_response(headers: &RateLimitHeaders, body: &[u8]) -> Self {
        let body: RateLimitBody = serde_json::from_slice(body).unwrap_or_default();
        let global = headers.global
            || body.global
            || headers.scope.as_deref() == Some("global");
        let retry_after = body
            .retry_after
            .and_then(secs_to_duration)
            .or(headers.retry_after)
            .or(headers.reset_after)
            .unwrap_or(FALLBACK_RETRY_AFTER);
        Self {
            retry_after,
            global,
        }
    }
}

/// What the last response said about a bucket
///
/// Always replaced as a whole, never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketState {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_at: Option<Instant>,
    /// Server side bucket hash
    pub bucket: Option<String>,
}

impl BucketState {
    /// State described by a response received at `now`
    #[must_use]
    pub fn from_headers(headers: &RateLimitHeaders, now: Instant) -> Self {
        Self {
            limit: headers.limit,
            remaining: headers.remaining,
            reset_at: headers.reset_after.map(|after| deadline_after(now, after)),
            bucket: headers.bucket.clone(),
        }
    }

    /// Bucket closed for `delay` after a 429
    #[must_use]
    pub fn exhausted_for(headers: &RateLimitHeaders, delay: Duration, now: Instant) -> Self {
        Self {
            limit: headers.limit,
            remaining: Some(0),
            reset_at: Some(deadline_after(now, delay)),
            bucket: headers.bucket.clone(),
        }
    }

    #[must_use]
    pub fn is_exhausted(&self, now: Instant) -> bool {
        self.wait_time(now).is_some()
    }

    /// How long the next request has to wait, if at all
    #[must_use]
    pub fn wait_time(&self, now: Instant) -> Option<Duration> {
        match (self.remaining, self.reset_at) {
            (Some(0), Some(reset_at)) if reset_at > now => Some(reset_at - now),
            _ => None,
        }
    }
}
