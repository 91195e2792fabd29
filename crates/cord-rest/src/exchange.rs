//! HTTP boundary
//!
//! The router only needs `(method, path, headers, body) -> (status, headers,
//! body)`. [`ReqwestExchange`] is the production implementation.

use crate::error::{RestError, RestResult};
use crate::route::Method;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use std::time::Duration;

/// Header carrying the audit log reason
pub const AUDIT_LOG_REASON: &str = "x-audit-log-reason";

/// A compiled request, relative to the API base URL
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    /// JSON body
    pub body: Option<String>,
}

impl HttpRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs one HTTP exchange
///
/// Implementations must not retry on their own; rate limit handling lives
/// in the bucket queues.
#[async_trait]
pub trait HttpExchange: Send + Sync + 'static {
    async fn execute(&self, request: HttpRequest) -> RestResult<HttpResponse>;
}

/// Exchange over a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestExchange {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestExchange {
    /// Client sending `Authorization: Bot <token>` on every request
    pub fn new(base_url: impl Into<String>, token: &str, timeout: Duration) -> RestResult<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bot {token}")).map_err(|e| {
            RestError::InvalidHeader {
                name: "authorization",
                reason: e.to_string(),
            }
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!(
                "DiscordBot (",
                env!("CARGO_PKG_NAME"),
                ", ",
                env!("CARGO_PKG_VERSION"),
                ")"
            )),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Use a preconfigured client; it must already carry authorization
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl HttpExchange for ReqwestExchange {
    async fn execute(&self, request: HttpRequest) -> RestResult<HttpResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self
            .client
            .request(request.method.into(), url)
            .headers(request.headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
