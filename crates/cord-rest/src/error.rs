//! REST error types

use thiserror::Error;

/// Errors returned by the router
#[derive(Debug, Error)]
pub enum RestError {
    // =========================================================================
    // Response Errors
    // =========================================================================
    #[error("{route} returned {status}")]
    Status {
        status: u16,
        route: String,
        body: String,
    },

    #[error("Rate limited on {bucket} after {attempts} attempts")]
    RateLimited { bucket: String, attempts: u32 },

    // =========================================================================
    // Queue Errors
    // =========================================================================
    #[error("Queue for {bucket} is saturated")]
    QueueSaturated { bucket: String },

    #[error("Request was cancelled before it completed")]
    Cancelled,

    // =========================================================================
    // Request Errors
    // =========================================================================
    #[error("Invalid route {template}: {reason}")]
    InvalidRoute { template: String, reason: String },

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: &'static str, reason: String },

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RestError {
    /// HTTP status of a response error
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Check if the server rejected the request with a 4xx
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Check if the server failed with a 5xx
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| (500..600).contains(&s))
    }

    /// Check if rate limit retries ran out
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl From<reqwest::Error> for RestError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// REST result type alias
pub type RestResult<T> = Result<T, RestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        let err = RestError::Status {
            status: 403,
            route: "GET /channels/{channel.id}".into(),
            body: String::new(),
        };
        assert_eq!(err.status(), Some(403));
        assert!(err.is_client_error());
        assert!(!err.is_server_error());

        let err = RestError::Status {
            status: 502,
            route: "GET /gateway".into(),
            body: String::new(),
        };
        assert!(err.is_server_error());
        assert!(!RestError::Cancelled.is_client_error());
    }

    #[test]
    fn test_rate_limited() {
        let err = RestError::RateLimited {
            bucket: "POST /channels/{channel.id}/messages [1]".into(),
            attempts: 6,
        };
        assert!(err.is_rate_limit());
        assert!(err.is_client_error());
        assert_eq!(
            err.to_string(),
            "Rate limited on POST /channels/{channel.id}/messages [1] after 6 attempts"
        );
    }
}
