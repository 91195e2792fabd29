//! Request builder and response type

use crate::bucket::BucketKey;
use crate::error::{RestError, RestResult};
use crate::exchange::{HttpRequest, HttpResponse, AUDIT_LOG_REASON};
use crate::route::Route;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A request against one [`Route`]
#[derive(Debug, Clone)]
pub struct DiscordRequest {
    route: Route,
    params: Vec<String>,
    query: Vec<(String, String)>,
    body: Option<String>,
    reason: Option<String>,
}

impl DiscordRequest {
    #[must_use]
    pub fn new(route: Route) -> Self {
        Self {
            route,
            params: Vec::new(),
            query: Vec::new(),
            body: None,
            reason: None,
        }
    }

    /// Append the next path parameter
    #[must_use]
    pub fn param(mut self, value: impl ToString) -> Self {
        self.params.push(value.to_string());
        self
    }

    #[must_use]
    pub fn params<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.params.extend(values.into_iter().map(|v| v.to_string()));
        self
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Serialize `body` as the JSON payload
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> RestResult<Self> {
        self.body = Some(serde_json::to_string(body)?);
        Ok(self)
    }

    /// Audit log reason for moderation endpoints
    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn route(&self) -> Route {
        self.route
    }

    #[must_use]
    pub fn bucket_key(&self) -> BucketKey {
        BucketKey::resolve(&self.route, &self.params)
    }

    /// Compile into an exchange request, rejecting a parameter count mismatch
    pub fn into_http(self) -> RestResult<HttpRequest> {
        let path = self.route.compile(&self.params)?;
        let mut headers = HeaderMap::new();
        if let Some(reason) = self.reason {
            let value = HeaderValue::from_str(&encode_reason(&reason)).map_err(|e| {
                RestError::InvalidHeader {
                    name: AUDIT_LOG_REASON,
                    reason: e.to_string(),
                }
            })?;
            headers.insert(AUDIT_LOG_REASON, value);
        }
        Ok(HttpRequest {
            method: self.route.method(),
            path,
            query: self.query,
            headers,
            body: self.body,
        })
    }
}

/// The reason header is URL-encoded so non-ASCII text survives
fn encode_reason(reason: &str) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(reason.len());
    for byte in reason.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~ ".contains(&byte) {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

/// Response handed back to callers
///
/// `body` is `None` when a transformer replaced the response with an empty
/// result.
#[derive(Debug, Clone)]
pub struct RestResponse {
    status: u16,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl RestResponse {
    /// Empty result standing in for a response with `status`
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Replaced by a transformer
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_none()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.body()).into_owned()
    }

    /// Decode the JSON body, `None` for empty and 204 responses
    pub fn json<T: DeserializeOwned>(&self) -> RestResult<Option<T>> {
        match self.body.as_deref() {
            None | Some([]) => Ok(None),
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
        }
    }
}

impl From<HttpResponse> for RestResponse {
    fn from(response: HttpResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: Some(response.body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::catalog;
    use serde_json::json;

    #[test]
    fn test_into_http() {
        let request = DiscordRequest::new(catalog::CREATE_MESSAGE)
            .param(123)
            .json(&json!({"content": "hi"}))
            .unwrap()
            .reason("cleanup: spam")
            .into_http()
            .unwrap();
        assert_eq!(request.path, "/channels/123/messages");
        assert_eq!(request.body.as_deref(), Some(r#"{"content":"hi"}"#));
        assert_eq!(
            request.headers.get(AUDIT_LOG_REASON).unwrap(),
            "cleanup%3A spam"
        );
    }

    #[test]
    fn test_query_and_bucket() {
        let request = DiscordRequest::new(catalog::GET_MESSAGES)
            .param("9")
            .query("limit", 50);
        assert_eq!(request.bucket_key().major(), Some("9"));
        let http = request.into_http().unwrap();
        assert_eq!(http.query, vec![("limit".to_string(), "50".to_string())]);
    }

    #[test]
    fn test_missing_param_rejected() {
        let result = DiscordRequest::new(catalog::GET_MESSAGE).param("1").into_http();
        assert!(matches!(result, Err(RestError::InvalidRoute { .. })));
    }

    #[test]
    fn test_json_body() {
        let mut http = HttpResponse::new(200);
        http.body = br#"{"id": "1"}"#.to_vec();
        let response = RestResponse::from(http);
        let value: serde_json::Value = response.json().unwrap().unwrap();
        assert_eq!(value["id"], "1");

        assert!(RestResponse::empty(404).json::<serde_json::Value>().unwrap().is_none());
        assert!(RestResponse::from(HttpResponse::new(204))
            .json::<serde_json::Value>()
            .unwrap()
            .is_none());
    }
}
