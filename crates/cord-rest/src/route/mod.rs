//! Route templates
//!
//! A [`Route`] pairs an HTTP method with a path template such as
//! `/channels/{channel.id}/messages`. Placeholders are filled in declaration
//! order when the route is compiled.

pub mod catalog;

use crate::error::{RestError, RestResult};
use std::fmt::{self, Write as _};

/// HTTP methods used by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Patch => Self::PATCH,
            Method::Delete => Self::DELETE,
        }
    }
}

/// Method plus path template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Route {
    method: Method,
    template: &'static str,
}

impl Route {
    #[must_use]
    pub const fn new(method: Method, template: &'static str) -> Self {
        Self { method, template }
    }

    #[must_use]
    pub const fn get(template: &'static str) -> Self {
        Self::new(Method::Get, template)
    }

    #[must_use]
    pub const fn post(template: &'static str) -> Self {
        Self::new(Method::Post, template)
    }

    #[must_use]
    pub const fn put(template: &'static str) -> Self {
        Self::new(Method::Put, template)
    }

    #[must_use]
    pub const fn patch(template: &'static str) -> Self {
        Self::new(Method::Patch, template)
    }

    #[must_use]
    pub const fn delete(template: &'static str) -> Self {
        Self::new(Method::Delete, template)
    }

    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub const fn template(&self) -> &'static str {
        self.template
    }

    /// Placeholder names in declaration order
    #[must_use]
    pub fn placeholders(&self) -> Vec<&'static str> {
        placeholders(self.template)
    }

    /// Fill the placeholders with percent-encoded parameters
    pub fn compile<S: AsRef<str>>(&self, params: &[S]) -> RestResult<String> {
        let expected = self.placeholders().len();
        if params.len() != expected {
            return Err(RestError::InvalidRoute {
                template: self.to_string(),
                reason: format!("expected {expected} parameters, got {}", params.len()),
            });
        }

        let mut path = String::with_capacity(self.template.len() + 16);
        let mut params = params.iter();
        let mut rest = self.template;
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}') else {
                break;
            };
            path.push_str(&rest[..open]);
            if let Some(param) = params.next() {
                encode_segment(param.as_ref(), &mut path);
            }
            rest = &rest[open + close + 1..];
        }
        path.push_str(rest);
        Ok(path)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template)
    }
}

fn placeholders(template: &'static str) -> Vec<&'static str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let tail = &rest[open + 1..];
        let Some(close) = tail.find('}') else {
            break;
        };
        names.push(&tail[..close]);
        rest = &tail[close + 1..];
    }
    names
}

/// Percent-encode `value` as a single path segment
fn encode_segment(value: &str, out: &mut String) {
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(char::from(byte));
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_in_order() {
        let route = Route::delete("/channels/{channel.id}/messages/{message.id}");
        assert_eq!(route.placeholders(), vec!["channel.id", "message.id"]);
        assert!(Route::get("/gateway/bot").placeholders().is_empty());
    }

    #[test]
    fn test_compile() {
        let route = Route::get("/channels/{channel.id}/messages/{message.id}");
        assert_eq!(
            route.compile(&["123", "456"]).unwrap(),
            "/channels/123/messages/456"
        );
    }

    #[test]
    fn test_compile_encodes_segments() {
        let route = Route::put("/channels/{channel.id}/messages/{message.id}/reactions/{emoji}/@me");
        assert_eq!(
            route.compile(&["1", "2", "thumbs up/👍"]).unwrap(),
            "/channels/1/messages/2/reactions/thumbs%20up%2F%F0%9F%91%8D/@me"
        );
    }

    #[test]
    fn test_compile_rejects_wrong_count() {
        let route = Route::get("/channels/{channel.id}");
        let err = route.compile::<&str>(&[]).unwrap_err();
        assert!(matches!(err, RestError::InvalidRoute { .. }));
        assert!(route.compile(&["1", "2"]).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Route::post("/channels/{channel.id}/messages").to_string(),
            "POST /channels/{channel.id}/messages"
        );
        assert_eq!(reqwest::Method::from(Method::Patch), reqwest::Method::PATCH);
    }
}
