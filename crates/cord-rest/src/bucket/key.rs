//! Bucket key resolution

use crate::route::Route;
use std::fmt;

/// Placeholders that scope a rate limit bucket, in priority order
pub const MAJOR_PARAMETERS: [&str; 3] = ["channel.id", "guild.id", "webhook.id"];

/// Identifies one rate limit bucket
///
/// Two requests share a bucket when they use the same method and template
/// and agree on the major parameter. Other parameters never split a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    route: String,
    major: Option<String>,
}

impl BucketKey {
    /// Resolve the bucket for `route` filled with `params`
    #[must_use]
    pub fn resolve<S: AsRef<str>>(route: &Route, params: &[S]) -> Self {
        let major = route
            .placeholders()
            .iter()
            .position(|name| MAJOR_PARAMETERS.contains(name))
            .and_then(|index| params.get(index))
            .map(|value| value.as_ref().to_string());
        Self {
            route: route.to_string(),
            major,
        }
    }

    /// `METHOD template`
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    #[must_use]
    pub fn major(&self) -> Option<&str> {
        self.major.as_deref()
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.major {
            Some(major) => write!(f, "{} [{major}]", self.route),
            None => f.write_str(&self.route),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::catalog;

    #[test]
    fn test_major_parameter_splits_buckets() {
        let a = BucketKey::resolve(&catalog::CREATE_MESSAGE, &["111"]);
        let b = BucketKey::resolve(&catalog::CREATE_MESSAGE, &["222"]);
        assert_ne!(a, b);
        assert_eq!(a.major(), Some("111"));
    }

    #[test]
    fn test_no_major_parameter_shares_bucket() {
        let a = BucketKey::resolve(&catalog::GET_INVITE, &["AAAAAA"]);
        let b = BucketKey::resolve(&catalog::GET_INVITE, &["BBBBBB"]);
        assert_eq!(a, b);
        assert_eq!(a.major(), None);
    }

    #[test]
    fn test_minor_parameter_shares_bucket() {
        let a = BucketKey::resolve(&catalog::DELETE_MESSAGE, &["1", "10"]);
        let b = BucketKey::resolve(&catalog::DELETE_MESSAGE, &["1", "20"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_method_splits_buckets() {
        let get = BucketKey::resolve(&Route::get("/x/{id}"), &["1"]);
        let delete = BucketKey::resolve(&Route::delete("/x/{id}"), &["1"]);
        assert_ne!(get, delete);
    }

    #[test]
    fn test_first_major_parameter_wins() {
        let key = BucketKey::resolve(&catalog::GET_GUILD_MEMBER, &["42", "7"]);
        assert_eq!(key.major(), Some("42"));

        let key = BucketKey::resolve(&catalog::EXECUTE_WEBHOOK, &["9", "secret"]);
        assert_eq!(key.major(), Some("9"));
    }

    #[test]
    fn test_display() {
        let key = BucketKey::resolve(&catalog::CREATE_MESSAGE, &["5"]);
        assert_eq!(key.to_string(), "POST /channels/{channel.id}/messages [5]");
        let key = BucketKey::resolve(&catalog::GET_GATEWAY_BOT, &[] as &[&str]);
        assert_eq!(key.to_string(), "GET /gateway/bot");
    }
}
