//! Response transformers
//!
//! Transformers rewrite a response after its bucket has been updated, so
//! they never influence rate limit bookkeeping.

use crate::request::RestResponse;
use crate::route::Route;

/// Post-processing step applied to every response the router returns
pub trait ResponseTransformer: Send + Sync + 'static {
    fn transform(&self, route: &Route, response: RestResponse) -> RestResponse;
}

/// Which routes a transformer applies to
#[derive(Debug, Clone, Default)]
pub enum RouteMatcher {
    #[default]
    Any,
    Routes(Vec<Route>),
}

impl RouteMatcher {
    #[must_use]
    pub fn routes(routes: impl IntoIterator<Item = Route>) -> Self {
        Self::Routes(routes.into_iter().collect())
    }

    #[must_use]
    pub fn matches(&self, route: &Route) -> bool {
        match self {
            Self::Any => true,
            Self::Routes(routes) => routes.contains(route),
        }
    }
}

/// Turn a 404 into an empty result
#[derive(Debug, Clone, Default)]
pub struct EmptyIfNotFound {
    matcher: RouteMatcher,
}

impl EmptyIfNotFound {
    #[must_use]
    pub fn new(matcher: RouteMatcher) -> Self {
        Self { matcher }
    }
}

impl ResponseTransformer for EmptyIfNotFound {
    fn transform(&self, route: &Route, response: RestResponse) -> RestResponse {
        if response.status() == 404 && self.matcher.matches(route) {
            RestResponse::empty(404)
        } else {
            response
        }
    }
}

/// Turn any of the listed statuses into an empty result
#[derive(Debug, Clone)]
pub struct EmptyOnErrorStatus {
    statuses: Vec<u16>,
    matcher: RouteMatcher,
}

impl EmptyOnErrorStatus {
    #[must_use]
    pub fn new(statuses: impl IntoIterator<Item = u16>, matcher: RouteMatcher) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
            matcher,
        }
    }
}

impl ResponseTransformer for EmptyOnErrorStatus {
    fn transform(&self, route: &Route, response: RestResponse) -> RestResponse {
        if self.statuses.contains(&response.status()) && self.matcher.matches(route) {
            RestResponse::empty(response.status())
        } else {
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::HttpResponse;
    use crate::route::catalog;

    fn response(status: u16) -> RestResponse {
        RestResponse::from(HttpResponse::new(status))
    }

    #[test]
    fn test_empty_if_not_found() {
        let transformer = EmptyIfNotFound::default();
        let out = transformer.transform(&catalog::GET_MESSAGE, response(404));
        assert!(out.is_empty());
        assert_eq!(out.status(), 404);

        let out = transformer.transform(&catalog::GET_MESSAGE, response(403));
        assert!(!out.is_empty());
    }

    #[test]
    fn test_matcher_restricts_routes() {
        let transformer =
            EmptyIfNotFound::new(RouteMatcher::routes([catalog::GET_GUILD_MEMBER]));
        assert!(transformer
            .transform(&catalog::GET_GUILD_MEMBER, response(404))
            .is_empty());
        assert!(!transformer
            .transform(&catalog::GET_CHANNEL, response(404))
            .is_empty());
    }

    #[test]
    fn test_empty_on_error_status() {
        let transformer = EmptyOnErrorStatus::new([403, 404], RouteMatcher::Any);
        assert!(transformer.transform(&catalog::DELETE_MESSAGE, response(403)).is_empty());
        assert!(!transformer.transform(&catalog::DELETE_MESSAGE, response(500)).is_empty());
        assert!(!transformer.transform(&catalog::DELETE_MESSAGE, response(204)).is_empty());
    }
}
