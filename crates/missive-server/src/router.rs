//! Request routing and path matching.
//!
//! The router is an ordered list of `(method, pattern, endpoint)` entries.
//! Patterns use `{name}` for path parameters. Entries are checked in
//! registration order and the first match wins.
//!
//! # Example
//!
//! ```rust
//! use http::Method;
//! use missive_core::{Failure, Reply, RequestContext};
//! use missive_middleware::Endpoint;
//! use missive_server::Router;
//!
//! let mut router = Router::new();
//! router
//!     .add_route(
//!         Method::GET,
//!         "/users/{userId}",
//!         Endpoint::new(|_ctx: RequestContext| async { Ok::<_, Failure>(Reply::ok()) }),
//!     )
//!     .unwrap();
//!
//! let matched = router.match_route(&Method::GET, "/users/42").unwrap();
//! assert_eq!(matched.pattern(), "/users/{userId}");
//! assert_eq!(matched.param("userId"), Some("42"));
//! assert!(router.match_route(&Method::POST, "/users/42").is_none());
//! ```

use std::sync::Arc;

use http::Method;
use missive_middleware::Endpoint;
use serde_json::{Map, Value};

use crate::error::ServerError;

/// A matched route with its extracted path parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch<'r> {
    endpoint: &'r Arc<Endpoint>,
    pattern: &'r str,
    params: Map<String, Value>,
}

impl<'r> RouteMatch<'r> {
    /// Returns the matched endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &'r Arc<Endpoint> {
        self.endpoint
    }

    /// Returns the pattern the route was registered with.
    #[must_use]
    pub fn pattern(&self) -> &'r str {
        self.pattern
    }

    /// Returns the extracted path parameters.
    #[must_use]
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Returns one path parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// Consumes the match, returning the parameters as a JSON object.
    #[must_use]
    pub fn into_params(self) -> Value {
        Value::Object(self.params)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone)]
struct Route {
    method: Method,
    segments: Vec<PathSegment>,
    endpoint: Arc<Endpoint>,
    pattern: String,
}

impl Route {
    fn new(method: Method, pattern: &str, endpoint: Arc<Endpoint>) -> Result<Self, ServerError> {
        let segments = parse_segments(pattern)?;
        Ok(Self {
            method,
            segments,
            endpoint,
            pattern: pattern.to_string(),
        })
    }

    fn match_path(&self, path: &str) -> Option<Map<String, Value>> {
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if path_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = Map::new();
        for (pattern, actual) in self.segments.iter().zip(path_segments) {
            match pattern {
                PathSegment::Literal(expected) => {
                    if expected != actual {
                        return None;
                    }
                }
                PathSegment::Param(name) => {
                    params.insert(name.clone(), Value::String(actual.to_string()));
                }
            }
        }
        Some(params)
    }
}

fn invalid(pattern: &str, reason: &'static str) -> ServerError {
    ServerError::InvalidRoute {
        pattern: pattern.to_string(),
        reason,
    }
}

fn parse_segments(pattern: &str) -> Result<Vec<PathSegment>, ServerError> {
    if !pattern.starts_with('/') {
        return Err(invalid(pattern, "pattern must start with '/'"));
    }

    let mut segments = Vec::new();
    for raw in pattern.split('/').filter(|s| !s.is_empty()) {
        let segment = match raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some("") => return Err(invalid(pattern, "empty parameter name")),
            Some(name) => {
                let duplicate = segments
                    .iter()
                    .any(|s| matches!(s, PathSegment::Param(existing) if existing == name));
                if duplicate {
                    return Err(invalid(pattern, "duplicate parameter name"));
                }
                PathSegment::Param(name.to_string())
            }
            None if raw.contains(['{', '}']) => {
                return Err(invalid(pattern, "parameters must span a whole segment"));
            }
            None => PathSegment::Literal(raw.to_string()),
        };
        segments.push(segment);
    }
    Ok(segments)
}

/// HTTP request router.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers a route.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidRoute`] if the pattern does not start
    /// with `/` or declares a malformed parameter.
    pub fn add_route(
        &mut self,
        method: Method,
        pattern: impl AsRef<str>,
        endpoint: impl Into<Arc<Endpoint>>,
    ) -> Result<&mut Self, ServerError> {
        let route = Route::new(method, pattern.as_ref(), endpoint.into())?;
        tracing::debug!(method = %route.method, pattern = %route.pattern, "Route registered");
        self.routes.push(route);
        Ok(self)
    }

    /// Registers a `GET` route.
    pub fn get(
        &mut self,
        pattern: impl AsRef<str>,
        endpoint: impl Into<Arc<Endpoint>>,
    ) -> Result<&mut Self, ServerError> {
        self.add_route(Method::GET, pattern, endpoint)
    }

    /// Registers a `POST` route.
    pub fn post(
        &mut self,
        pattern: impl AsRef<str>,
        endpoint: impl Into<Arc<Endpoint>>,
    ) -> Result<&mut Self, ServerError> {
        self.add_route(Method::POST, pattern, endpoint)
    }

    /// Registers a `PUT` route.
    pub fn put(
        &mut self,
        pattern: impl AsRef<str>,
        endpoint: impl Into<Arc<Endpoint>>,
    ) -> Result<&mut Self, ServerError> {
        self.add_route(Method::PUT, pattern, endpoint)
    }

    /// Registers a `PATCH` route.
    pub fn patch(
        &mut self,
        pattern: impl AsRef<str>,
        endpoint: impl Into<Arc<Endpoint>>,
    ) -> Result<&mut Self, ServerError> {
        self.add_route(Method::PATCH, pattern, endpoint)
    }

    /// Registers a `DELETE` route.
    pub fn delete(
        &mut self,
        pattern: impl AsRef<str>,
        endpoint: impl Into<Arc<Endpoint>>,
    ) -> Result<&mut Self, ServerError> {
        self.add_route(Method::DELETE, pattern, endpoint)
    }

    /// Mounts every route of `other` under `prefix`, after the existing routes.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidRoute`] if `prefix` is not a valid pattern.
    pub fn nest(&mut self, prefix: &str, other: Router) -> Result<&mut Self, ServerError> {
        let prefix_segments = parse_segments(prefix)?;
        let prefix = prefix.trim_end_matches('/');

        for mut route in other.routes {
            let mut segments = prefix_segments.clone();
            segments.append(&mut route.segments);
            route.segments = segments;
            route.pattern = format!("{prefix}{}", route.pattern);
            self.routes.push(route);
        }
        Ok(self)
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Returns `(method, pattern)` for every route in registration order.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.routes.iter().map(|r| (&r.method, r.pattern.as_str()))
    }

    /// Matches a request. Routes are checked in order; first match wins.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route.match_path(path).map(|params| RouteMatch {
                    endpoint: &route.endpoint,
                    pattern: &route.pattern,
                    params,
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use missive_core::{Failure, Reply, RequestContext};

    fn endpoint() -> Endpoint {
        Endpoint::new(|_ctx: RequestContext| async { Ok::<_, Failure>(Reply::ok()) })
    }

    #[test]
    fn test_literal_and_param_matching() {
        let mut router = Router::new();
        router.get("/users", endpoint()).unwrap();
        router.get("/users/{id}/posts/{postId}", endpoint()).unwrap();

        let m = router.match_route(&Method::GET, "/users/7/posts/9").unwrap();
        assert_eq!(m.param("id"), Some("7"));
        assert_eq!(m.param("postId"), Some("9"));
        assert_eq!(m.into_params(), serde_json::json!({"id": "7", "postId": "9"}));

        let m = router.match_route(&Method::GET, "/users/").unwrap();
        assert_eq!(m.pattern(), "/users");
        assert!(m.params().is_empty());
    }

    #[test]
    fn test_first_match_wins() {
        let mut router = Router::new();
        router.get("/users/{id}", endpoint()).unwrap();
        router.get("/users/me", endpoint()).unwrap();

        let m = router.match_route(&Method::GET, "/users/me").unwrap();
        assert_eq!(m.pattern(), "/users/{id}");
        assert_eq!(m.param("id"), Some("me"));
    }

    #[test]
    fn test_method_and_length_mismatch() {
        let mut router = Router::new();
        router.post("/items", endpoint()).unwrap();

        assert!(router.match_route(&Method::GET, "/items").is_none());
        assert!(router.match_route(&Method::POST, "/items/1").is_none());
        assert!(router.match_route(&Method::POST, "/").is_none());
    }

    #[test]
    fn test_invalid_patterns() {
        let mut router = Router::new();
        assert!(router.get("users", endpoint()).is_err());
        assert!(router.get("/users/{}", endpoint()).is_err());
        assert!(router.get("/users/{id}/{id}", endpoint()).is_err());
        assert!(router.get("/users/id-{id}", endpoint()).is_err());
        assert_eq!(router.route_count(), 0);
    }

    #[test]
    fn test_nest() {
        let mut auth = Router::new();
        auth.post("/signin", endpoint()).unwrap();
        auth.get("/session", endpoint()).unwrap();

        let mut router = Router::new();
        router.get("/health", endpoint()).unwrap();
        router.nest("/api/auth/", auth).unwrap();

        let patterns: Vec<_> = router.routes().map(|(m, p)| format!("{m} {p}")).collect();
        assert_eq!(
            patterns,
            vec!["GET /health", "POST /api/auth/signin", "GET /api/auth/session"]
        );
        assert!(router.match_route(&Method::POST, "/api/auth/signin").is_some());
        assert!(router.match_route(&Method::POST, "/signin").is_none());
    }
}
