//! The request entry point.
//!
//! [`App`] turns a raw `http::Request<Bytes>` into a [`RequestContext`],
//! resolves the route, and hands both to the [`Pipeline`]. It never touches
//! a socket, so the same path serves the Hyper server and in-memory tests.
//!
//! Input decoding happens here:
//!
//! - the query string becomes a JSON object; repeated keys become arrays
//! - an empty body becomes `null`
//! - `application/x-www-form-urlencoded` bodies decode like the query
//! - any other body is parsed as JSON
//!
//! Undecodable input is answered with an operational 400 that travels the
//! whole pipeline, so it carries a request ID and is logged like any other
//! failure.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::{header, HeaderMap, StatusCode};
use missive_core::envelope::render;
use missive_core::{AppContext, Failure, Reply, RequestContext, Response};
use missive_middleware::stages::RateLimitMiddleware;
use missive_middleware::{Endpoint, Pipeline};
use serde_json::{json, Map, Value};

use crate::error::ServerError;
use crate::router::Router;

/// Message of the 400 produced for an undecodable JSON body.
pub const MALFORMED_BODY_MESSAGE: &str = "Malformed JSON body";

/// Message of the 400 produced for an undecodable form body or query string.
pub const MALFORMED_QUERY_MESSAGE: &str = "Malformed query string";

/// Path of the built-in health route.
pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Clone, Copy)]
struct MalformedInput(&'static str);

/// A routed application: router plus pipeline.
///
/// # Example
///
/// ```rust
/// use bytes::Bytes;
/// use missive_core::AppContext;
/// use missive_server::{App, Router};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let app = App::builder(Arc::new(AppContext::production()))
///     .router(Router::new())
///     .build()
///     .unwrap();
///
/// let request = http::Request::get("/doesnotexist").body(Bytes::new()).unwrap();
/// let response = app.handle(request).await;
/// assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
/// # });
/// ```
pub struct App {
    router: Router,
    pipeline: Pipeline,
    reject_input: Endpoint,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.router.route_count())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl App {
    /// Creates a builder for `app`.
    #[must_use]
    pub fn builder(app: Arc<AppContext>) -> AppBuilder {
        AppBuilder::new(app)
    }

    /// Returns the router.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Returns the pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns the application context.
    #[must_use]
    pub fn context(&self) -> &Arc<AppContext> {
        self.pipeline.app()
    }

    /// Handles a request with no known peer address.
    pub async fn handle(&self, request: http::Request<Bytes>) -> Response {
        self.handle_from(request, None).await
    }

    /// Handles a request from `remote_addr`.
    ///
    /// Always produces exactly one response.
    pub async fn handle_from(
        &self,
        request: http::Request<Bytes>,
        remote_addr: Option<SocketAddr>,
    ) -> Response {
        let (parts, body) = request.into_parts();

        let query = decode_query(parts.uri.query());
        let body = decode_body(&parts.headers, &body);

        let mut ctx = RequestContext::builder(parts.method, parts.uri)
            .headers(parts.headers)
            .remote_addr(remote_addr)
            .app(Arc::clone(self.pipeline.app()))
            .build();

        match (query, body) {
            (Ok(query), Ok(body)) => {
                ctx.parts_mut().query = query;
                ctx.parts_mut().body = body;
            }
            (Err(rejection), _) | (_, Err(rejection)) => {
                ctx.set_extension(rejection);
                return self.run(ctx, Some(&self.reject_input)).await;
            }
        }

        let path = ctx.uri().path().to_string();
        let endpoint = match self.router.match_route(ctx.method(), &path) {
            Some(matched) => {
                let endpoint = Arc::clone(matched.endpoint());
                ctx.parts_mut().params = matched.into_params();
                Some(endpoint)
            }
            None => None,
        };

        self.run(ctx, endpoint.as_deref()).await
    }

    async fn run(&self, ctx: RequestContext, endpoint: Option<&Endpoint>) -> Response {
        match self.pipeline.process(ctx, endpoint).await {
            Ok(response) => response,
            // Contexts built here are never pre-committed.
            Err(_) => render(
                StatusCode::INTERNAL_SERVER_ERROR,
                Some(self.context().generic_error_message()),
                None,
            ),
        }
    }
}

/// Builder for [`App`].
#[derive(Debug)]
pub struct AppBuilder {
    app: Arc<AppContext>,
    router: Router,
    rate_limit: Option<RateLimitMiddleware>,
    trust_request_id: bool,
    health: bool,
}

impl AppBuilder {
    /// Creates a builder with the health route enabled and no limiter.
    #[must_use]
    pub fn new(app: Arc<AppContext>) -> Self {
        Self {
            app,
            router: Router::new(),
            rate_limit: None,
            trust_request_id: true,
            health: true,
        }
    }

    /// Sets the application routes.
    #[must_use]
    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Installs the global rate limiter.
    #[must_use]
    pub fn rate_limit(mut self, limiter: RateLimitMiddleware) -> Self {
        self.rate_limit = Some(limiter);
        self
    }

    /// Whether incoming `x-request-id` headers are propagated.
    #[must_use]
    pub fn trust_request_id(mut self, trust: bool) -> Self {
        self.trust_request_id = trust;
        self
    }

    /// Enables or disables the built-in `GET /health` route.
    #[must_use]
    pub fn health(mut self, enabled: bool) -> Self {
        self.health = enabled;
        self
    }

    /// Builds the application.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidRoute`] if the health route cannot be
    /// mounted.
    pub fn build(self) -> Result<App, ServerError> {
        let mut pipeline = Pipeline::builder(Arc::clone(&self.app))
            .trust_request_id(self.trust_request_id);
        if let Some(limiter) = self.rate_limit {
            pipeline = pipeline.rate_limit(limiter);
        }

        let router = if self.health {
            let mut router = Router::new();
            router.get(HEALTH_PATH, health_endpoint(self.app.service_name()))?;
            router.nest("/", self.router)?;
            router
        } else {
            self.router
        };

        Ok(App {
            router,
            pipeline: pipeline.build(),
            reject_input: Endpoint::new(reject_input),
        })
    }
}

async fn reject_input(ctx: RequestContext) -> Result<Reply, Failure> {
    let message = ctx
        .extension::<MalformedInput>()
        .map_or(MALFORMED_BODY_MESSAGE, |m| m.0);
    Err(Failure::bad_request(message))
}

fn health_endpoint(service: &str) -> Endpoint {
    let service = service.to_string();
    let started = Instant::now();
    Endpoint::new(move |_ctx: RequestContext| {
        let data = json!({
            "status": "healthy",
            "service": service,
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": started.elapsed().as_secs(),
        });
        async move { Ok::<_, Failure>(Reply::ok().message("OK").data(data)) }
    })
}

fn decode_query(query: Option<&str>) -> Result<Value, MalformedInput> {
    match query {
        Some(query) if !query.is_empty() => decode_form(query.as_bytes()),
        _ => Ok(Value::Object(Map::new())),
    }
}

fn decode_form(input: &[u8]) -> Result<Value, MalformedInput> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(input).map_err(|_| MalformedInput(MALFORMED_QUERY_MESSAGE))?;

    let mut object = Map::new();
    for (key, value) in pairs {
        match object.get_mut(&key) {
            Some(Value::Array(values)) => values.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                object.insert(key, Value::String(value));
            }
        }
    }
    Ok(Value::Object(object))
}

fn decode_body(headers: &HeaderMap, body: &Bytes) -> Result<Value, MalformedInput> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        decode_form(body)
    } else {
        serde_json::from_slice(body).map_err(|_| MalformedInput(MALFORMED_BODY_MESSAGE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use http_body_util::BodyExt;
    use missive_middleware::schema::{FieldRule, ObjectShape, ValidationSchema};

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn echo() -> Endpoint {
        Endpoint::new(|ctx: RequestContext| async move {
            Ok::<_, Failure>(Reply::ok().data(json!({
                "body": ctx.body(),
                "query": ctx.query(),
                "params": ctx.params(),
            })))
        })
    }

    fn app(router: Router) -> App {
        App::builder(Arc::new(AppContext::production()))
            .router(router)
            .build()
            .unwrap()
    }

    #[test]
    fn test_decode_query_repeated_keys() {
        let query = decode_query(Some("tag=a&page=2&tag=b&tag=c&q=hello+world")).unwrap();
        assert_eq!(
            query,
            json!({"tag": ["a", "b", "c"], "page": "2", "q": "hello world"})
        );
        assert_eq!(decode_query(None).unwrap(), json!({}));
        assert_eq!(decode_query(Some("")).unwrap(), json!({}));
    }

    #[test]
    fn test_decode_body() {
        let headers = HeaderMap::new();
        assert_eq!(decode_body(&headers, &Bytes::new()).unwrap(), Value::Null);
        assert_eq!(decode_body(&headers, &Bytes::from_static(b" \n")).unwrap(), Value::Null);
        assert_eq!(
            decode_body(&headers, &Bytes::from_static(br#"{"a":1}"#)).unwrap(),
            json!({"a": 1})
        );
        assert_eq!(
            decode_body(&headers, &Bytes::from_static(b"{oops")).unwrap_err().0,
            MALFORMED_BODY_MESSAGE
        );

        let mut form = HeaderMap::new();
        form.insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded".parse().unwrap(),
        );
        assert_eq!(
            decode_body(&form, &Bytes::from_static(b"email=a%40b.co")).unwrap(),
            json!({"email": "a@b.co"})
        );
    }

    #[tokio::test]
    async fn test_params_query_and_body_reach_handler() {
        let mut router = Router::new();
        router.post("/items/{id}", echo()).unwrap();
        let app = app(router);

        let request = http::Request::post("/items/42?expand=true")
            .header("content-type", "application/json")
            .body(Bytes::from_static(br#"{"name":"widget"}"#))
            .unwrap();
        let response = app.handle(request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["data"]["params"], json!({"id": "42"}));
        assert_eq!(body["data"]["query"], json!({"expand": "true"}));
        assert_eq!(body["data"]["body"], json!({"name": "widget"}));
    }

    #[tokio::test]
    async fn test_malformed_body_is_dispatched() {
        let mut router = Router::new();
        router.post("/items", echo()).unwrap();
        let app = app(router);

        let request = http::Request::post("/items")
            .body(Bytes::from_static(b"{not json"))
            .unwrap();
        let response = app.handle(request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().contains_key("x-request-id"));
        let body = json_body(response).await;
        assert_eq!(body, json!({"success": false, "message": "Malformed JSON body"}));
    }

    #[tokio::test]
    async fn test_not_found() {
        let app = app(Router::new());
        let request = http::Request::get("/doesnotexist").body(Bytes::new()).unwrap();
        let response = app.handle(request).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Route GET /doesnotexist not found");
    }

    #[tokio::test]
    async fn test_health_route() {
        let app = app(Router::new());
        let request = http::Request::get("/health").body(Bytes::new()).unwrap();
        let response = app.handle(request).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["service"], "missive");

        let disabled = App::builder(Arc::new(AppContext::production()))
            .health(false)
            .build()
            .unwrap();
        let request = http::Request::get("/health").body(Bytes::new()).unwrap();
        assert_eq!(disabled.handle(request).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_query_coercion_through_schema() {
        let mut router = Router::new();
        router
            .get(
                "/items",
                echo().validate(
                    ValidationSchema::parts()
                        .query(ObjectShape::new().field("page", FieldRule::integer().min(1))),
                ),
            )
            .unwrap();
        let app = app(router);

        let request = http::Request::get("/items?page=3").body(Bytes::new()).unwrap();
        let body = json_body(app.handle(request).await).await;
        assert_eq!(body["data"]["query"], json!({"page": 3}));

        let request = http::Request::get("/items?page=0").body(Bytes::new()).unwrap();
        let response = app.handle(request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["data"]["errors"][0]["field"], "query.page");
    }
}
