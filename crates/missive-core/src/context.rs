//! Request context types.
//!
//! The [`RequestContext`] carries per-request state through the pipeline and
//! into handlers: the request id, the raw request line and headers, the three
//! input parts (body, query, params) as JSON values, the one-shot failure slot,
//! and typed extensions.

use crate::app::AppContext;
use crate::error::Failure;
use crate::forward::{FailureSlot, Forwarder};
use http::{HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// # Example
///
/// ```
/// use missive_core::RequestId;
///
/// let id = RequestId::new();
/// assert_eq!(id.to_string().len(), 36);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new time-ordered request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parses a request ID supplied by a client or upstream proxy.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The three validated input parts of a request.
///
/// Each part is a JSON value. Absent parts are empty objects, except a
/// missing body which is `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestParts {
    /// Decoded JSON body.
    pub body: Value,
    /// Query-string parameters.
    pub query: Value,
    /// Path parameters captured by the router.
    pub params: Value,
}

impl Default for RequestParts {
    fn default() -> Self {
        Self {
            body: Value::Null,
            query: Value::Object(Map::new()),
            params: Value::Object(Map::new()),
        }
    }
}

/// Per-request context.
///
/// Cloning is cheap for everything except the input parts; clones share the
/// failure slot, the extensions, and the commit flag.
///
/// # Example
///
/// ```
/// use http::Method;
/// use missive_core::RequestContext;
/// use serde_json::json;
///
/// let ctx = RequestContext::builder(Method::POST, "/api/auth/signin".parse().unwrap())
///     .body(json!({"email": "a@b.co"}))
///     .build();
/// assert_eq!(ctx.body()["email"], "a@b.co");
/// ```
#[derive(Clone)]
pub struct RequestContext {
    request_id: RequestId,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    parts: RequestParts,
    failure: FailureSlot,
    committed: Arc<AtomicBool>,
    extensions: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    app: Arc<AppContext>,
    started_at: Instant,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("parts", &self.parts)
            .field("failure_forwarded", &self.failure.is_filled())
            .field("extensions", &self.extensions.len())
            .field("mode", &self.app.mode())
            .finish_non_exhaustive()
    }
}

impl RequestContext {
    /// Starts building a context for `method` and `uri`.
    #[must_use]
    pub fn builder(method: Method, uri: Uri) -> RequestContextBuilder {
        RequestContextBuilder::new(method, uri)
    }

    /// Creates a context for testing purposes.
    #[must_use]
    pub fn mock() -> Self {
        Self::builder(Method::GET, Uri::from_static("/")).build()
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Replaces the request ID.
    pub fn set_request_id(&mut self, request_id: RequestId) {
        self.request_id = request_id;
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URI exactly as received.
    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the path with its query string, as on the request line.
    #[must_use]
    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map_or_else(|| self.uri.path(), http::uri::PathAndQuery::as_str)
    }

    /// Returns the request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the bearer token from the `Authorization` header.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.header(http::header::AUTHORIZATION.as_str())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Returns the peer address, if known.
    #[must_use]
    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Returns the input parts.
    #[must_use]
    pub const fn parts(&self) -> &RequestParts {
        &self.parts
    }

    /// Returns the input parts mutably.
    pub fn parts_mut(&mut self) -> &mut RequestParts {
        &mut self.parts
    }

    /// Returns the body part.
    #[must_use]
    pub const fn body(&self) -> &Value {
        &self.parts.body
    }

    /// Returns the query part.
    #[must_use]
    pub const fn query(&self) -> &Value {
        &self.parts.query
    }

    /// Returns the params part.
    #[must_use]
    pub const fn params(&self) -> &Value {
        &self.parts.params
    }

    /// Deserializes the body into `T`.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, Failure> {
        serde_json::from_value(self.parts.body.clone()).map_err(Failure::unexpected)
    }

    /// Deserializes the query into `T`.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, Failure> {
        serde_json::from_value(self.parts.query.clone()).map_err(Failure::unexpected)
    }

    /// Deserializes the path params into `T`.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T, Failure> {
        serde_json::from_value(self.parts.params.clone()).map_err(Failure::unexpected)
    }

    /// Returns the failure slot of this request.
    #[must_use]
    pub const fn failure_slot(&self) -> &FailureSlot {
        &self.failure
    }

    /// Returns a handle for forwarding a failure to the dispatcher.
    #[must_use]
    pub fn forwarder(&self) -> Forwarder {
        self.failure.forwarder()
    }

    /// Forwards `failure` to the dispatcher.
    ///
    /// Returns `false` if a failure was already forwarded for this request.
    pub fn forward(&self, failure: impl Into<Failure>) -> bool {
        self.failure.fill(failure.into())
    }

    /// Marks the response as written.
    ///
    /// Returns `false` if a response was already committed for this request.
    pub fn commit_response(&self) -> bool {
        !self.committed.swap(true, Ordering::AcqRel)
    }

    /// Returns `true` once a response has been committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.committed.load(Ordering::Acquire)
    }

    /// Returns the process-wide application context.
    #[must_use]
    pub fn app(&self) -> &AppContext {
        &self.app
    }

    /// Returns the shared application context handle.
    #[must_use]
    pub fn app_handle(&self) -> Arc<AppContext> {
        Arc::clone(&self.app)
    }

    /// Returns when the request started processing.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Returns `true` if an extension of type `T` is present.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }
}

/// Builder for [`RequestContext`].
#[derive(Debug)]
pub struct RequestContextBuilder {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    parts: RequestParts,
    request_id: Option<RequestId>,
    app: Option<Arc<AppContext>>,
}

impl RequestContextBuilder {
    fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            remote_addr: None,
            parts: RequestParts::default(),
            request_id: None,
            app: None,
        }
    }

    /// Sets the request headers.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the peer address.
    #[must_use]
    pub fn remote_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.remote_addr = addr;
        self
    }

    /// Sets the body part.
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.parts.body = body;
        self
    }

    /// Sets the query part.
    #[must_use]
    pub fn query(mut self, query: Value) -> Self {
        self.parts.query = query;
        self
    }

    /// Sets the params part.
    #[must_use]
    pub fn params(mut self, params: Value) -> Self {
        self.parts.params = params;
        self
    }

    /// Uses an existing request ID.
    #[must_use]
    pub fn request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Attaches the application context.
    #[must_use]
    pub fn app(mut self, app: Arc<AppContext>) -> Self {
        self.app = Some(app);
        self
    }

    /// Builds the context.
    #[must_use]
    pub fn build(self) -> RequestContext {
        RequestContext {
            request_id: self.request_id.unwrap_or_default(),
            method: self.method,
            uri: self.uri,
            headers: self.headers,
            remote_addr: self.remote_addr,
            parts: self.parts,
            failure: FailureSlot::new(),
            committed: Arc::new(AtomicBool::new(false)),
            extensions: HashMap::new(),
            app: self.app.unwrap_or_default(),
            started_at: Instant::now(),
        }
    }
}
