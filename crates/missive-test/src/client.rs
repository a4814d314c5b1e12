//! In-memory test client.

use crate::error::TestError;
use crate::request::{TestRequest, TestRequestBuilder};
use crate::response::TestResponse;
use http::Method;
use missive_core::AppContext;
use missive_server::{App, Router};
use serde::Serialize;
use std::sync::Arc;

/// Sends requests straight into an [`App`], without sockets.
///
/// Requests go through the full pipeline: request id, telemetry, error
/// dispatch, rate limiting, route stages, validation, and the handler.
///
/// # Example
///
/// ```
/// use missive_core::{AppContext, Failure, Reply, RequestContext, RuntimeMode};
/// use missive_middleware::Endpoint;
/// use missive_server::Router;
/// use missive_test::TestClient;
///
/// # tokio_test::block_on(async {
/// let mut router = Router::new();
/// router
///     .get("/ping", Endpoint::new(|_ctx: RequestContext| async {
///         Ok::<_, Failure>(Reply::ok().message("pong"))
///     }))
///     .unwrap();
///
/// let client = TestClient::from_router(AppContext::new(RuntimeMode::Test), router).unwrap();
/// let response = client.get("/ping").send().await;
/// response.assert_envelope().assert_message("pong");
/// # });
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct TestClient {
    app: Arc<App>,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a client for an application.
    pub fn new(app: App) -> Self {
        Self::from_arc(Arc::new(app))
    }

    /// Creates a client for a shared application.
    pub fn from_arc(app: Arc<App>) -> Self {
        Self {
            app,
            default_headers: Vec::new(),
        }
    }

    /// Builds an application around `router` with default settings.
    pub fn from_router(context: AppContext, router: Router) -> Result<Self, TestError> {
        let app = App::builder(Arc::new(context)).router(router).build()?;
        Ok(Self::new(app))
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Returns the application.
    #[must_use]
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Starts a GET request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Starts a POST request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Starts a PUT request.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Starts a PATCH request.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PATCH, uri)
    }

    /// Starts a DELETE request.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        let mut builder = TestRequestBuilder::new(method, uri);
        for (name, value) in &self.default_headers {
            builder = builder.header(name, value);
        }
        TestClientRequest {
            client: self,
            builder,
        }
    }

    /// Sends a built request.
    pub async fn execute(&self, request: TestRequest) -> Result<TestResponse, TestError> {
        let remote_addr = request.remote_addr;
        let request = request.into_http_request()?;
        let response = self.app.handle_from(request, remote_addr).await;
        TestResponse::from_response(response).await
    }
}

/// A request bound to a [`TestClient`].
#[must_use]
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl TestClientRequest<'_> {
    /// Sets a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets the Authorization header with a Bearer token.
    pub fn bearer_token(mut self, token: impl AsRef<str>) -> Self {
        self.builder = self.builder.bearer_token(token);
        self
    }

    /// Sets the client IP through `x-forwarded-for`.
    pub fn client_ip(mut self, ip: impl AsRef<str>) -> Self {
        self.builder = self.builder.client_ip(ip);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<bytes::Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sets a form body.
    pub fn form<T: Serialize>(mut self, value: &T) -> Self {
        self.builder = self.builder.form(value);
        self
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(e) => panic!("test request failed: {e}"),
        }
    }

    /// Sends the request, returning build and read errors.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        self.client.execute(request).await
    }
}
