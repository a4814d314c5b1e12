//! Test request building.

use crate::error::TestError;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde::Serialize;
use std::net::SocketAddr;

/// A request ready to be handed to an [`App`](missive_server::App).
#[derive(Debug, Clone)]
pub struct TestRequest {
    /// HTTP method
    pub method: Method,
    /// Request URI
    pub uri: Uri,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Bytes,
    /// Simulated peer address
    pub remote_addr: Option<SocketAddr>,
}

impl TestRequest {
    /// Starts a GET request.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Starts a POST request.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Starts a PUT request.
    pub fn put(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// Starts a PATCH request.
    pub fn patch(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PATCH, uri)
    }

    /// Starts a DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }

    /// Converts into the request type [`App::handle`](missive_server::App::handle) takes.
    pub fn into_http_request(self) -> Result<http::Request<Bytes>, TestError> {
        let mut request = http::Request::builder()
            .method(self.method)
            .uri(self.uri)
            .body(self.body)
            .map_err(|e| TestError::RequestBuild(e.to_string()))?;
        *request.headers_mut() = self.headers;
        Ok(request)
    }
}

/// Builder for [`TestRequest`].
///
/// Invalid headers and encoding failures are remembered and reported by
/// [`build`](Self::build).
#[must_use]
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    remote_addr: Option<SocketAddr>,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a builder.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            headers: HeaderMap::new(),
            body: None,
            remote_addr: None,
            error: None,
        }
    }

    /// Sets a header, replacing any previous value.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = HeaderName::try_from(name.as_ref());
        let value = HeaderValue::try_from(value.as_ref());
        match (name, value) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            (Err(e), _) => self.fail(TestError::InvalidHeader(e.to_string())),
            (_, Err(e)) => self.fail(TestError::InvalidHeader(e.to_string())),
        }
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets the Authorization header with a Bearer token.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.header(
            header::AUTHORIZATION.as_str(),
            format!("Bearer {}", token.as_ref()),
        )
    }

    /// Sets the client IP through `x-forwarded-for`.
    pub fn client_ip(self, ip: impl AsRef<str>) -> Self {
        self.header("x-forwarded-for", ip)
    }

    /// Sets the simulated peer address.
    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a JSON body and `Content-Type: application/json`.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.body = Some(Bytes::from(bytes)),
            Err(e) => self.fail(e.into()),
        }
        self.content_type("application/json")
    }

    /// Sets a form body and `Content-Type: application/x-www-form-urlencoded`.
    pub fn form<T: Serialize>(mut self, value: &T) -> Self {
        match serde_urlencoded::to_string(value) {
            Ok(encoded) => self.body = Some(Bytes::from(encoded)),
            Err(e) => self.fail(TestError::RequestBuild(e.to_string())),
        }
        self.content_type("application/x-www-form-urlencoded")
    }

    /// Builds the request.
    pub fn build(self) -> Result<TestRequest, TestError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let uri: Uri = self
            .uri
            .parse()
            .map_err(|e| TestError::RequestBuild(format!("invalid URI: {e}")))?;

        Ok(TestRequest {
            method: self.method,
            uri,
            headers: self.headers,
            body: self.body.unwrap_or_default(),
            remote_addr: self.remote_addr,
        })
    }

    fn fail(&mut self, error: TestError) {
        self.error.get_or_insert(error);
    }
}
