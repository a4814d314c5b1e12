//! Test response wrapper.

use crate::error::TestError;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;
use missive_core::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A buffered response with envelope accessors and assertions.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Buffers an application response.
    pub async fn from_response(response: Response) -> Result<Self, TestError> {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| TestError::BodyRead(e.to_string()))?
            .to_bytes();

        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    /// Creates a response from raw parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Returns the `x-request-id` header.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.header_str("x-request-id")
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::BodyRead(format!("invalid UTF-8: {e}")))
    }

    /// Deserializes the body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Deserializes the body as a JSON value.
    pub fn json_value(&self) -> Result<Value, TestError> {
        self.json()
    }

    /// Returns the envelope's `success` flag.
    pub fn success(&self) -> Result<bool, TestError> {
        self.json_value()?
            .get("success")
            .and_then(Value::as_bool)
            .ok_or_else(|| TestError::BodyRead("envelope has no success flag".to_string()))
    }

    /// Returns the envelope's `message`, if present.
    pub fn message(&self) -> Result<Option<String>, TestError> {
        Ok(self
            .json_value()?
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Returns the envelope's `data`, if present.
    pub fn data(&self) -> Result<Option<Value>, TestError> {
        Ok(self.json_value()?.get("data").cloned())
    }

    /// Deserializes the envelope's `data`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        let data = self.data()?.unwrap_or(Value::Null);
        Ok(serde_json::from_value(data)?)
    }

    /// Asserts the status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}: {}",
            expected,
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts the envelope's message.
    ///
    /// # Panics
    ///
    /// Panics if the body is not an envelope or the message doesn't match.
    pub fn assert_message(&self, expected: &str) -> &Self {
        let message = self.message().expect("body should be a JSON envelope");
        assert_eq!(message.as_deref(), Some(expected), "Envelope message mismatch");
        self
    }

    /// Asserts that `success` agrees with the status and the request id is set.
    ///
    /// # Panics
    ///
    /// Panics if the body is not a consistent envelope.
    pub fn assert_envelope(&self) -> &Self {
        let success = self.success().expect("body should be a JSON envelope");
        assert_eq!(
            success,
            self.status.as_u16() < 400,
            "success flag {} disagrees with status {}",
            success,
            self.status
        );
        assert!(self.request_id().is_some(), "x-request-id header missing");
        self
    }

    /// Asserts a header value.
    ///
    /// # Panics
    ///
    /// Panics if the header doesn't exist or doesn't match.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("Header '{name}' not found"));
        assert_eq!(actual, expected.as_ref(), "Header '{name}' mismatch");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: StatusCode, body: Value) -> TestResponse {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", "req-1".parse().unwrap());
        TestResponse::new(status, headers, Bytes::from(body.to_string()))
    }

    #[test]
    fn test_envelope_accessors() {
        let r = response(
            StatusCode::CREATED,
            json!({"success": true, "message": "Created", "data": {"id": 7}}),
        );
        assert!(r.success().unwrap());
        assert_eq!(r.message().unwrap().as_deref(), Some("Created"));
        assert_eq!(r.data().unwrap(), Some(json!({"id": 7})));
        assert_eq!(r.request_id(), Some("req-1"));

        #[derive(serde::Deserialize)]
        struct Item {
            id: u32,
        }
        assert_eq!(r.data_as::<Item>().unwrap().id, 7);
        r.assert_status(StatusCode::CREATED).assert_envelope();
    }

    #[test]
    fn test_missing_success_flag() {
        let r = response(StatusCode::OK, json!({"ok": true}));
        assert!(matches!(r.success(), Err(TestError::BodyRead(_))));
        assert_eq!(r.message().unwrap(), None);
    }

    #[test]
    #[should_panic(expected = "disagrees with status")]
    fn test_inconsistent_envelope_panics() {
        response(StatusCode::NOT_FOUND, json!({"success": true})).assert_envelope();
    }
}
