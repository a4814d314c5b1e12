//! Uniform response envelope.
//!
//! Every response Missive writes, success or failure, has the same body shape:
//!
//! ```json
//! { "success": true, "message": "User created successfully", "data": { ... } }
//! ```
//!
//! `message` and `data` are omitted when absent. `success` is derived from the
//! status code inside [`ResponseEnvelope::new`], so it is `false` exactly when
//! the status is 400 or above.

use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The HTTP response type produced by the pipeline.
pub type Response = http::Response<Full<Bytes>>;

/// Content type of every envelope.
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// The `{ success, message, data }` response body.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use missive_core::ResponseEnvelope;
///
/// let envelope = ResponseEnvelope::new(StatusCode::NOT_FOUND, Some("Route GET /x not found".into()), None);
/// assert!(!envelope.success);
/// assert_eq!(
///     envelope.to_json(),
///     r#"{"success":false,"message":"Route GET /x not found"}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// `false` iff the response status is 400 or above.
    pub success: bool,
    /// Human-readable summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseEnvelope {
    /// Builds an envelope for the given status.
    #[must_use]
    pub fn new(status: StatusCode, message: Option<String>, data: Option<Value>) -> Self {
        Self {
            success: !is_failure_status(status),
            message,
            data,
        }
    }

    /// Serializes the envelope to a JSON string.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            // Only reachable through non-string map keys inside `data`.
            format!(r#"{{"success":{}}}"#, self.success)
        })
    }

    /// Serializes the envelope to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.to_json())
    }

    /// Renders the envelope into an HTTP response with `status`.
    #[must_use]
    pub fn into_response(self, status: StatusCode) -> Response {
        let mut response = http::Response::new(Full::new(self.to_bytes()));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
        response
    }
}

/// Returns `true` for statuses that must render `success: false`.
#[must_use]
pub fn is_failure_status(status: StatusCode) -> bool {
    status.as_u16() >= 400
}

/// Renders `(status, message, data)` as an envelope response.
///
/// Identical inputs always produce byte-identical bodies.
#[must_use]
pub fn render(status: StatusCode, message: Option<&str>, data: Option<Value>) -> Response {
    ResponseEnvelope::new(status, message.map(str::to_string), data).into_response(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use proptest::prelude::*;
    use serde_json::json;

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_success_envelope() {
        let envelope = ResponseEnvelope::new(
            StatusCode::CREATED,
            Some("User created successfully".into()),
            Some(json!({"id": "u1"})),
        );
        assert!(envelope.success);
        assert_eq!(
            envelope.to_json(),
            r#"{"success":true,"message":"User created successfully","data":{"id":"u1"}}"#
        );
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let envelope = ResponseEnvelope::new(StatusCode::OK, None, None);
        assert_eq!(envelope.to_json(), r#"{"success":true}"#);
    }

    #[test]
    fn test_explicit_null_data_is_kept() {
        let envelope = ResponseEnvelope::new(StatusCode::OK, Some("Signed out successfully".into()), Some(Value::Null));
        assert_eq!(
            envelope.to_json(),
            r#"{"success":true,"message":"Signed out successfully","data":null}"#
        );
    }

    #[tokio::test]
    async fn test_render_sets_status_and_content_type() {
        let response = render(StatusCode::CONFLICT, Some("Resource already exists"), None);
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            CONTENT_TYPE
        );
        assert_eq!(
            body_string(response).await,
            r#"{"success":false,"message":"Resource already exists"}"#
        );
    }

    #[tokio::test]
    async fn test_render_is_deterministic() {
        let data = json!({"zeta": 1, "alpha": [1, 2, {"b": true, "a": null}], "mid": "x"});
        let first = body_string(render(StatusCode::BAD_REQUEST, Some("Validation failed"), Some(data.clone()))).await;
        let second = body_string(render(StatusCode::BAD_REQUEST, Some("Validation failed"), Some(data))).await;
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_success_iff_below_400(code in 100u16..600) {
            let status = StatusCode::from_u16(code).unwrap();
            let envelope = ResponseEnvelope::new(status, None, None);
            prop_assert_eq!(envelope.success, code < 400);
        }
    }
}
