//! Successful handler results.

use crate::envelope::{render, Response};
use crate::error::Failure;
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

/// A successful outcome returned by a handler.
///
/// Success replies are 200 for reads, updates, and deletes and 201 for
/// creations.
///
/// # Example
///
/// ```
/// use missive_core::Reply;
/// use serde_json::json;
///
/// let reply = Reply::created()
///     .message("User created successfully")
///     .data(json!({"id": "u1"}));
/// assert_eq!(reply.status().as_u16(), 201);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    status: StatusCode,
    message: Option<String>,
    data: Option<Value>,
}

impl Reply {
    fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            message: None,
            data: None,
        }
    }

    /// 200 OK.
    #[must_use]
    pub fn ok() -> Self {
        Self::with_status(StatusCode::OK)
    }

    /// 201 Created.
    #[must_use]
    pub fn created() -> Self {
        Self::with_status(StatusCode::CREATED)
    }

    /// 200 OK after an update.
    #[must_use]
    pub fn updated() -> Self {
        Self::with_status(StatusCode::OK)
    }

    /// 200 OK after a delete.
    #[must_use]
    pub fn deleted() -> Self {
        Self::with_status(StatusCode::OK)
    }

    /// Sets the envelope message.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the envelope data.
    #[must_use]
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serializes `data` into the envelope.
    pub fn json<T: Serialize>(self, data: &T) -> Result<Self, Failure> {
        let value = serde_json::to_value(data).map_err(Failure::unexpected)?;
        Ok(self.data(value))
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the message, if any.
    #[must_use]
    pub fn message_text(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the data, if any.
    #[must_use]
    pub fn data_value(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Renders the reply as an envelope response.
    #[must_use]
    pub fn into_response(self) -> Response {
        render(self.status, self.message.as_deref(), self.data)
    }
}
