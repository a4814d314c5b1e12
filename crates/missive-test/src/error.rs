//! Test error types.

use missive_server::ServerError;
use thiserror::Error;

/// Errors raised while building, sending, or reading a test request.
#[derive(Debug, Error)]
pub enum TestError {
    /// The request could not be built.
    #[error("request build error: {0}")]
    RequestBuild(String),

    /// A header name or value is invalid.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The response body could not be read.
    #[error("body read error: {0}")]
    BodyRead(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The application could not be assembled.
    #[error(transparent)]
    App(#[from] ServerError),
}
