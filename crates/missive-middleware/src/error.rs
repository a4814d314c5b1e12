//! Errors raised while building middleware.

use missive_core::RequestId;
use thiserror::Error;

/// The request already has a committed response; a second one is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a response was already committed for request {request_id}")]
pub struct ResponseCommitted {
    /// The request that was already answered.
    pub request_id: RequestId,
}

/// A schema declaration could not be turned into a [`ValidationSchema`].
///
/// [`ValidationSchema`]: crate::schema::ValidationSchema
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The declaration is not valid JSON or has unknown keys.
    #[error("invalid schema declaration: {0}")]
    Declaration(#[from] serde_json::Error),

    /// An `object` field without `fields`.
    #[error("field `{field}` is an object but declares no `fields`")]
    MissingFields {
        /// Field name.
        field: String,
    },

    /// An `array` field without `items`.
    #[error("field `{field}` is an array but declares no `items`")]
    MissingItems {
        /// Field name.
        field: String,
    },

    /// A `format` on a non-string field.
    #[error("field `{field}` declares a format but is not a string")]
    FormatOnNonString {
        /// Field name.
        field: String,
    },

    /// `min` greater than `max`.
    #[error("field `{field}` has min {min} greater than max {max}")]
    InvertedBounds {
        /// Field name.
        field: String,
        /// Declared minimum.
        min: f64,
        /// Declared maximum.
        max: f64,
    },
}
