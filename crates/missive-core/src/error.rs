//! Failure types for Missive.
//!
//! [`Failure`] is the closed set of ways a request can fail after routing.
//! Every variant is produced by a named source (the validator, the auth
//! provider, the storage layer, the rate limiter, a handler) so that the
//! dispatcher can classify it by tag instead of by message text.
//!
//! [`ErrorKind`] is the taxonomy a failure is classified into. Each kind maps
//! to exactly one HTTP status.
//!
//! | `ErrorKind` | Status |
//! |---|---|
//! | `Validation` | 400 |
//! | `Unauthorized` | 401 |
//! | `TokenExpired` | 401 |
//! | `Conflict` | 409 |
//! | `Operational(n)` | n |
//! | `RateLimited` | 429 |
//! | `Unknown` | 500 |

use crate::collaborator::{AuthError, AuthErrorKind, StorageError};
use crate::violation::ViolationRecord;
use http::StatusCode;
use std::fmt;
use thiserror::Error;

/// Result type alias using [`Failure`].
pub type FailureResult<T> = Result<T, Failure>;

/// Classification of a captured failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input did not match the declared schema.
    Validation,
    /// Missing or invalid credentials.
    Unauthorized,
    /// Credentials that were valid but have expired.
    TokenExpired,
    /// The resource already exists.
    Conflict,
    /// An anticipated failure carrying its own status code.
    Operational(StatusCode),
    /// The caller exceeded a rate limit.
    RateLimited,
    /// Anything not otherwise classified.
    Unknown,
}

impl ErrorKind {
    /// Returns the HTTP status code for this kind.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Operational(status) => *status,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a stable snake_case label, used in logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Unauthorized => "unauthorized",
            Self::TokenExpired => "token_expired",
            Self::Conflict => "conflict",
            Self::Operational(_) => "operational",
            Self::RateLimited => "rate_limited",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operational(status) => write!(f, "operational({})", status.as_u16()),
            other => f.write_str(other.label()),
        }
    }
}

/// Rejection signal emitted by a rate limiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Too many requests: limit of {limit} per {window_secs}s exceeded")]
pub struct RateLimitRejection {
    /// Requests allowed per window.
    pub limit: u64,
    /// Window length in seconds.
    pub window_secs: u64,
    /// Seconds until a request would be accepted again.
    pub retry_after_secs: u64,
}

/// A captured request failure.
///
/// # Example
///
/// ```
/// use missive_core::{Failure, StorageError};
///
/// fn insert_user(exists: bool) -> Result<(), Failure> {
///     if exists {
///         return Err(StorageError::duplicate_key("E11000 duplicate key").into());
///     }
///     Ok(())
/// }
///
/// assert!(insert_user(true).is_err());
/// ```
#[derive(Debug, Error)]
pub enum Failure {
    /// Input violated the declared schema.
    #[error("Validation failed")]
    Validation(Vec<ViolationRecord>),

    /// The authentication provider failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The storage layer failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An anticipated failure with an explicit status.
    #[error("{message}")]
    Operational {
        /// Status to respond with.
        status: StatusCode,
        /// Message shown to the client.
        message: String,
    },

    /// A rate limiter rejected the request.
    #[error(transparent)]
    RateLimited(#[from] RateLimitRejection),

    /// The handler panicked.
    #[error("{0}")]
    Panic(String),

    /// Any other error raised by handler code.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl Failure {
    /// Creates an operational failure with the given status.
    ///
    /// Only 4xx and 5xx statuses are honoured; anything lower is dispatched
    /// as an unclassified failure.
    #[must_use]
    pub fn operational(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Operational {
            status,
            message: message.into(),
        }
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, message)
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::UNAUTHORIZED, message)
    }

    /// 403 Forbidden.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::FORBIDDEN, message)
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::NOT_FOUND, message)
    }

    /// 409 Conflict.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::CONFLICT, message)
    }

    /// 422 Unprocessable Entity.
    #[must_use]
    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    /// 500 Internal Server Error with an authored message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// 503 Service Unavailable.
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Wraps an arbitrary error as an unexpected failure.
    pub fn unexpected(error: impl Into<anyhow::Error>) -> Self {
        Self::Unexpected(error.into())
    }

    /// Creates a failure from a captured panic message.
    #[must_use]
    pub fn panic(message: impl Into<String>) -> Self {
        Self::Panic(message.into())
    }

    /// Returns the schema violations, if this failure carries any.
    #[must_use]
    pub fn violations(&self) -> Option<&[ViolationRecord]> {
        match self {
            Self::Validation(records) => Some(records),
            _ => None,
        }
    }

    /// Returns the explicit status of an anticipated failure.
    ///
    /// Auth-provider refusals count as anticipated: a refused operation is a
    /// 400 and an unreachable provider a 503.
    #[must_use]
    pub fn operational_status(&self) -> Option<StatusCode> {
        match self {
            Self::Operational { status, .. } => Some(*status),
            Self::Auth(err) => match err.kind() {
                AuthErrorKind::Rejected => Some(StatusCode::BAD_REQUEST),
                AuthErrorKind::Unavailable => Some(StatusCode::SERVICE_UNAVAILABLE),
                _ => None,
            },
            _ => None,
        }
    }

    /// Returns a short source label, used in logs.
    #[must_use]
    pub const fn source_label(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Auth(_) => "auth",
            Self::Storage(_) => "storage",
            Self::Operational { .. } => "operational",
            Self::RateLimited(_) => "rate_limit",
            Self::Panic(_) => "panic",
            Self::Unexpected(_) => "unexpected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::ViolationCode;

    #[test]
    fn test_kind_status_codes() {
        assert_eq!(ErrorKind::Validation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::Conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorKind::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ErrorKind::Unknown.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ErrorKind::Operational(StatusCode::FORBIDDEN).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::TokenExpired.to_string(), "token_expired");
        assert_eq!(
            ErrorKind::Operational(StatusCode::SERVICE_UNAVAILABLE).to_string(),
            "operational(503)"
        );
    }

    #[test]
    fn test_operational_helpers() {
        let cases = [
            (Failure::bad_request("x"), StatusCode::BAD_REQUEST),
            (Failure::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (Failure::forbidden("x"), StatusCode::FORBIDDEN),
            (Failure::not_found("x"), StatusCode::NOT_FOUND),
            (Failure::conflict("x"), StatusCode::CONFLICT),
            (Failure::unprocessable("x"), StatusCode::UNPROCESSABLE_ENTITY),
            (Failure::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (Failure::service_unavailable("x"), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (failure, status) in cases {
            assert_eq!(failure.operational_status(), Some(status));
            assert_eq!(failure.to_string(), "x");
        }
    }

    #[test]
    fn test_auth_refusals_are_operational() {
        let rejected: Failure = AuthError::rejected("User already exists").into();
        assert_eq!(rejected.operational_status(), Some(StatusCode::BAD_REQUEST));

        let expired: Failure = AuthError::token_expired().into();
        assert_eq!(expired.operational_status(), None);
    }

    #[test]
    fn test_violations_accessor() {
        let failure = Failure::Validation(vec![ViolationRecord::new(
            ["body", "name"],
            "Required",
            ViolationCode::InvalidType,
        )]);
        assert_eq!(failure.violations().map(<[_]>::len), Some(1));
        assert!(Failure::panic("boom").violations().is_none());
    }

    #[test]
    fn test_anyhow_conversion() {
        fn parse(input: &str) -> FailureResult<u32> {
            let value: u32 = input.parse().map_err(Failure::unexpected)?;
            Ok(value)
        }

        let err = parse("nope").unwrap_err();
        assert_eq!(err.source_label(), "unexpected");
        assert!(err.to_string().contains("invalid digit"));
    }

    #[test]
    fn test_rate_limit_rejection_message() {
        let rejection = RateLimitRejection {
            limit: 5,
            window_secs: 900,
            retry_after_secs: 30,
        };
        assert!(rejection.to_string().starts_with("Too many requests"));
    }
}
