//! Named failures produced by external collaborators.
//!
//! The authentication provider and the storage layer are consumed through
//! interfaces only. Their sole contract with the pipeline is to succeed or to
//! fail with one of the tagged errors below, which the dispatcher classifies
//! without inspecting message text.

use thiserror::Error;

/// What went wrong inside the authentication provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    /// The presented token is malformed, unknown, or revoked.
    InvalidToken,
    /// The presented token was valid but has expired.
    TokenExpired,
    /// No bearer token was presented.
    MissingToken,
    /// Email/password did not match.
    InvalidCredentials,
    /// The provider refused the operation (e.g. the email is already registered).
    Rejected,
    /// The provider could not be reached.
    Unavailable,
}

/// Failure reported by the authentication provider.
///
/// # Example
///
/// ```
/// use missive_core::{AuthError, AuthErrorKind};
///
/// let err = AuthError::token_expired();
/// assert_eq!(err.kind(), AuthErrorKind::TokenExpired);
/// ```
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AuthError {
    kind: AuthErrorKind,
    message: String,
}

impl AuthError {
    /// Creates an auth error with an explicit kind.
    #[must_use]
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The token is not recognised.
    #[must_use]
    pub fn invalid_token() -> Self {
        Self::new(AuthErrorKind::InvalidToken, "Invalid token")
    }

    /// The token has expired.
    #[must_use]
    pub fn token_expired() -> Self {
        Self::new(AuthErrorKind::TokenExpired, "Token expired")
    }

    /// No token was presented.
    #[must_use]
    pub fn missing_token() -> Self {
        Self::new(AuthErrorKind::MissingToken, "Authorization token required")
    }

    /// The credentials did not match.
    #[must_use]
    pub fn invalid_credentials() -> Self {
        Self::new(AuthErrorKind::InvalidCredentials, "Invalid email or password")
    }

    /// The provider refused the operation.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Rejected, message)
    }

    /// The provider is unavailable.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Unavailable, message)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    /// Returns the provider message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// What went wrong inside the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageErrorKind {
    /// The store could not be reached.
    Connection,
    /// A unique index rejected the write.
    DuplicateKey,
    /// The document failed the store's own validation.
    Validation,
    /// Any other storage failure.
    Generic,
}

/// Failure reported by the storage layer.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StorageError {
    kind: StorageErrorKind,
    message: String,
}

impl StorageError {
    /// Creates a storage error with an explicit kind.
    #[must_use]
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A unique index rejected the write.
    #[must_use]
    pub fn duplicate_key(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::DuplicateKey, message)
    }

    /// The store could not be reached.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Connection, message)
    }

    /// The document failed store-side validation.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Validation, message)
    }

    /// Any other storage failure.
    #[must_use]
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Generic, message)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> StorageErrorKind {
        self.kind
    }

    /// Returns the storage message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_constructors() {
        assert_eq!(AuthError::invalid_token().kind(), AuthErrorKind::InvalidToken);
        assert_eq!(AuthError::missing_token().message(), "Authorization token required");
        assert_eq!(
            AuthError::invalid_credentials().to_string(),
            "Invalid email or password"
        );
        let rejected = AuthError::rejected("User already exists");
        assert_eq!(rejected.kind(), AuthErrorKind::Rejected);
        assert_eq!(rejected.message(), "User already exists");
    }

    #[test]
    fn test_storage_constructors() {
        let err = StorageError::duplicate_key("E11000 duplicate key error collection: users");
        assert_eq!(err.kind(), StorageErrorKind::DuplicateKey);
        assert!(err.to_string().starts_with("E11000"));
        assert_eq!(StorageError::connection("refused").kind(), StorageErrorKind::Connection);
        assert_eq!(StorageError::generic("boom").kind(), StorageErrorKind::Generic);
    }
}
