//! The authentication provider interface.

use crate::model::{AuthSession, SessionInfo};
use missive_core::{AuthError, BoxFuture};

/// Result type returned by every provider operation.
pub type AuthResult<T> = Result<T, AuthError>;

/// An external identity service.
///
/// Implementations report failures only through [`AuthError`]; the pipeline
/// classifies them by kind and never looks at the message text.
///
/// Expected failures:
///
/// | Operation | Failure |
/// |-----------|---------|
/// | `sign_up` | [`AuthError::rejected`] when the email is taken |
/// | `sign_in` | [`AuthError::invalid_credentials`] |
/// | `sign_out`, `get_session` | [`AuthError::invalid_token`] or [`AuthError::token_expired`] |
/// | any | [`AuthError::unavailable`] when the provider cannot be reached |
///
/// # Example
///
/// ```
/// use missive_auth::{AuthProvider, AuthResult, AuthSession, SessionInfo};
/// use missive_core::{AuthError, BoxFuture};
///
/// struct Offline;
///
/// impl AuthProvider for Offline {
///     fn sign_up<'a>(&'a self, _: &'a str, _: &'a str, _: &'a str) -> BoxFuture<'a, AuthResult<AuthSession>> {
///         Box::pin(async { Err(AuthError::unavailable("offline")) })
///     }
///     fn sign_in<'a>(&'a self, _: &'a str, _: &'a str) -> BoxFuture<'a, AuthResult<AuthSession>> {
///         Box::pin(async { Err(AuthError::unavailable("offline")) })
///     }
///     fn sign_out<'a>(&'a self, _: &'a str) -> BoxFuture<'a, AuthResult<()>> {
///         Box::pin(async { Err(AuthError::unavailable("offline")) })
///     }
///     fn get_session<'a>(&'a self, _: &'a str) -> BoxFuture<'a, AuthResult<SessionInfo>> {
///         Box::pin(async { Err(AuthError::unavailable("offline")) })
///     }
/// }
/// ```
pub trait AuthProvider: Send + Sync + 'static {
    /// Registers a user and opens a session for them.
    fn sign_up<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, AuthResult<AuthSession>>;

    /// Opens a session for an existing user.
    fn sign_in<'a>(&'a self, email: &'a str, password: &'a str)
        -> BoxFuture<'a, AuthResult<AuthSession>>;

    /// Revokes the session identified by `token`.
    fn sign_out<'a>(&'a self, token: &'a str) -> BoxFuture<'a, AuthResult<()>>;

    /// Looks up the session identified by `token`.
    fn get_session<'a>(&'a self, token: &'a str) -> BoxFuture<'a, AuthResult<SessionInfo>>;

    /// Short name used in logs.
    fn name(&self) -> &'static str {
        "auth_provider"
    }
}
