//! Authentication for Missive.
//!
//! The identity service itself is external. This crate defines the
//! [`AuthProvider`] interface it is consumed through, the request schemas of
//! the auth routes, and [`AuthRoutes`], which mounts sign-up, sign-in,
//! sign-out and session lookup under `/api/auth` behind an optional shared
//! rate limiter.
//!
//! Provider failures are [`AuthError`](missive_core::AuthError)s and reach
//! the error dispatcher unchanged:
//!
//! | Failure | Status |
//! |---------|--------|
//! | missing, invalid or unknown token | 401 |
//! | expired token | 401 `Token expired` |
//! | wrong credentials | 401 `Invalid email or password` |
//! | rejected (e.g. email taken) | 400 with the provider's message |
//! | provider unavailable | 503 |

#![doc(html_root_url = "https://docs.rs/missive-auth/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod model;
mod provider;
pub mod routes;
pub mod schema;

pub use model::{AuthSession, Session, SessionInfo, User};
pub use provider::{AuthProvider, AuthResult};
pub use routes::{AuthRoutes, AUTH_PREFIX, AUTH_RATE_LIMITER};
pub use schema::{sign_in_schema, sign_up_schema, update_profile_schema};
