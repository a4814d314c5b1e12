//! # Missive Core
//!
//! Core types shared by every stage of the Missive request pipeline.
//!
//! This crate provides the foundational types used throughout Missive:
//!
//! - [`Failure`] - The closed set of failures a request can end with
//! - [`ErrorKind`] - The taxonomy entry a failure is classified into
//! - [`ResponseEnvelope`] - The uniform `{ success, message, data }` body
//! - [`Reply`] - A successful handler result
//! - [`RequestContext`] - Per-request carrier of input parts and the failure slot
//! - [`AppContext`] - Process-wide runtime mode and naming
//! - [`AuthError`] / [`StorageError`] - Named failures produced by collaborators

#![doc(html_root_url = "https://docs.rs/missive-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod collaborator;
mod context;
pub mod envelope;
mod error;
mod forward;
mod handler;
mod reply;
mod violation;

pub use app::{AppContext, RuntimeMode};
pub use collaborator::{AuthError, AuthErrorKind, StorageError, StorageErrorKind};
pub use context::{RequestContext, RequestContextBuilder, RequestId, RequestParts};
pub use envelope::{Response, ResponseEnvelope};
pub use error::{ErrorKind, Failure, FailureResult, RateLimitRejection};
pub use forward::{FailureSlot, Forwarder};
pub use handler::{handler_fn, BoxFuture, BoxedHandler, Handler};
pub use reply::Reply;
pub use violation::{ViolationCode, ViolationRecord};
