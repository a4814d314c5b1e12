//! Failure capture around a handler.
//!
//! [`AsyncBoundary::run`] drives a handler to completion and guarantees that
//! whatever goes wrong inside it comes out as exactly one [`Failure`]:
//!
//! - a panic while the handler builds its future,
//! - a panic while the future is polled, before or after a suspension point,
//! - an `Err` returned once the future resumes,
//! - an explicit forward through the request's [`Forwarder`].
//!
//! All of these go through the request's [`FailureSlot`], which accepts the
//! first failure and drops the rest. When the boundary returns, the slot is
//! closed, so a detached task forwarding later is dropped and logged.
//!
//! [`Forwarder`]: missive_core::Forwarder
//! [`FailureSlot`]: missive_core::FailureSlot

use futures_util::FutureExt;
use missive_core::{BoxedHandler, Failure, Reply, RequestContext};
use std::any::Any;
use std::panic::AssertUnwindSafe;

/// Runs handlers with exactly-once failure capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsyncBoundary;

impl AsyncBoundary {
    /// Runs `handler` for `ctx`.
    ///
    /// Returns the handler's reply only if it completed normally and nothing
    /// was forwarded; otherwise returns the first captured failure.
    pub async fn run(handler: &BoxedHandler, ctx: RequestContext) -> Result<Reply, Failure> {
        let slot = ctx.failure_slot().clone();
        let method = ctx.method().clone();
        let url = ctx.path_and_query().to_string();
        let user_agent = ctx.header("user-agent").unwrap_or_default().to_string();
        let request_id = ctx.request_id();

        let polled = match std::panic::catch_unwind(AssertUnwindSafe(|| handler.call(ctx))) {
            Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
            Err(payload) => Err(payload),
        };

        let reply = match polled {
            Ok(Ok(reply)) => Some(reply),
            Ok(Err(failure)) => {
                slot.fill(failure);
                None
            }
            Err(payload) => {
                let message = panic_payload_to_string(payload.as_ref());
                tracing::error!(
                    request_id = %request_id,
                    http.method = %method,
                    url = %url,
                    panic = %message,
                    "Handler panicked"
                );
                slot.fill(Failure::panic(message));
                None
            }
        };
        slot.close();

        match slot.take() {
            Some(failure) => {
                tracing::debug!(
                    request_id = %request_id,
                    http.method = %method,
                    url = %url,
                    user_agent = %user_agent,
                    error = %failure,
                    source = failure.source_label(),
                    "Error in route handler"
                );
                Err(failure)
            }
            None => reply.ok_or_else(|| Failure::internal("Handler failure was already consumed")),
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
