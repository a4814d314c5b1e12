//! Request ID stage.
//!
//! Takes the ID from an incoming `x-request-id` header when it holds a valid
//! UUID, otherwise generates a UUID v7. The ID is stored on the context and
//! echoed on every response, including failures rendered further in.

use crate::middleware::{BoxFuture, Middleware, Next, StageResult};
use http::HeaderValue;
use missive_core::{RequestContext, RequestId};

/// The header name for request ID propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Stage that assigns and echoes request IDs.
#[derive(Debug, Clone)]
pub struct RequestIdMiddleware {
    trust_incoming: bool,
}

impl Default for RequestIdMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIdMiddleware {
    /// Creates a stage that propagates valid incoming IDs.
    #[must_use]
    pub const fn new() -> Self {
        Self { trust_incoming: true }
    }

    /// Creates a stage that always generates a fresh ID.
    #[must_use]
    pub const fn generate_only() -> Self {
        Self { trust_incoming: false }
    }

    /// Returns `true` if incoming IDs are propagated.
    #[must_use]
    pub const fn trusts_incoming(&self) -> bool {
        self.trust_incoming
    }

    fn incoming(&self, ctx: &RequestContext) -> Option<RequestId> {
        if !self.trust_incoming {
            return None;
        }
        ctx.header(REQUEST_ID_HEADER).and_then(RequestId::parse)
    }
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            let request_id = self.incoming(ctx).unwrap_or_default();
            ctx.set_request_id(request_id);

            let mut response = next.run(ctx).await?;
            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            Ok(response)
        })
    }
}
