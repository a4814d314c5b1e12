//! Error dispatch stage.
//!
//! Every `Err` coming back from the inner stages or the handler is handed to
//! the [`Dispatcher`] here and becomes a rendered response. Stages outside
//! this one only ever see responses.

use crate::dispatch::Dispatcher;
use crate::middleware::{BoxFuture, Middleware, Next, StageResult};
use missive_core::RequestContext;
use std::sync::Arc;

/// Stage that turns failures into envelopes.
#[derive(Debug, Clone)]
pub struct ErrorDispatchMiddleware {
    dispatcher: Arc<Dispatcher>,
}

impl ErrorDispatchMiddleware {
    /// Creates the stage around `dispatcher`.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl Middleware for ErrorDispatchMiddleware {
    fn name(&self) -> &'static str {
        "error_dispatch"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            match next.run(ctx).await {
                Ok(response) => Ok(response),
                Err(failure) => Ok(self.dispatcher.dispatch(ctx, failure)),
            }
        })
    }
}
