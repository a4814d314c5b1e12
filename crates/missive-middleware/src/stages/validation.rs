//! Request validation stage.
//!
//! Checks the request against the route's [`ValidationSchema`] before the
//! handler runs. On success the declared parts of the context are replaced
//! with their normalized form. On failure the stage answers 400 itself with
//! every violation under `data.errors`; the handler never runs and the
//! dispatcher is not involved.

use crate::middleware::{BoxFuture, Middleware, Next, StageResult};
use crate::schema::ValidationSchema;
use http::StatusCode;
use missive_core::envelope::render;
use missive_core::RequestContext;
use serde_json::json;
use std::sync::Arc;

/// Message of the 400 envelope produced for schema violations.
pub const VALIDATION_FAILED_MESSAGE: &str = "Validation failed";

/// Stage that validates a request against a schema.
#[derive(Debug, Clone)]
pub struct ValidationMiddleware {
    schema: Arc<ValidationSchema>,
}

impl ValidationMiddleware {
    /// Creates the stage for `schema`.
    #[must_use]
    pub fn new(schema: impl Into<Arc<ValidationSchema>>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &ValidationSchema {
        &self.schema
    }
}

impl Middleware for ValidationMiddleware {
    fn name(&self) -> &'static str {
        "validation"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            match self.schema.validate(ctx.parts()) {
                Ok(normalized) => {
                    *ctx.parts_mut() = normalized;
                    next.run(ctx).await
                }
                Err(violations) => {
                    tracing::debug!(
                        request_id = %ctx.request_id(),
                        violations = violations.len(),
                        first = %violations[0],
                        "Request rejected by schema"
                    );
                    Ok(render(
                        StatusCode::BAD_REQUEST,
                        Some(VALIDATION_FAILED_MESSAGE),
                        Some(json!({ "errors": violations })),
                    ))
                }
            }
        })
    }
}
