//! Telemetry stage.
//!
//! Opens a `request` span carrying the request ID, logs the start and the
//! completion of every request, and records the request counter and
//! duration histogram of [`missive_telemetry::metrics`].
//!
//! The stage sits outside error dispatch, so the status it records is the
//! one the client receives.

use crate::middleware::{BoxFuture, Middleware, Next, StageResult};
use missive_core::RequestContext;
use missive_telemetry::metrics::record_request;
use std::time::Instant;
use tracing::Instrument;

/// Summary of a finished request, stored on the context.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSummary {
    /// HTTP method.
    pub method: String,
    /// Path without the query string.
    pub path: String,
    /// Final status code.
    pub status_code: u16,
    /// Time spent in the pipeline, in milliseconds.
    pub duration_ms: f64,
}

/// Stage that emits request logs and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryMiddleware {
    service_name: String,
}

impl TelemetryMiddleware {
    /// Creates the stage for `service_name`.
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Returns the service name attached to the request span.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Middleware for TelemetryMiddleware {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        let method = ctx.method().to_string();
        let path = ctx.uri().path().to_string();
        let span = tracing::info_span!(
            "request",
            service = %self.service_name,
            request_id = %ctx.request_id(),
            http.method = %method,
            http.path = %path,
        );

        Box::pin(
            async move {
                let start = Instant::now();
                tracing::debug!("Request started");

                let result = next.run(ctx).await;
                let duration = start.elapsed();

                let response = match result {
                    Ok(response) => response,
                    Err(failure) => {
                        tracing::warn!(
                            duration_ms = duration.as_secs_f64() * 1000.0,
                            error = %failure,
                            "Request left the pipeline without a response"
                        );
                        return Err(failure);
                    }
                };

                let status_code = response.status().as_u16();
                let duration_ms = duration.as_secs_f64() * 1000.0;
                tracing::info!(
                    http.status_code = status_code,
                    duration_ms,
                    "Request completed"
                );

                record_request(&method, status_code, duration);

                ctx.set_extension(RequestSummary {
                    method,
                    path,
                    status_code,
                    duration_ms,
                });
                Ok(response)
            }
            .instrument(span),
        )
    }
}
