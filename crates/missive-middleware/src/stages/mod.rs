//! Built-in pipeline stages.
//!
//! ## Global stages
//!
//! 1. [`request_id`] - Propagate or generate the request ID
//! 2. [`telemetry`] - Request span, logs and metrics
//! 3. [`error_dispatch`] - Turn failures into envelopes
//! 4. [`rate_limit`] - Optional global limiter
//!
//! ## Route stages
//!
//! - [`rate_limit`] - Per-route limiters such as the auth limiter
//! - [`validation`] - Schema validation, always last before the handler

pub mod error_dispatch;
pub mod rate_limit;
pub mod request_id;
pub mod telemetry;
pub mod validation;

pub use error_dispatch::ErrorDispatchMiddleware;
pub use rate_limit::{KeyExtractor, RateLimitBuilder, RateLimitDecision, RateLimitMiddleware};
pub use request_id::{RequestIdMiddleware, REQUEST_ID_HEADER};
pub use telemetry::{RequestSummary, TelemetryMiddleware};
pub use validation::ValidationMiddleware;
