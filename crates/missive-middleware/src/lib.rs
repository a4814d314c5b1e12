//! # Missive Middleware
//!
//! The request pipeline of Missive: schema validation, failure capture,
//! failure classification, and the stages that wrap every request.
//!
//! ## Pipeline Stages
//!
//! ```text
//! Request → RequestId → Telemetry → ErrorDispatch → RateLimit → Route stages → Validation → Boundary(handler)
//!                                        ↑                                                        │
//!                                        └──────────────── Err(Failure) ──────────────────────────┘
//! ```
//!
//! | Stage | Middleware | Purpose |
//! |-------|------------|---------|
//! | 1 | Request ID | Propagate or generate the request ID (UUID v7) |
//! | 2 | Telemetry | Request span, structured logs, metrics |
//! | 3 | Error Dispatch | Classify failures and render the envelope |
//! | 4 | Rate Limit | Optional global sliding-window limiter |
//! | 5 | Route | Per-route stages, then schema validation |
//! | 6 | Boundary | Run the handler with exactly-once failure capture |
//!
//! Schema violations are answered by the validation stage directly. Every
//! other failure travels outward as `Err(Failure)` until error dispatch turns
//! it into a response, so the [`Dispatcher`] is the only place failure status
//! codes are decided.
//!
//! ## Example
//!
//! ```
//! use missive_core::{AppContext, Failure, Reply, RequestContext};
//! use missive_middleware::pipeline::{Endpoint, Pipeline};
//! use missive_middleware::schema::ValidationSchema;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let pipeline = Pipeline::builder(Arc::new(AppContext::production())).build();
//! let schema = ValidationSchema::from_json(r#"{ "body": { "name": { "type": "string", "min": 1 } } }"#).unwrap();
//! let endpoint = Endpoint::new(|ctx: RequestContext| async move {
//!     Ok::<_, Failure>(Reply::created().message("Created").data(ctx.body().clone()))
//! })
//! .validate(schema);
//!
//! let ctx = RequestContext::builder(http::Method::POST, "/things".parse().unwrap())
//!     .body(serde_json::json!({ "name": "" }))
//!     .build();
//! let response = pipeline.process(ctx, Some(&endpoint)).await.unwrap();
//! assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/missive-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod boundary;
pub mod dispatch;
pub mod error;
pub mod middleware;
pub mod not_found;
pub mod pipeline;
pub mod schema;
pub mod stages;

pub use boundary::AsyncBoundary;
pub use dispatch::{Classification, Dispatcher};
pub use error::{ResponseCommitted, SchemaError};
pub use middleware::{BoxFuture, FnMiddleware, Middleware, Next, StageResult};
pub use pipeline::{BoxedMiddleware, Endpoint, Pipeline, PipelineBuilder, Stage};
pub use schema::{Check, FieldRule, FieldType, ObjectShape, StringFormat, ValidationSchema};
