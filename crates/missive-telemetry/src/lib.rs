//! Logging and metrics for Missive.
//!
//! - **Logging**: [`init_logging`] installs a `tracing-subscriber` with an
//!   `EnvFilter`; JSON in production, pretty in development
//! - **Metrics**: request, failure and rate-limit counters through the
//!   `metrics` facade
//! - **Fields**: the standard structured log field names in [`fields`]
//!
//! # Example
//!
//! ```rust,ignore
//! use missive_core::RuntimeMode;
//! use missive_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::for_mode(RuntimeMode::Development))?;
//! ```

#![doc(html_root_url = "https://docs.rs/missive-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
