//! Structured logging.
//!
//! Installs the global `tracing` subscriber. Development gets pretty,
//! human-readable output at `debug`; production gets one JSON object per
//! line at `warn`.
//!
//! # Example
//!
//! ```rust,ignore
//! use missive_core::RuntimeMode;
//! use missive_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::for_mode(RuntimeMode::Production))?;
//! tracing::warn!(request_id = "0190...", "Slow request");
//! ```

use std::fmt;
use std::str::FromStr;

use missive_core::RuntimeMode;
use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line, human-readable.
    Pretty,
    /// Single-line, human-readable.
    Compact,
}

impl LogFormat {
    /// Returns the lowercase name of the format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!(
                "unknown log format '{other}', expected json, pretty, or compact"
            )),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether to install a subscriber at all.
    pub enabled: bool,

    /// Filter directive, e.g. `"warn"` or `"missive=debug,hyper=warn"`.
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// Whether to emit ANSI colors (ignored for JSON).
    pub ansi: bool,

    /// Whether to log span open/close events.
    pub span_events: bool,

    /// Whether to include file and line.
    pub file_line_info: bool,

    /// Whether to include the event target.
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Pretty output at `debug`.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            ansi: true,
            span_events: false,
            file_line_info: true,
            include_target: true,
        }
    }

    /// JSON output at `warn`.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "warn".to_string(),
            format: LogFormat::Json,
            ansi: false,
            span_events: false,
            file_line_info: false,
            include_target: true,
        }
    }

    /// Compact output at `warn`, without colors.
    #[must_use]
    pub fn test() -> Self {
        Self {
            enabled: true,
            level: "warn".to_string(),
            format: LogFormat::Compact,
            ansi: false,
            span_events: false,
            file_line_info: false,
            include_target: false,
        }
    }

    /// Returns the defaults for `mode`.
    #[must_use]
    pub fn for_mode(mode: RuntimeMode) -> Self {
        match mode {
            RuntimeMode::Development => Self::development(),
            RuntimeMode::Production => Self::production(),
            RuntimeMode::Test => Self::test(),
        }
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for an unparsable level and
/// [`TelemetryError::LoggingInit`] if a global subscriber already exists.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let base = tracing_subscriber::fmt::layer()
        .with_span_events(span_events)
        .with_file(config.file_line_info)
        .with_line_number(config.file_line_info)
        .with_target(config.include_target);

    let layer = match config.format {
        LogFormat::Json => base
            .json()
            .with_current_span(true)
            .with_ansi(false)
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => base.pretty().with_ansi(config.ansi).with_filter(filter).boxed(),
        LogFormat::Compact => base.compact().with_ansi(config.ansi).with_filter(filter).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Parses a filter directive.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] if the directive is invalid.
pub fn create_env_filter(directive: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(directive).map_err(|e| TelemetryError::InvalidFilter {
        directive: directive.to_string(),
        reason: e.to_string(),
    })
}

/// Standard log field names.
pub mod fields {
    /// Request ID.
    pub const REQUEST_ID: &str = "request_id";

    /// HTTP method.
    pub const HTTP_METHOD: &str = "http.method";

    /// Request path without the query string.
    pub const HTTP_PATH: &str = "http.path";

    /// Response status code.
    pub const HTTP_STATUS: &str = "http.status_code";

    /// Pipeline time in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";

    /// Failure description.
    pub const ERROR: &str = "error";

    /// Classified failure kind.
    pub const ERROR_KIND: &str = "error.kind";

    /// Service name.
    pub const SERVICE_NAME: &str = "service";
}
