//! Process-wide application context.
//!
//! The [`AppContext`] is built once at startup and handed to every component
//! that needs to know the runtime mode. Nothing reads the mode from ambient
//! process state after bootstrap.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The mode the process runs in.
///
/// The mode decides how much failure detail reaches clients: only
/// [`RuntimeMode::Development`] exposes internal messages and traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Local development with verbose failure bodies.
    #[default]
    Development,
    /// Production deployment.
    Production,
    /// Automated test runs.
    Test,
}

impl RuntimeMode {
    /// Returns `true` when internal failure detail may be exposed.
    #[must_use]
    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns `true` in production.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Returns the lowercase name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(format!(
                "unknown runtime mode '{other}', expected development, production, or test"
            )),
        }
    }
}

/// Process-wide context shared read-only by all requests.
///
/// # Example
///
/// ```
/// use missive_core::{AppContext, RuntimeMode};
///
/// let app = AppContext::new(RuntimeMode::Production).with_service_name("billing");
/// assert!(!app.mode().is_development());
/// assert_eq!(app.generic_error_message(), "Something went wrong");
/// ```
#[derive(Debug, Clone)]
pub struct AppContext {
    mode: RuntimeMode,
    service_name: String,
    generic_error_message: String,
}

impl AppContext {
    /// Message returned for unclassified failures outside development.
    pub const GENERIC_ERROR_MESSAGE: &'static str = "Something went wrong";

    /// Creates a context for the given mode.
    #[must_use]
    pub fn new(mode: RuntimeMode) -> Self {
        Self {
            mode,
            service_name: "missive".to_string(),
            generic_error_message: Self::GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    /// Creates a development context.
    #[must_use]
    pub fn development() -> Self {
        Self::new(RuntimeMode::Development)
    }

    /// Creates a production context.
    #[must_use]
    pub fn production() -> Self {
        Self::new(RuntimeMode::Production)
    }

    /// Sets the service name used in logs.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Overrides the message used for redacted failures.
    #[must_use]
    pub fn with_generic_error_message(mut self, message: impl Into<String>) -> Self {
        self.generic_error_message = message.into();
        self
    }

    /// Returns the runtime mode.
    #[must_use]
    pub const fn mode(&self) -> RuntimeMode {
        self.mode
    }

    /// Returns the service name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Returns the message used for redacted failures.
    #[must_use]
    pub fn generic_error_message(&self) -> &str {
        &self.generic_error_message
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::development()
    }
}
