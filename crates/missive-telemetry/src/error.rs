//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while setting up telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log filter directive could not be parsed.
    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter {
        /// The rejected directive.
        directive: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::LoggingInit("already set".to_string());
        assert_eq!(err.to_string(), "Failed to initialize logging: already set");

        let err = TelemetryError::InvalidFilter {
            directive: "=".to_string(),
            reason: "empty target".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid log filter '=': empty target");
    }
}
