//! Configuration sections.
//!
//! Every section rejects unknown fields. Fields left as `None` take the
//! default of the runtime mode when resolved.

use missive_core::RuntimeMode;
use missive_telemetry::{LogConfig, LogFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Server section.
///
/// # Example
///
/// ```
/// use missive_config::ServerSection;
///
/// let server = ServerSection::default();
/// assert_eq!(server.http_addr, "0.0.0.0:8000");
/// assert_eq!(server.shutdown_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// HTTP bind address.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Whether incoming `x-request-id` headers are propagated.
    #[serde(default = "default_true")]
    pub trust_request_id: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            trust_request_id: true,
        }
    }
}

impl ServerSection {
    /// Returns the shutdown timeout as a duration.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Whether to install a subscriber.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive. Defaults to `debug` in development, `warn` otherwise.
    #[serde(default)]
    pub level: Option<String>,

    /// Output format. Defaults to pretty in development, JSON in production.
    #[serde(default)]
    pub format: Option<LogFormat>,

    /// ANSI colors for text formats.
    #[serde(default)]
    pub ansi: Option<bool>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: None,
            format: None,
            ansi: None,
        }
    }
}

impl LoggingSection {
    /// Resolves the section against the defaults of `mode`.
    #[must_use]
    pub fn resolve(&self, mode: RuntimeMode) -> LogConfig {
        let mut config = LogConfig::for_mode(mode);
        config.enabled = self.enabled;
        if let Some(level) = &self.level {
            config.level.clone_from(level);
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(ansi) = self.ansi {
            config.ansi = ansi;
        }
        config
    }
}

/// Rate-limit section.
///
/// Limits default to 100 requests (5 for auth) per 15 minutes in
/// production, and 1000 (50 for auth) elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSection {
    /// Whether the global limiter is installed.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Requests per window for the global limiter.
    #[serde(default)]
    pub max_requests: Option<u32>,

    /// Requests per window for the auth limiter.
    #[serde(default)]
    pub auth_max_requests: Option<u32>,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: default_window_secs(),
            max_requests: None,
            auth_max_requests: None,
        }
    }
}

fn default_window_secs() -> u64 {
    15 * 60
}

impl RateLimitSection {
    /// Returns the window as a duration.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Global requests per window for `mode`.
    #[must_use]
    pub fn max_requests_for(&self, mode: RuntimeMode) -> u32 {
        self.max_requests
            .unwrap_or(if mode.is_production() { 100 } else { 1000 })
    }

    /// Auth requests per window for `mode`.
    #[must_use]
    pub fn auth_max_requests_for(&self, mode: RuntimeMode) -> u32 {
        self.auth_max_requests
            .unwrap_or(if mode.is_production() { 5 } else { 50 })
    }
}

/// Auth section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthSection {
    /// Secret handed to the auth provider. Required in production.
    #[serde(default)]
    pub secret: Option<String>,

    /// Session lifetime in days.
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: u32,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            secret: None,
            session_ttl_days: default_session_ttl_days(),
        }
    }
}

fn default_session_ttl_days() -> u32 {
    30
}

impl AuthSection {
    /// Minimum accepted secret length.
    pub const MIN_SECRET_LEN: usize = 6;

    /// Returns the session lifetime as a duration.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.session_ttl_days) * 24 * 60 * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_defaults_by_mode() {
        let section = RateLimitSection::default();
        assert_eq!(section.window(), Duration::from_secs(900));
        assert_eq!(section.max_requests_for(RuntimeMode::Production), 100);
        assert_eq!(section.max_requests_for(RuntimeMode::Development), 1000);
        assert_eq!(section.auth_max_requests_for(RuntimeMode::Production), 5);
        assert_eq!(section.auth_max_requests_for(RuntimeMode::Test), 50);

        let pinned = RateLimitSection {
            auth_max_requests: Some(3),
            ..RateLimitSection::default()
        };
        assert_eq!(pinned.auth_max_requests_for(RuntimeMode::Development), 3);
    }

    #[test]
    fn test_logging_resolution() {
        let section = LoggingSection::default();
        let dev = section.resolve(RuntimeMode::Development);
        assert_eq!(dev.level, "debug");
        assert_eq!(dev.format, LogFormat::Pretty);

        let section = LoggingSection {
            level: Some("info".to_string()),
            format: Some(LogFormat::Compact),
            ..LoggingSection::default()
        };
        let prod = section.resolve(RuntimeMode::Production);
        assert_eq!(prod.level, "info");
        assert_eq!(prod.format, LogFormat::Compact);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<ServerSection, _> =
            serde_json::from_str(r#"{"http_addr": "127.0.0.1:1", "port": 80}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_session_ttl() {
        assert_eq!(
            AuthSection::default().session_ttl(),
            Duration::from_secs(30 * 86_400)
        );
    }
}
