//! The root configuration type and its presets.

use std::sync::Arc;

use missive_core::{AppContext, RuntimeMode};
use serde::{Deserialize, Serialize};

use crate::{AuthSection, ConfigError, LoggingSection, RateLimitSection, ServerSection};

/// Complete Missive service configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to layer files and environment
/// variables over the defaults.
///
/// # Example
///
/// ```
/// use missive_config::MissiveConfig;
/// use missive_core::RuntimeMode;
///
/// let config = MissiveConfig::production();
/// assert_eq!(config.environment, RuntimeMode::Production);
/// assert_eq!(config.rate_limit.auth_max_requests_for(config.environment), 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MissiveConfig {
    /// Runtime mode.
    #[serde(default)]
    pub environment: RuntimeMode,

    /// Service name used in logs and the health route.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// HTTP server.
    #[serde(default)]
    pub server: ServerSection,

    /// Log subscriber.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitSection,

    /// Auth provider.
    #[serde(default)]
    pub auth: AuthSection,
}

fn default_service_name() -> String {
    "missive".to_string()
}

impl Default for MissiveConfig {
    fn default() -> Self {
        Self::for_mode(RuntimeMode::default())
    }
}

impl MissiveConfig {
    /// Defaults for `mode`.
    #[must_use]
    pub fn for_mode(mode: RuntimeMode) -> Self {
        Self {
            environment: mode,
            service_name: default_service_name(),
            server: ServerSection::default(),
            logging: LoggingSection::default(),
            rate_limit: RateLimitSection::default(),
            auth: AuthSection::default(),
        }
    }

    /// Development preset.
    #[must_use]
    pub fn development() -> Self {
        Self::for_mode(RuntimeMode::Development)
    }

    /// Production preset.
    ///
    /// The auth secret is left unset and must be supplied before
    /// [`validate`](Self::validate) passes.
    #[must_use]
    pub fn production() -> Self {
        Self::for_mode(RuntimeMode::Production)
    }

    /// Test preset: loopback address, no rate limiting, short shutdown.
    #[must_use]
    pub fn test() -> Self {
        let mut config = Self::for_mode(RuntimeMode::Test);
        config.server.http_addr = "127.0.0.1:0".to_string();
        config.server.shutdown_timeout_secs = 1;
        config.rate_limit.enabled = false;
        config
    }

    /// Builds the process-wide application context.
    #[must_use]
    pub fn app_context(&self) -> Arc<AppContext> {
        Arc::new(AppContext::new(self.environment).with_service_name(&self.service_name))
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::invalid_value("service_name", "must not be empty"));
        }

        if self.server.http_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::invalid_value(
                "rate_limit.window_secs",
                "must be at least 1",
            ));
        }
        let limits = [
            ("rate_limit.max_requests", self.rate_limit.max_requests),
            ("rate_limit.auth_max_requests", self.rate_limit.auth_max_requests),
        ];
        if let Some((field, _)) = limits.iter().find(|(_, limit)| *limit == Some(0)) {
            return Err(ConfigError::invalid_value(*field, "must be at least 1"));
        }

        match &self.auth.secret {
            Some(secret) if secret.chars().count() < AuthSection::MIN_SECRET_LEN => {
                return Err(ConfigError::invalid_value(
                    "auth.secret",
                    format!(
                        "must be at least {} characters",
                        AuthSection::MIN_SECRET_LEN
                    ),
                ));
            }
            None if self.environment.is_production() => {
                return Err(ConfigError::invalid_value("auth.secret", "must be set"));
            }
            _ => {}
        }

        if self.auth.session_ttl_days == 0 {
            return Err(ConfigError::invalid_value(
                "auth.session_ttl_days",
                "must be at least 1",
            ));
        }

        if self.logging.enabled {
            let level = self.logging.resolve(self.environment).level;
            missive_telemetry::create_env_filter(&level)
                .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;
        }

        Ok(())
    }
}
