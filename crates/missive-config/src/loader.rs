//! Layered configuration loader.
//!
//! Layers, later ones winning:
//!
//! 1. the defaults or a preset
//! 2. a TOML or JSON file (or string), merged field by field
//! 3. environment variables `MISSIVE__SECTION__KEY`
//!
//! The result is validated by [`load`](ConfigLoader::load).

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use missive_core::RuntimeMode;
use serde_json::Value;

use crate::{ConfigError, MissiveConfig};

/// Default prefix of environment overrides.
pub const DEFAULT_ENV_PREFIX: &str = "MISSIVE";

/// Configuration loader.
///
/// # Example
///
/// ```
/// use missive_config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_string(r#"
///         [server]
///         http_addr = "127.0.0.1:3000"
///     "#, "toml")
///     .unwrap()
///     .with_env_vars([("MISSIVE__RATE_LIMIT__MAX_REQUESTS", "250")])
///     .load()
///     .unwrap();
///
/// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
/// assert_eq!(config.rate_limit.max_requests, Some(250));
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: MissiveConfig,
    env_prefix: String,
    env_vars: Option<BTreeMap<String, String>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: MissiveConfig::default(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            env_vars: None,
        }
    }

    /// Starts from the preset for `mode`.
    #[must_use]
    pub fn with_preset(mut self, mode: RuntimeMode) -> Self {
        self.config = match mode {
            RuntimeMode::Development => MissiveConfig::development(),
            RuntimeMode::Production => MissiveConfig::production(),
            RuntimeMode::Test => MissiveConfig::test(),
        };
        self
    }

    /// Merges a TOML or JSON file, chosen by extension.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unreadable, malformed, or declares an
    /// unknown field.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        self.with_string(&content, &format)
    }

    /// Merges a file if it exists.
    ///
    /// # Errors
    ///
    /// Fails like [`with_file`](Self::with_file) when the file exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Merges configuration text in `format` (`"toml"` or `"json"`).
    ///
    /// # Errors
    ///
    /// Fails on malformed input, an unknown field, or an unknown format.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer: Value = match format.to_ascii_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };

        let mut merged = serde_json::to_value(&self.config)?;
        merge(&mut merged, layer);
        self.config = serde_json::from_value(merged)?;
        Ok(self)
    }

    /// Loads a `.env` file into the process environment, if present.
    ///
    /// `.env.test` is used in test mode, `.env` otherwise. Variables already
    /// set in the environment are kept.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        let file = if self.config.environment == RuntimeMode::Test {
            ".env.test"
        } else {
            ".env"
        };
        match dotenvy::from_filename(file) {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Sets the environment variable prefix.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_ascii_uppercase();
        self
    }

    /// Reads overrides from `vars` instead of the process environment.
    #[must_use]
    pub fn with_env_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Fails on an unparsable override or an invalid final configuration.
    pub fn load(self) -> Result<MissiveConfig, ConfigError> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides without validating.
    ///
    /// # Errors
    ///
    /// Fails on an unparsable override.
    pub fn load_unvalidated(mut self) -> Result<MissiveConfig, ConfigError> {
        let vars = match self.env_vars.take() {
            Some(vars) => vars,
            None => env::vars().collect(),
        };

        let marker = format!("{}__", self.env_prefix);
        for (key, value) in &vars {
            if let Some(path) = key.strip_prefix(&marker) {
                self.apply_env_var(key, path, value)?;
            }
        }
        Ok(self.config)
    }

    fn apply_env_var(&mut self, key: &str, path: &str, value: &str) -> Result<(), ConfigError> {
        let parts: Vec<&str> = path.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["ENVIRONMENT"] => {
                config.environment = value
                    .parse()
                    .map_err(|e: String| ConfigError::env_parse_error(key, e))?;
            }
            ["SERVICE_NAME"] => config.service_name = value.to_string(),

            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                config.server.shutdown_timeout_secs = parse_int(key, value)?;
            }
            ["SERVER", "TRUST_REQUEST_ID"] => config.server.trust_request_id = parse_bool(key, value)?,

            ["LOGGING", "ENABLED"] => config.logging.enabled = parse_bool(key, value)?,
            ["LOGGING", "LEVEL"] => config.logging.level = non_empty(value),
            ["LOGGING", "FORMAT"] => {
                config.logging.format = Some(
                    value
                        .parse()
                        .map_err(|e: String| ConfigError::env_parse_error(key, e))?,
                );
            }
            ["LOGGING", "ANSI"] => config.logging.ansi = Some(parse_bool(key, value)?),

            ["RATE_LIMIT", "ENABLED"] => config.rate_limit.enabled = parse_bool(key, value)?,
            ["RATE_LIMIT", "WINDOW_SECS"] => config.rate_limit.window_secs = parse_int(key, value)?,
            ["RATE_LIMIT", "MAX_REQUESTS"] => {
                config.rate_limit.max_requests = Some(parse_int(key, value)?);
            }
            ["RATE_LIMIT", "AUTH_MAX_REQUESTS"] => {
                config.rate_limit.auth_max_requests = Some(parse_int(key, value)?);
            }

            ["AUTH", "SECRET"] => config.auth.secret = non_empty(value),
            ["AUTH", "SESSION_TTL_DAYS"] => config.auth.session_ttl_days = parse_int(key, value)?,

            _ => return Err(ConfigError::env_parse_error(key, "unknown configuration key")),
        }
        Ok(())
    }
}

/// Deep-merges `layer` into `base`. Objects merge key by key; any other
/// value replaces.
fn merge(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse_error(key, "expected boolean")),
    }
}

fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected non-negative integer"))
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
