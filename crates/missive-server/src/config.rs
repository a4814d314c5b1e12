//! Listener settings.
//!
//! ```rust
//! use missive_server::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::builder()
//!     .http_addr("127.0.0.1:8000")
//!     .shutdown_timeout(Duration::from_secs(10))
//!     .build();
//!
//! assert_eq!(config.socket_addr().unwrap().port(), 8000);
//! ```

use crate::error::ServerError;
use std::net::SocketAddr;
use std::time::Duration;

/// Address the server listens on unless told otherwise.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8000";

/// Seconds in-flight connections get to finish after a shutdown signal.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Where to listen and how long to drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    http_addr: String,
    shutdown_timeout: Duration,
}

impl ServerConfig {
    /// Starts from the defaults.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured listen address, unparsed.
    #[must_use]
    pub fn http_addr(&self) -> &str {
        &self.http_addr
    }

    /// The listen address as a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        self.http_addr
            .parse()
            .map_err(|source| ServerError::InvalidAddress {
                addr: self.http_addr.clone(),
                source,
            })
    }

    /// Drain deadline after a shutdown signal.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        }
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Listen on `addr`, e.g. `"127.0.0.1:0"` for an ephemeral port.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.http_addr = addr.into();
        self
    }

    /// Give in-flight connections `timeout` to finish.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config, ServerConfig::builder().build());
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(config.socket_addr().unwrap().port(), 8000);
    }

    #[test]
    fn test_invalid_addr() {
        let config = ServerConfig::builder().http_addr("localhost").build();
        assert!(matches!(
            config.socket_addr(),
            Err(ServerError::InvalidAddress { addr, .. }) if addr == "localhost"
        ));
    }
}
