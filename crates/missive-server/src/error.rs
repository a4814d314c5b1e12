//! Server error types.

use thiserror::Error;

/// Errors raised while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured address is not a valid socket address.
    #[error("invalid address '{addr}': {source}")]
    InvalidAddress {
        /// The configured address.
        addr: String,
        /// Parse failure.
        #[source]
        source: std::net::AddrParseError,
    },

    /// Binding the listener failed.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: std::net::SocketAddr,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A route pattern could not be registered.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidRoute {
        /// The rejected pattern.
        pattern: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ServerError::InvalidRoute {
            pattern: "users".to_string(),
            reason: "pattern must start with '/'",
        };
        assert_eq!(
            err.to_string(),
            "invalid route pattern 'users': pattern must start with '/'"
        );
    }
}
