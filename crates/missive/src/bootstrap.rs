//! Process startup from a [`MissiveConfig`].
//!
//! Startup failures (invalid configuration, logging already installed, bad
//! bind address) come back as [`BootstrapError`] so `main` decides whether
//! to exit.

use missive_auth::{AuthProvider, AuthRoutes};
use missive_config::{ConfigError, MissiveConfig};
use missive_core::AppContext;
use missive_middleware::stages::RateLimitMiddleware;
use missive_server::{App, Router, Server, ServerConfig, ServerError};
use missive_telemetry::{init_logging, TelemetryError};
use std::sync::Arc;
use thiserror::Error;

/// Name of the global rate limiter in logs and metrics.
pub const GLOBAL_RATE_LIMITER: &str = "global_rate_limit";

/// A startup failure.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The log subscriber could not be installed.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// The application or server could not be assembled.
    #[error("server error: {0}")]
    Server(#[from] ServerError),
}

/// Validates `config`, installs logging, and returns the application context.
///
/// Call once per process; a second call fails with
/// [`BootstrapError::Telemetry`] while logging is enabled.
///
/// # Example
///
/// ```
/// use missive::bootstrap;
/// use missive_config::MissiveConfig;
///
/// let mut config = MissiveConfig::test();
/// config.logging.enabled = false;
/// let app = bootstrap(&config).unwrap();
/// assert!(!app.mode().is_production());
/// ```
pub fn bootstrap(config: &MissiveConfig) -> Result<Arc<AppContext>, BootstrapError> {
    config.validate()?;
    init_logging(&config.logging.resolve(config.environment))?;
    missive_telemetry::metrics::describe_metrics();

    tracing::info!(
        service = %config.service_name,
        environment = %config.environment.as_str(),
        http_addr = %config.server.http_addr,
        "Bootstrapped"
    );
    Ok(config.app_context())
}

/// Builds the global limiter, or `None` when rate limiting is disabled.
#[must_use]
pub fn global_rate_limiter(config: &MissiveConfig) -> Option<RateLimitMiddleware> {
    let section = &config.rate_limit;
    section.enabled.then(|| {
        RateLimitMiddleware::builder()
            .name(GLOBAL_RATE_LIMITER)
            .limit(u64::from(section.max_requests_for(config.environment)))
            .window(section.window())
            .per_ip()
            .build()
    })
}

/// Builds the auth routes, with the auth limiter when rate limiting is enabled.
pub fn auth_routes(config: &MissiveConfig, provider: Arc<dyn AuthProvider>) -> AuthRoutes {
    let routes = AuthRoutes::new(provider);
    let section = &config.rate_limit;
    if section.enabled {
        routes.rate_limit(
            u64::from(section.auth_max_requests_for(config.environment)),
            section.window(),
        )
    } else {
        routes
    }
}

/// Assembles the application from `router` using the configured pipeline options.
pub fn build_app(
    config: &MissiveConfig,
    context: Arc<AppContext>,
    router: Router,
) -> Result<App, BootstrapError> {
    let mut builder = App::builder(context)
        .router(router)
        .trust_request_id(config.server.trust_request_id);
    if let Some(limiter) = global_rate_limiter(config) {
        builder = builder.rate_limit(limiter);
    }
    Ok(builder.build()?)
}

/// Returns the server settings of `config`.
#[must_use]
pub fn server_config(config: &MissiveConfig) -> ServerConfig {
    ServerConfig::builder()
        .http_addr(config.server.http_addr.clone())
        .shutdown_timeout(config.server.shutdown_timeout())
        .build()
}

/// Assembles the application and wraps it in a server.
pub fn build_server(
    config: &MissiveConfig,
    context: Arc<AppContext>,
    router: Router,
) -> Result<Server, BootstrapError> {
    let app = build_app(config, context, router)?;
    Ok(Server::new(server_config(config), app))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use missive_core::RuntimeMode;
    use missive_test::{MemoryAuthProvider, TestClient};
    use serde_json::json;
    use std::time::Duration;

    fn quiet(mut config: MissiveConfig) -> MissiveConfig {
        config.logging.enabled = false;
        config
    }

    #[test]
    fn test_bootstrap_rejects_invalid_config() {
        let config = quiet(MissiveConfig::production());
        let err = bootstrap(&config).unwrap_err();
        assert!(matches!(err, BootstrapError::Config(_)));
        assert!(err.to_string().contains("auth.secret"));
    }

    #[test]
    fn test_bootstrap_returns_context() {
        let mut config = quiet(MissiveConfig::production());
        config.auth.secret = Some("s3cr3t-value".to_string());
        config.service_name = "accounts".to_string();
        let app = bootstrap(&config).unwrap();
        assert!(app.mode().is_production());
        assert_eq!(app.service_name(), "accounts");
    }

    #[test]
    fn test_global_rate_limiter_follows_config() {
        let config = MissiveConfig::production();
        let limiter = global_rate_limiter(&config).unwrap();
        assert_eq!(limiter.limit(), 100);
        assert_eq!(limiter.window(), Duration::from_secs(900));

        assert!(global_rate_limiter(&MissiveConfig::test()).is_none());
    }

    #[test]
    fn test_server_config() {
        let config = MissiveConfig::test();
        let server = server_config(&config);
        assert_eq!(server.http_addr(), "127.0.0.1:0");
        assert_eq!(server.shutdown_timeout(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_auth_limiter_from_config() {
        let mut config = MissiveConfig::for_mode(RuntimeMode::Test);
        config.rate_limit.auth_max_requests = Some(1);
        let context = config.app_context();

        let mut router = Router::new();
        auth_routes(&config, Arc::new(MemoryAuthProvider::new()))
            .mount(&mut router)
            .unwrap();
        let client = TestClient::new(build_app(&config, context, router).unwrap());

        let body = json!({"email": "ada@example.com", "password": "wrong"});
        client
            .post("/api/auth/signin")
            .json(&body)
            .send()
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        client
            .post("/api/auth/signin")
            .json(&body)
            .send()
            .await
            .assert_status(StatusCode::TOO_MANY_REQUESTS);
    }
}
