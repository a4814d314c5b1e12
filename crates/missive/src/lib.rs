//! # Missive
//!
//! **Uniform JSON envelopes, declarative request validation, and failure
//! classification for HTTP services.**
//!
//! Every response, success or failure, has the same shape:
//!
//! ```json
//! { "success": false, "message": "Validation failed", "data": { "errors": [...] } }
//! ```
//!
//! and `success` is false exactly when the status is 400 or above.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use missive::prelude::*;
//!
//! async fn create_item(ctx: RequestContext) -> Result<Reply, Failure> {
//!     Ok(Reply::created().message("Item created").data(ctx.body().clone()))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().with_dotenv()?.with_optional_file("missive.toml")?.load()?;
//!     let context = missive::bootstrap(&config)?;
//!
//!     let mut router = Router::new();
//!     router.post("/items", Endpoint::new(create_item).validate(item_schema()))?;
//!
//!     missive::build_server(&config, context, router)?.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Every request runs through a fixed pipeline:
//!
//! ```text
//! Request → RequestId → Telemetry → ErrorDispatch → RateLimit → Route stages → Validation → Handler
//! ```
//!
//! Handler failures travel outward as `Err(Failure)` and are turned into an
//! envelope in one place, the error dispatcher.

#![doc(html_root_url = "https://docs.rs/missive/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bootstrap;

pub use bootstrap::{
    auth_routes, bootstrap, build_app, build_server, global_rate_limiter, server_config,
    BootstrapError, GLOBAL_RATE_LIMITER,
};

// Re-export core types
pub use missive_core as core;

// Re-export middleware types
pub use missive_middleware as middleware;

// Re-export server types
pub use missive_server as server;

// Re-export telemetry
pub use missive_telemetry as telemetry;

// Re-export configuration
pub use missive_config as config;

// Re-export auth
pub use missive_auth as auth;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use missive::prelude::*;
/// ```
pub mod prelude {
    pub use missive_core::{
        AppContext, AuthError, Failure, FailureResult, Reply, RequestContext, RequestId,
        RuntimeMode, StorageError,
    };

    pub use missive_middleware::{
        Check, Endpoint, FieldRule, Middleware, ObjectShape, StringFormat, ValidationSchema,
    };

    pub use missive_server::{App, Router, Server, ServerConfig, ShutdownSignal};

    pub use missive_config::{ConfigLoader, MissiveConfig};

    pub use missive_auth::{AuthProvider, AuthRoutes, AuthSession, SessionInfo};
}
