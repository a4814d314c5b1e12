//! Typed configuration for Missive services.
//!
//! [`MissiveConfig`] is loaded in layers by [`ConfigLoader`]:
//!
//! 1. defaults, or a preset ([`MissiveConfig::development`],
//!    [`MissiveConfig::production`], [`MissiveConfig::test`])
//! 2. an optional `.env` file
//! 3. a TOML or JSON file, merged field by field
//! 4. `MISSIVE__SECTION__KEY` environment variables
//!
//! then validated. Unknown fields are rejected at every layer.
//!
//! # Example
//!
//! ```toml
//! environment = "production"
//! service_name = "accounts"
//!
//! [server]
//! http_addr = "0.0.0.0:8000"
//! shutdown_timeout_secs = 30
//!
//! [logging]
//! level = "warn"
//! format = "json"
//!
//! [rate_limit]
//! window_secs = 900
//! max_requests = 100
//! auth_max_requests = 5
//!
//! [auth]
//! secret = "change-me"
//! session_ttl_days = 30
//! ```
//!
//! ```no_run
//! use missive_config::ConfigLoader;
//!
//! # fn main() -> Result<(), missive_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()?
//!     .with_optional_file("missive.toml")?
//!     .load()?;
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/missive-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::MissiveConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{AuthSection, LoggingSection, RateLimitSection, ServerSection};
