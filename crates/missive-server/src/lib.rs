//! # Missive Server
//!
//! Routing and HTTP serving for Missive.
//!
//! - [`Router`] - ordered `(method, pattern, endpoint)` table, first match wins
//! - [`App`] - decodes a request, resolves its route, runs the pipeline
//! - [`Server`] - Hyper HTTP/1.1 server with graceful shutdown
//!
//! [`App`] is socket-free, so in-memory tests and the server share one
//! request path.
//!
//! ## Example
//!
//! ```rust
//! use bytes::Bytes;
//! use missive_core::{AppContext, Failure, Reply, RequestContext};
//! use missive_middleware::Endpoint;
//! use missive_server::{App, Router};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let mut router = Router::new();
//! router
//!     .get(
//!         "/users/{id}",
//!         Endpoint::new(|ctx: RequestContext| async move {
//!             Ok::<_, Failure>(Reply::ok().data(ctx.params().clone()))
//!         }),
//!     )
//!     .unwrap();
//!
//! let app = App::builder(Arc::new(AppContext::production()))
//!     .router(router)
//!     .build()
//!     .unwrap();
//!
//! let request = http::Request::get("/users/7").body(Bytes::new()).unwrap();
//! let response = app.handle(request).await;
//! assert_eq!(response.status(), http::StatusCode::OK);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/missive-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod app;
pub mod config;
pub mod error;
pub mod router;
pub mod server;
pub mod shutdown;

pub use app::{App, AppBuilder, HEALTH_PATH, MALFORMED_BODY_MESSAGE};
pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::ServerError;
pub use router::{RouteMatch, Router};
pub use server::{body_bytes, Server};
pub use shutdown::{ConnectionTracker, ShutdownSignal};
