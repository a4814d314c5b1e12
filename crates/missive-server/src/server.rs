//! HTTP server.
//!
//! A Hyper HTTP/1.1 server in front of an [`App`]. Each connection runs on
//! its own task; each request body is collected and handed to
//! [`App::handle_from`] together with the peer address.
//!
//! On shutdown the accept loop stops, connections are asked to finish their
//! in-flight request, and the server waits up to the configured timeout for
//! them to close.
//!
//! # Example
//!
//! ```rust,no_run
//! use missive_core::AppContext;
//! use missive_server::{App, Router, Server, ServerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = App::builder(Arc::new(AppContext::production()))
//!         .router(Router::new())
//!         .build()?;
//!
//!     Server::new(ServerConfig::default(), app).run().await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::pin;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use missive_core::envelope::render;
use missive_core::Response;
use tokio::net::TcpListener;

use crate::app::App;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// The Missive HTTP server.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    app: Arc<App>,
}

impl Server {
    /// Creates a server for `app`.
    #[must_use]
    pub fn new(config: ServerConfig, app: App) -> Self {
        Self {
            config,
            app: Arc::new(app),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the application.
    #[must_use]
    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    /// Runs until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and serves until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.serve(listener, shutdown).await;
        Ok(())
    }

    /// Serves connections from an already bound listener until `shutdown`
    /// fires, then drains.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) {
        let local_addr = listener.local_addr().ok();
        tracing::info!(
            addr = ?local_addr,
            service = %self.app.context().service_name(),
            mode = %self.app.context().mode(),
            "Server listening"
        );

        let tracker = ConnectionTracker::new();
        let mut stop = pin!(shutdown.recv());

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let app = Arc::clone(&self.app);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            serve_connection(app, stream, remote_addr, shutdown).await;
                            drop(token);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to accept connection"),
                },
                () = &mut stop => {
                    tracing::info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }
        drop(listener);

        let timeout = self.config.shutdown_timeout();
        tracing::info!(
            timeout_secs = timeout.as_secs(),
            active = tracker.active_connections(),
            "Waiting for connections to close"
        );

        tokio::select! {
            () = tracker.wait_for_shutdown() => tracing::info!("All connections closed"),
            () = tokio::time::sleep(timeout) => tracing::warn!(
                active = tracker.active_connections(),
                "Shutdown timeout reached with connections still open"
            ),
        }

        tracing::info!("Server stopped");
    }
}

async fn serve_connection(
    app: Arc<App>,
    stream: tokio::net::TcpStream,
    remote_addr: SocketAddr,
    shutdown: ShutdownSignal,
) {
    let service = service_fn(move |request: Request<Incoming>| {
        let app = Arc::clone(&app);
        async move { Ok::<_, Infallible>(handle_request(&app, request, remote_addr).await) }
    });

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    let mut conn = pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                tracing::debug!(%remote_addr, error = %e, "Connection closed with error");
            }
        }
        () = shutdown.recv() => {
            conn.as_mut().graceful_shutdown();
            if let Err(e) = conn.await {
                tracing::debug!(%remote_addr, error = %e, "Connection closed with error during shutdown");
            }
        }
    }
}

async fn handle_request(app: &App, request: Request<Incoming>, remote_addr: SocketAddr) -> Response {
    let (parts, body) = request.into_parts();

    match body.collect().await {
        Ok(collected) => {
            let request = Request::from_parts(parts, collected.to_bytes());
            app.handle_from(request, Some(remote_addr)).await
        }
        Err(e) => {
            tracing::warn!(%remote_addr, error = %e, "Failed to read request body");
            render(StatusCode::BAD_REQUEST, Some("Failed to read request body"), None)
        }
    }
}

/// Bytes of a response body, for callers that need to inspect it.
pub async fn body_bytes(response: Response) -> Bytes {
    match response.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    }
}
