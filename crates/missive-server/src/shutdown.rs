//! Graceful shutdown.
//!
//! [`ShutdownSignal`] fans one trigger out to the accept loop and every
//! connection task. [`ConnectionTracker`] counts live connections so the
//! server can wait for them to drain.
//!
//! ```rust
//! use missive_server::shutdown::{ConnectionTracker, ShutdownSignal};
//!
//! let shutdown = ShutdownSignal::new();
//! let tracker = ConnectionTracker::new();
//!
//! let token = tracker.acquire();
//! assert_eq!(tracker.active_connections(), 1);
//! drop(token);
//!
//! shutdown.trigger();
//! assert!(shutdown.is_shutdown());
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Notify};

/// A cloneable shutdown trigger.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Creates a signal triggered by SIGINT or SIGTERM.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn with_os_signals() -> Self {
        let signal = Self::new();
        let trigger = signal.clone();

        tokio::spawn(async move {
            if wait_for_os_signal().await {
                trigger.trigger();
            }
        });

        signal
    }

    /// Triggers shutdown. Idempotent.
    pub fn trigger(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // No receivers is fine.
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` once shutdown has been triggered.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Returns a future that completes when shutdown is triggered, or
    /// immediately if it already was.
    pub fn recv(&self) -> impl Future<Output = ()> + Send + 'static {
        let triggered = Arc::clone(&self.triggered);
        let mut receiver = self.sender.subscribe();
        async move {
            if triggered.load(Ordering::SeqCst) {
                return;
            }
            // A closed or lagged channel also means the trigger fired.
            let _ = receiver.recv().await;
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for SIGINT or SIGTERM. Returns `false` if no handler could be
/// installed, in which case the caller must not trigger shutdown.
async fn wait_for_os_signal() -> bool {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::error!(error = %e, "Failed to install shutdown signal handlers");
                    return false;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown"),
        }
        true
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                false
            }
        }
    }
}

/// Counts live connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl ConnectionTracker {
    /// Creates a tracker with no connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection. The connection ends when the token drops.
    #[must_use]
    pub fn acquire(&self) -> ConnectionToken {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionToken {
            active: Arc::clone(&self.active),
            notify: Arc::clone(&self.notify),
        }
    }

    /// Returns the number of live connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Completes once no connections remain.
    pub async fn wait_for_shutdown(&self) {
        loop {
            let notified = self.notify.notified();
            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// A live connection registered with a [`ConnectionTracker`].
#[derive(Debug)]
pub struct ConnectionToken {
    active: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl Drop for ConnectionToken {
    fn drop(&mut self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_trigger_is_idempotent_and_shared() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_shutdown());

        signal.trigger();
        signal.trigger();
        assert!(clone.is_shutdown());
    }

    #[tokio::test]
    async fn test_recv_completes_when_triggered() {
        let signal = ShutdownSignal::new();
        let receiver = signal.recv();
        let trigger = signal.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });

        tokio::time::timeout(Duration::from_secs(1), receiver)
            .await
            .expect("recv should complete");
    }

    #[tokio::test]
    async fn test_recv_after_trigger_is_immediate() {
        let signal = ShutdownSignal::new();
        signal.trigger();

        tokio::time::timeout(Duration::from_millis(10), signal.recv())
            .await
            .expect("recv should complete immediately");
    }

    #[test]
    fn test_tracker_counts_tokens() {
        let tracker = ConnectionTracker::new();
        let first = tracker.acquire();
        let second = tracker.acquire();
        assert_eq!(tracker.active_connections(), 2);

        drop(first);
        assert_eq!(tracker.active_connections(), 1);
        drop(second);
        assert_eq!(tracker.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_drains() {
        let tracker = ConnectionTracker::new();
        tokio::time::timeout(Duration::from_millis(10), tracker.wait_for_shutdown())
            .await
            .expect("no connections means no wait");

        let token = tracker.acquire();
        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_for_shutdown().await })
        };

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(token);
        });

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait should complete")
            .expect("task should not panic");
    }
}
