//! Rate limiting stage.
//!
//! A sliding-window limiter: each key keeps the count of the current window
//! and of the previous one, and the previous count is weighted by how much of
//! it still overlaps the sliding window.
//!
//! Rejections are not rendered here. They leave the stage as
//! [`Failure::RateLimited`] and are turned into a 429 by the dispatcher, which
//! also sets `Retry-After`. Allowed responses carry the `x-ratelimit-*`
//! headers.
//!
//! # Example
//!
//! ```
//! use missive_middleware::stages::RateLimitMiddleware;
//!
//! // 5 attempts per 15 minutes per client IP.
//! let auth_limiter = RateLimitMiddleware::builder()
//!     .name("auth_rate_limit")
//!     .limit(5)
//!     .window_secs(15 * 60)
//!     .per_ip()
//!     .build();
//! assert_eq!(auth_limiter.limit(), 5);
//! ```

use crate::middleware::{BoxFuture, Middleware, Next, StageResult};
use http::HeaderValue;
use missive_core::{Failure, RateLimitRejection, RequestContext};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Rate limit header names.
pub mod headers {
    /// Maximum requests allowed in the window.
    pub const LIMIT: &str = "x-ratelimit-limit";
    /// Remaining requests in the current window.
    pub const REMAINING: &str = "x-ratelimit-remaining";
    /// Seconds until the current window resets.
    pub const RESET: &str = "x-ratelimit-reset";
}

type KeyFn = Arc<dyn Fn(&RequestContext) -> Option<String> + Send + Sync>;
type SkipFn = Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>;

/// How the limiter keys requests.
#[derive(Clone, Default)]
pub enum KeyExtractor {
    /// Client IP: first `x-forwarded-for` entry, then `x-real-ip`, then the
    /// peer address.
    #[default]
    Ip,
    /// The value of a header. Requests without it are not limited.
    Header(String),
    /// A caller-supplied function.
    Custom(KeyFn),
    /// One bucket for every request.
    Global,
}

impl std::fmt::Debug for KeyExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ip => write!(f, "KeyExtractor::Ip"),
            Self::Header(h) => f.debug_tuple("KeyExtractor::Header").field(h).finish(),
            Self::Custom(_) => write!(f, "KeyExtractor::Custom(<fn>)"),
            Self::Global => write!(f, "KeyExtractor::Global"),
        }
    }
}

impl KeyExtractor {
    fn extract(&self, ctx: &RequestContext) -> Option<String> {
        match self {
            Self::Ip => {
                let forwarded = ctx
                    .header("x-forwarded-for")
                    .and_then(|value| value.split(',').next())
                    .map(str::trim)
                    .filter(|ip| !ip.is_empty());
                let ip = forwarded
                    .or_else(|| ctx.header("x-real-ip").map(str::trim))
                    .map(String::from)
                    .or_else(|| ctx.remote_addr().map(|addr| addr.ip().to_string()))
                    .unwrap_or_else(|| "unknown-ip".to_string());
                Some(ip)
            }
            Self::Header(name) => ctx.header(name).map(String::from),
            Self::Custom(f) => f(ctx),
            Self::Global => Some("global".to_string()),
        }
    }
}

#[derive(Debug, Default)]
struct RateLimitStore {
    windows: HashMap<String, WindowData>,
    last_sweep: Option<Instant>,
}

impl RateLimitStore {
    /// Drops keys idle for two windows, at most once per window. Such a key
    /// carries no weight into the sliding window any more.
    fn sweep(&mut self, now: Instant, window: Duration) {
        if self
            .last_sweep
            .is_some_and(|last| now.duration_since(last) < window)
        {
            return;
        }
        self.last_sweep = Some(now);
        let before = self.windows.len();
        self.windows
            .retain(|_, data| now.duration_since(data.window_start) < window * 2);
        let evicted = before - self.windows.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.windows.len(), "Evicted idle rate limit keys");
        }
    }
}

#[derive(Debug, Clone)]
struct WindowData {
    count: u64,
    window_start: Instant,
    prev_count: u64,
}

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The request may proceed.
    Allowed {
        /// Requests allowed per window.
        limit: u64,
        /// Requests left in the window.
        remaining: u64,
        /// Time until the window resets.
        reset_in: Duration,
    },
    /// The request is rejected.
    Limited {
        /// Requests allowed per window.
        limit: u64,
        /// Time until the window resets.
        reset_in: Duration,
    },
}

/// Sliding-window rate limiting stage.
///
/// Clones share the same counters, so one limiter can guard several routes.
#[derive(Clone)]
pub struct RateLimitMiddleware {
    name: &'static str,
    limit: u64,
    window: Duration,
    key_extractor: KeyExtractor,
    skip: Option<SkipFn>,
    store: Arc<Mutex<RateLimitStore>>,
}

impl std::fmt::Debug for RateLimitMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitMiddleware")
            .field("name", &self.name)
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("key_extractor", &self.key_extractor)
            .field("skip", &self.skip.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`RateLimitMiddleware`].
#[derive(Clone)]
pub struct RateLimitBuilder {
    name: &'static str,
    limit: u64,
    window: Duration,
    key_extractor: KeyExtractor,
    skip: Option<SkipFn>,
}

impl Default for RateLimitBuilder {
    fn default() -> Self {
        Self {
            name: "rate_limit",
            limit: 100,
            window: Duration::from_secs(15 * 60),
            key_extractor: KeyExtractor::default(),
            skip: None,
        }
    }
}

impl std::fmt::Debug for RateLimitBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitBuilder")
            .field("name", &self.name)
            .field("limit", &self.limit)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl RateLimitBuilder {
    /// Creates a builder with 100 requests per 15 minutes per IP.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stage name used in logs.
    #[must_use]
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Sets the number of requests allowed per window.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the window length.
    #[must_use]
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Sets the window length in seconds.
    #[must_use]
    pub fn window_secs(self, seconds: u64) -> Self {
        self.window(Duration::from_secs(seconds))
    }

    /// Keys requests by client IP.
    #[must_use]
    pub fn per_ip(mut self) -> Self {
        self.key_extractor = KeyExtractor::Ip;
        self
    }

    /// Keys requests by a header value.
    #[must_use]
    pub fn per_header(mut self, header_name: impl Into<String>) -> Self {
        self.key_extractor = KeyExtractor::Header(header_name.into());
        self
    }

    /// Uses one bucket for all requests.
    #[must_use]
    pub fn global(mut self) -> Self {
        self.key_extractor = KeyExtractor::Global;
        self
    }

    /// Keys requests with a custom function.
    #[must_use]
    pub fn key_extractor<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        self.key_extractor = KeyExtractor::Custom(Arc::new(f));
        self
    }

    /// Exempts requests matching `f`.
    #[must_use]
    pub fn skip<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
    {
        self.skip = Some(Arc::new(f));
        self
    }

    /// Builds the stage.
    #[must_use]
    pub fn build(self) -> RateLimitMiddleware {
        RateLimitMiddleware {
            name: self.name,
            limit: self.limit,
            window: self.window.max(Duration::from_secs(1)),
            key_extractor: self.key_extractor,
            skip: self.skip,
            store: Arc::new(Mutex::new(RateLimitStore::default())),
        }
    }
}

impl RateLimitMiddleware {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> RateLimitBuilder {
        RateLimitBuilder::new()
    }

    /// Returns the number of requests allowed per window.
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// Returns the window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Checks and counts one request for `key`.
    #[allow(clippy::significant_drop_tightening)]
    pub async fn check(&self, key: &str) -> RateLimitDecision {
        let mut store = self.store.lock().await;
        let now = Instant::now();
        let window = self.window;
        store.sweep(now, window);

        let data = store
            .windows
            .entry(key.to_string())
            .or_insert_with(|| WindowData {
                count: 0,
                window_start: now,
                prev_count: 0,
            });

        let elapsed = now.duration_since(data.window_start);
        if elapsed >= window {
            let windows_passed = elapsed.as_nanos() / window.as_nanos();
            data.prev_count = if windows_passed >= 2 { 0 } else { data.count };
            data.count = 0;
            data.window_start = now;
        }

        let in_window = now.duration_since(data.window_start);
        let prev_weight = 1.0 - in_window.as_secs_f64() / window.as_secs_f64();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let weighted = data.count + (data.prev_count as f64 * prev_weight) as u64;
        let reset_in = window.saturating_sub(in_window);

        if weighted >= self.limit {
            RateLimitDecision::Limited {
                limit: self.limit,
                reset_in,
            }
        } else {
            data.count += 1;
            RateLimitDecision::Allowed {
                limit: self.limit,
                remaining: self.limit.saturating_sub(weighted + 1),
                reset_in,
            }
        }
    }

    fn rejection(&self, reset_in: Duration) -> Failure {
        Failure::RateLimited(RateLimitRejection {
            limit: self.limit,
            window_secs: self.window.as_secs(),
            retry_after_secs: reset_in.as_secs().max(1),
        })
    }
}

impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            if self.skip.as_ref().is_some_and(|skip| skip(ctx)) {
                return next.run(ctx).await;
            }
            let Some(key) = self.key_extractor.extract(ctx) else {
                return next.run(ctx).await;
            };

            match self.check(&key).await {
                RateLimitDecision::Allowed {
                    limit,
                    remaining,
                    reset_in,
                } => {
                    let mut response = next.run(ctx).await?;
                    let headers = response.headers_mut();
                    headers.insert(headers::LIMIT, HeaderValue::from(limit));
                    headers.insert(headers::REMAINING, HeaderValue::from(remaining));
                    headers.insert(headers::RESET, HeaderValue::from(reset_in.as_secs()));
                    Ok(response)
                }
                RateLimitDecision::Limited { limit, reset_in } => {
                    tracing::warn!(
                        request_id = %ctx.request_id(),
                        limiter = self.name,
                        key = %key,
                        limit,
                        "Rate limit exceeded"
                    );
                    missive_telemetry::metrics::record_rate_limited(self.name);
                    Err(self.rejection(reset_in))
                }
            }
        })
    }
}
