//! Core middleware trait and chain.
//!
//! A stage receives the mutable [`RequestContext`] and a [`Next`] handle for
//! the rest of the chain. It resolves to a [`StageResult`]: `Ok` carries a
//! rendered response, `Err` carries a [`Failure`] that travels outward until
//! the error-dispatch stage turns it into a response.
//!
//! # Example
//!
//! ```
//! use missive_core::RequestContext;
//! use missive_middleware::{BoxFuture, Middleware, Next, StageResult};
//!
//! struct Audit;
//!
//! impl Middleware for Audit {
//!     fn name(&self) -> &'static str {
//!         "audit"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut RequestContext,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, StageResult> {
//!         Box::pin(async move {
//!             tracing::debug!(request_id = %ctx.request_id(), "audit");
//!             next.run(ctx).await
//!         })
//!     }
//! }
//! ```

use missive_core::{Failure, RequestContext, Response};
use std::future::Future;

pub use missive_core::BoxFuture;

/// Outcome of a stage: a response, or a failure still to be dispatched.
pub type StageResult = Result<Response, Failure>;

/// A pipeline stage.
///
/// # Invariants
///
/// - A stage calls `next.run()` at most once; not calling it short-circuits.
/// - A stage never swallows a downstream `Err` other than by dispatching it.
pub trait Middleware: Send + Sync + 'static {
    /// Returns the stage name used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request.
    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult>;
}

type Terminal<'a> =
    Box<dyn FnOnce(&mut RequestContext) -> BoxFuture<'static, StageResult> + Send + 'a>;

/// The remainder of the chain.
///
/// Consumed by [`Next::run`], so it can only run once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Terminal(Terminal<'a>),
}

impl<'a> Next<'a> {
    /// Wraps `next` with `middleware`.
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates the end of the chain.
    ///
    /// The terminal future owns what it needs; it cannot borrow the context.
    pub fn terminal<F>(f: F) -> Self
    where
        F: FnOnce(&mut RequestContext) -> BoxFuture<'static, StageResult> + Send + 'a,
    {
        Self {
            inner: NextInner::Terminal(Box::new(f)),
        }
    }

    /// Runs the next stage or the terminal.
    pub async fn run(self, ctx: &mut RequestContext) -> StageResult {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(ctx, *next).await,
            NextInner::Terminal(terminal) => terminal(ctx).await,
        }
    }
}

/// A stage built from a closure.
///
/// ```
/// use missive_middleware::FnMiddleware;
///
/// let tag = FnMiddleware::new("tag", |ctx, next| {
///     Box::pin(async move {
///         let mut response = next.run(ctx).await?;
///         response.headers_mut().insert("x-served-by", "missive".parse().unwrap());
///         Ok(response)
///     })
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut RequestContext, Next<'a>) -> BoxFuture<'a, StageResult>
        + Send
        + Sync
        + 'static,
{
    /// Creates a named closure stage.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut RequestContext, Next<'a>) -> BoxFuture<'a, StageResult>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        (self.func)(ctx, next)
    }
}

impl<F> std::fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnMiddleware").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Boxes an async block as a terminal future.
pub(crate) fn boxed<Fut>(fut: Fut) -> BoxFuture<'static, StageResult>
where
    Fut: Future<Output = StageResult> + Send + 'static,
{
    Box::pin(fut)
}
