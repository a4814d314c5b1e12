//! Handler trait for request processing.
//!
//! A handler receives the validated [`RequestContext`] by value and resolves
//! to either a [`Reply`] or a [`Failure`]. Any `async` closure or function of
//! that shape is a handler.

use crate::context::RequestContext;
use crate::error::Failure;
use crate::reply::Reply;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased handler shared by the route table.
pub type BoxedHandler = Arc<dyn Handler>;

/// A request handler.
///
/// # Example
///
/// ```rust,ignore
/// use missive_core::{Failure, Reply, RequestContext};
///
/// async fn get_user(ctx: RequestContext) -> Result<Reply, Failure> {
///     let id = ctx.params()["id"].as_str().unwrap_or_default().to_string();
///     if id.is_empty() {
///         return Err(Failure::not_found("User not found"));
///     }
///     Ok(Reply::ok().data(serde_json::json!({ "id": id })))
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Starts handling a request.
    fn call(&self, ctx: RequestContext) -> BoxFuture<'static, Result<Reply, Failure>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, Failure>> + Send + 'static,
{
    fn call(&self, ctx: RequestContext) -> BoxFuture<'static, Result<Reply, Failure>> {
        Box::pin((self)(ctx))
    }
}

/// Boxes a handler for storage in a route table.
pub fn handler_fn<H: Handler>(handler: H) -> BoxedHandler {
    Arc::new(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn greet(ctx: RequestContext) -> Result<Reply, Failure> {
        let name = ctx.query()["name"].as_str().unwrap_or("world").to_string();
        Ok(Reply::ok().data(json!({ "greeting": format!("Hello, {name}!") })))
    }

    #[tokio::test]
    async fn test_async_fn_is_handler() {
        let handler = handler_fn(greet);
        let ctx = RequestContext::builder(http::Method::GET, "/greet".parse().unwrap())
            .query(json!({"name": "Ada"}))
            .build();
        let reply = handler.call(ctx).await.unwrap();
        assert_eq!(reply.data_value(), Some(&json!({"greeting": "Hello, Ada!"})));
    }

    #[tokio::test]
    async fn test_closure_capturing_state() {
        let prefix = Arc::new("v1".to_string());
        let handler = handler_fn(move |_ctx: RequestContext| {
            let prefix = Arc::clone(&prefix);
            async move { Err::<Reply, _>(Failure::forbidden(format!("{prefix} is read-only"))) }
        });
        let err = handler.call(RequestContext::mock()).await.unwrap_err();
        assert_eq!(err.to_string(), "v1 is read-only");
    }
}
