//! Fixed-order request pipeline.
//!
//! Every request, matched or not, runs through the same stages in the same
//! order:
//!
//! 1. **Request ID** - propagate or generate, echo on the response
//! 2. **Telemetry** - span, logs, metrics
//! 3. **Error Dispatch** - any failure from further in becomes an envelope
//! 4. **Rate Limit** - the optional global limiter
//! 5. **Route** - the endpoint's own stages, then schema validation
//! 6. **Boundary** - the handler, or the not-found terminal
//!
//! The order is fixed by the builder and cannot be changed by routes.

use crate::boundary::AsyncBoundary;
use crate::dispatch::Dispatcher;
use crate::error::ResponseCommitted;
use crate::middleware::{boxed, Middleware, Next};
use crate::not_found;
use crate::schema::ValidationSchema;
use crate::stages::{
    ErrorDispatchMiddleware, RateLimitMiddleware, RequestIdMiddleware, TelemetryMiddleware,
    ValidationMiddleware,
};
use missive_core::{AppContext, BoxedHandler, Handler, Reply, RequestContext, Response};
use std::sync::Arc;

/// A type-erased stage.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// A routed handler with its own stages.
///
/// # Example
///
/// ```
/// use missive_core::{Reply, RequestContext, Failure};
/// use missive_middleware::pipeline::Endpoint;
/// use missive_middleware::schema::{FieldRule, ObjectShape, ValidationSchema};
///
/// async fn create(ctx: RequestContext) -> Result<Reply, Failure> {
///     Ok(Reply::created().message("Created"))
/// }
///
/// let endpoint = Endpoint::new(create)
///     .validate(ValidationSchema::parts().body(ObjectShape::new().field("name", FieldRule::string())));
/// assert_eq!(endpoint.stage_names(), vec!["validation"]);
/// ```
#[derive(Clone)]
pub struct Endpoint {
    layers: Vec<BoxedMiddleware>,
    validation: Option<BoxedMiddleware>,
    schema: Option<Arc<ValidationSchema>>,
    handler: BoxedHandler,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("stages", &self.stage_names())
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl Endpoint {
    /// Creates an endpoint for `handler`.
    pub fn new<H: Handler>(handler: H) -> Self {
        Self::from_boxed(Arc::new(handler))
    }

    /// Creates an endpoint for an already boxed handler.
    #[must_use]
    pub fn from_boxed(handler: BoxedHandler) -> Self {
        Self {
            layers: Vec::new(),
            validation: None,
            schema: None,
            handler,
        }
    }

    /// Adds a route stage. Stages run in the order they are added.
    #[must_use]
    pub fn layer<M: Middleware>(self, middleware: M) -> Self {
        self.layer_boxed(Arc::new(middleware))
    }

    /// Adds an already boxed route stage.
    #[must_use]
    pub fn layer_boxed(mut self, middleware: BoxedMiddleware) -> Self {
        self.layers.push(middleware);
        self
    }

    /// Validates requests against `schema` right before the handler.
    #[must_use]
    pub fn validate(mut self, schema: impl Into<Arc<ValidationSchema>>) -> Self {
        let schema = schema.into();
        self.validation = Some(Arc::new(ValidationMiddleware::new(Arc::clone(&schema))));
        self.schema = Some(schema);
        self
    }

    /// Returns the schema, if the endpoint validates.
    #[must_use]
    pub fn schema(&self) -> Option<&ValidationSchema> {
        self.schema.as_deref()
    }

    /// Returns the handler.
    #[must_use]
    pub const fn handler(&self) -> &BoxedHandler {
        &self.handler
    }

    /// Returns the route stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages().map(|m| m.name()).collect()
    }

    fn stages(&self) -> impl DoubleEndedIterator<Item = &BoxedMiddleware> {
        self.layers.iter().chain(self.validation.iter())
    }
}

/// The fixed-order pipeline.
///
/// # Example
///
/// ```
/// use missive_core::AppContext;
/// use missive_middleware::pipeline::{Pipeline, Stage};
/// use std::sync::Arc;
///
/// let pipeline = Pipeline::builder(Arc::new(AppContext::production())).build();
/// assert_eq!(pipeline.stage_names(), vec!["request_id", "telemetry", "error_dispatch"]);
/// assert_eq!(Stage::all()[0], Stage::RequestId);
/// ```
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
    dispatcher: Arc<Dispatcher>,
    app: Arc<AppContext>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .field("mode", &self.app.mode())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a builder for `app`.
    #[must_use]
    pub fn builder(app: Arc<AppContext>) -> PipelineBuilder {
        PipelineBuilder::new(app)
    }

    /// Returns the dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Returns the application context.
    #[must_use]
    pub fn app(&self) -> &Arc<AppContext> {
        &self.app
    }

    /// Runs a request through the pipeline.
    ///
    /// `endpoint` is the matched route, or `None` for the not-found terminal.
    /// Produces exactly one response per request: a context whose response
    /// is already committed (through any clone) is refused with
    /// [`ResponseCommitted`] and no stage runs.
    pub async fn process(
        &self,
        mut ctx: RequestContext,
        endpoint: Option<&Endpoint>,
    ) -> Result<Response, ResponseCommitted> {
        if ctx.is_committed() {
            return Err(self.refuse(&ctx));
        }

        let next = self.build_chain(endpoint);
        let response = match next.run(&mut ctx).await {
            Ok(response) => response,
            Err(failure) => self.dispatcher.dispatch(&ctx, failure),
        };

        if ctx.commit_response() {
            Ok(response)
        } else {
            Err(self.refuse(&ctx))
        }
    }

    fn refuse(&self, ctx: &RequestContext) -> ResponseCommitted {
        tracing::error!(
            request_id = %ctx.request_id(),
            http.method = %ctx.method(),
            http.path = ctx.path_and_query(),
            "Response already committed; refusing a second one"
        );
        ResponseCommitted {
            request_id: ctx.request_id(),
        }
    }

    fn build_chain<'a>(&'a self, endpoint: Option<&'a Endpoint>) -> Next<'a> {
        let mut next = match endpoint {
            Some(endpoint) => {
                let handler = Arc::clone(endpoint.handler());
                Next::terminal(move |ctx: &mut RequestContext| {
                    let ctx = ctx.clone();
                    boxed(async move {
                        AsyncBoundary::run(&handler, ctx).await.map(Reply::into_response)
                    })
                })
            }
            None => Next::terminal(|ctx: &mut RequestContext| {
                let response = not_found::respond(ctx);
                boxed(async move { Ok(response) })
            }),
        };

        if let Some(endpoint) = endpoint {
            for middleware in endpoint.stages().rev() {
                next = Next::new(middleware.as_ref(), next);
            }
        }
        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Returns the global stage names in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|m| m.name()).collect()
    }
}

/// Builder for [`Pipeline`].
#[derive(Debug)]
pub struct PipelineBuilder {
    app: Arc<AppContext>,
    request_id: RequestIdMiddleware,
    rate_limit: Option<RateLimitMiddleware>,
}

impl PipelineBuilder {
    /// Creates a builder with the default stages.
    #[must_use]
    pub fn new(app: Arc<AppContext>) -> Self {
        Self {
            app,
            request_id: RequestIdMiddleware::new(),
            rate_limit: None,
        }
    }

    /// Whether incoming `x-request-id` headers are propagated.
    #[must_use]
    pub fn trust_request_id(mut self, trust: bool) -> Self {
        self.request_id = if trust {
            RequestIdMiddleware::new()
        } else {
            RequestIdMiddleware::generate_only()
        };
        self
    }

    /// Installs the global rate limiter.
    #[must_use]
    pub fn rate_limit(mut self, limiter: RateLimitMiddleware) -> Self {
        self.rate_limit = Some(limiter);
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&self.app)));

        let mut stages: Vec<BoxedMiddleware> = vec![
            Arc::new(self.request_id),
            Arc::new(TelemetryMiddleware::new(self.app.service_name())),
            Arc::new(ErrorDispatchMiddleware::new(Arc::clone(&dispatcher))),
        ];
        if let Some(limiter) = self.rate_limit {
            stages.push(Arc::new(limiter));
        }

        Pipeline {
            stages,
            dispatcher,
            app: self.app,
        }
    }
}

/// Pipeline stage marker, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Request ID propagation.
    RequestId = 1,
    /// Span, logs and metrics.
    Telemetry = 2,
    /// Failure to envelope conversion.
    ErrorDispatch = 3,
    /// Global rate limiting.
    RateLimit = 4,
    /// Route stages and schema validation.
    Route = 5,
    /// Handler invocation.
    Boundary = 6,
}

impl Stage {
    /// Returns the stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RequestId => "request_id",
            Self::Telemetry => "telemetry",
            Self::ErrorDispatch => "error_dispatch",
            Self::RateLimit => "rate_limit",
            Self::Route => "route",
            Self::Boundary => "boundary",
        }
    }

    /// Returns `true` for stages that run for unmatched requests too.
    #[must_use]
    pub const fn is_global(self) -> bool {
        (self as u8) <= 4
    }

    /// Returns all stages in order.
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [
            Self::RequestId,
            Self::Telemetry,
            Self::ErrorDispatch,
            Self::RateLimit,
            Self::Route,
            Self::Boundary,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldRule, ObjectShape};
    use crate::stages::REQUEST_ID_HEADER;
    use http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use missive_core::{Failure, StorageError};
    use serde_json::{json, Value};

    fn pipeline() -> Pipeline {
        Pipeline::builder(Arc::new(AppContext::production())).build()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_stage_order() {
        let stages = Stage::all();
        assert!(stages.windows(2).all(|w| w[0] < w[1]));
        assert!(Stage::RateLimit.is_global());
        assert!(!Stage::Route.is_global());
        assert_eq!(Stage::Boundary.name(), "boundary");
    }

    #[test]
    fn test_global_rate_limit_is_last_global_stage() {
        let pipeline = Pipeline::builder(Arc::new(AppContext::production()))
            .rate_limit(RateLimitMiddleware::builder().build())
            .build();
        assert_eq!(
            pipeline.stage_names(),
            vec!["request_id", "telemetry", "error_dispatch", "rate_limit"]
        );
    }

    #[test]
    fn test_validation_runs_after_layers() {
        let endpoint = Endpoint::new(|_ctx: RequestContext| async { Ok::<_, Failure>(Reply::ok()) })
            .validate(ValidationSchema::parts())
            .layer(RateLimitMiddleware::builder().name("auth_rate_limit").build());
        assert_eq!(endpoint.stage_names(), vec!["auth_rate_limit", "validation"]);
        assert!(endpoint.schema().is_some());
    }

    #[tokio::test]
    async fn test_success_response() {
        let endpoint = Endpoint::new(|_ctx: RequestContext| async {
            Ok::<_, Failure>(Reply::created().message("User created successfully").data(json!({"id": "u1"})))
        });
        let ctx = RequestContext::builder(Method::POST, "/users".parse().unwrap()).build();
        let response = pipeline().process(ctx, Some(&endpoint)).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(
            body_json(response).await,
            json!({"success": true, "message": "User created successfully", "data": {"id": "u1"}})
        );
    }

    #[tokio::test]
    async fn test_failure_is_dispatched() {
        let endpoint = Endpoint::new(|_ctx: RequestContext| async {
            Err::<Reply, _>(StorageError::duplicate_key("E11000").into())
        });
        let response = pipeline().process(RequestContext::mock(), Some(&endpoint)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_not_found() {
        let ctx = RequestContext::builder(Method::GET, "/doesnotexist".parse().unwrap()).build();
        let response = pipeline().process(ctx, None).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(
            body_json(response).await,
            json!({"success": false, "message": "Route GET /doesnotexist not found"})
        );
    }

    #[tokio::test]
    async fn test_handler_sees_normalized_input() {
        let endpoint = Endpoint::new(|ctx: RequestContext| async move {
            Ok::<_, Failure>(Reply::ok().data(ctx.query().clone()))
        })
        .validate(ValidationSchema::parts().query(ObjectShape::new().field("limit", FieldRule::integer().max(50))));

        let ctx = RequestContext::builder(Method::GET, "/items?limit=20&debug=1".parse().unwrap())
            .query(json!({"limit": "20", "debug": "1"}))
            .build();
        let response = pipeline().process(ctx, Some(&endpoint)).await.unwrap();
        assert_eq!(body_json(response).await["data"], json!({"limit": 20}));
    }

    #[tokio::test]
    async fn test_response_is_committed_once() {
        let endpoint = Endpoint::new(|_ctx: RequestContext| async { Ok::<_, Failure>(Reply::ok()) });
        let ctx = RequestContext::mock();
        let retry = ctx.clone();
        let request_id = ctx.request_id();
        assert!(pipeline().process(ctx, Some(&endpoint)).await.is_ok());
        assert!(retry.is_committed());

        let refused = pipeline().process(retry, Some(&endpoint)).await.unwrap_err();
        assert_eq!(refused, ResponseCommitted { request_id });
    }

    #[tokio::test]
    async fn test_committed_context_never_reaches_handler() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let endpoint = Endpoint::new(move |_ctx: RequestContext| {
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { Ok::<_, Failure>(Reply::ok()) }
        });

        let ctx = RequestContext::mock();
        assert!(ctx.commit_response());
        assert!(pipeline().process(ctx, Some(&endpoint)).await.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
