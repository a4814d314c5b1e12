//! End-to-end pipeline tests.
//!
//! These drive [`Pipeline::process`] directly, with every stage in place:
//!
//! 1. Request ID
//! 2. Telemetry
//! 3. Error dispatch
//! 4. Rate limit (when installed)
//! 5. Route stages, then validation
//! 6. Boundary

use http::{Method, StatusCode};
use http_body_util::BodyExt;
use missive_core::{AppContext, AuthError, Failure, Reply, RequestContext, Response, RuntimeMode};
use missive_middleware::pipeline::{Endpoint, Pipeline};
use missive_middleware::schema::ValidationSchema;
use missive_middleware::stages::RateLimitMiddleware;
use missive_middleware::FnMiddleware;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn pipeline(mode: RuntimeMode) -> Pipeline {
    Pipeline::builder(Arc::new(AppContext::new(mode))).build()
}

fn request(method: Method, path: &str, body: Value) -> RequestContext {
    RequestContext::builder(method, path.parse().unwrap())
        .body(body)
        .build()
}

async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_validation_stops_before_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let endpoint = Endpoint::new(move |_ctx: RequestContext| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, Failure>(Reply::created()) }
    })
    .layer(FnMiddleware::new("served_by", |ctx, next| {
        Box::pin(async move {
            let mut response = next.run(ctx).await?;
            response
                .headers_mut()
                .insert("x-served-by", http::HeaderValue::from_static("route"));
            Ok(response)
        })
    }))
    .validate(
        ValidationSchema::from_json(
            r#"{ "body": { "title": { "type": "string", "min": 3, "message": "Title too short" } } }"#,
        )
        .unwrap(),
    );
    assert_eq!(endpoint.stage_names(), vec!["served_by", "validation"]);

    let p = pipeline(RuntimeMode::Production);
    let response = p
        .process(request(Method::POST, "/posts", json!({"title": "ab"})), Some(&endpoint))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-served-by"], "route");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        json_body(response).await,
        json!({
            "success": false,
            "message": "Validation failed",
            "data": {"errors": [{"field": "body.title", "message": "Title too short", "code": "too_small"}]}
        })
    );

    let response = p
        .process(request(Method::POST, "/posts", json!({"title": "abc"})), Some(&endpoint))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_legacy_schema_layout() {
    let schema = ValidationSchema::from_json(r#"{ "name": { "type": "string", "min": 1 } }"#).unwrap();
    let endpoint = Endpoint::new(|ctx: RequestContext| async move {
        Ok::<_, Failure>(Reply::ok().data(ctx.body().clone()))
    })
    .validate(schema);

    let p = pipeline(RuntimeMode::Production);
    let response = p
        .process(request(Method::POST, "/things", json!({"name": ""})), Some(&endpoint))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["data"]["errors"][0]["field"], "name");

    let response = p
        .process(
            request(Method::POST, "/things", json!({"name": "x", "extra": true})),
            Some(&endpoint),
        )
        .await
        .unwrap();
    assert_eq!(json_body(response).await["data"], json!({"name": "x"}));
}

#[tokio::test]
async fn test_forwarded_failure_wins() {
    let endpoint = Endpoint::new(|ctx: RequestContext| async move {
        ctx.forward(AuthError::token_expired());
        tokio::task::yield_now().await;
        Err::<Reply, _>(Failure::internal("second failure"))
    });

    let response = pipeline(RuntimeMode::Production)
        .process(request(Method::GET, "/me", Value::Null), Some(&endpoint))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({"success": false, "message": "Token expired"})
    );
}

#[tokio::test]
async fn test_global_rate_limit() {
    let limiter = RateLimitMiddleware::builder()
        .limit(1)
        .window(Duration::from_secs(60))
        .global()
        .build();
    let p = Pipeline::builder(Arc::new(AppContext::production()))
        .rate_limit(limiter)
        .build();
    let endpoint = Endpoint::new(|_ctx: RequestContext| async { Ok::<_, Failure>(Reply::ok()) });

    let first = p
        .process(request(Method::GET, "/", Value::Null), Some(&endpoint))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()["x-ratelimit-limit"], "1");

    let second = p
        .process(request(Method::GET, "/", Value::Null), Some(&endpoint))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key(http::header::RETRY_AFTER));
    assert_eq!(json_body(second).await["success"], false);
}

#[tokio::test]
async fn test_unmatched_request() {
    let response = pipeline(RuntimeMode::Development)
        .process(request(Method::DELETE, "/nope?x=1", Value::Null), None)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        json_body(response).await,
        json!({"success": false, "message": "Route DELETE /nope?x=1 not found"})
    );
}
