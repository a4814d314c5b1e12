//! Envelope guarantees observed through the full application.

use http::StatusCode;
use missive_core::{AppContext, Failure, Reply, RequestContext, RuntimeMode, StorageError};
use missive_middleware::Endpoint;
use missive_server::Router;
use missive_test::TestClient;
use proptest::prelude::*;
use serde_json::json;

fn client(mode: RuntimeMode) -> TestClient {
    let mut router = Router::new();
    router
        .get(
            "/status/{code}",
            Endpoint::new(|ctx: RequestContext| async move {
                let code: u16 = ctx
                    .params()["code"]
                    .as_str()
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(500);
                let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.as_u16() < 400 {
                    Ok(Reply::ok().message(format!("status {code}")))
                } else {
                    Err(Failure::operational(status, format!("status {code}")))
                }
            }),
        )
        .unwrap()
        .post(
            "/users",
            Endpoint::new(|_ctx: RequestContext| async {
                Err::<Reply, _>(StorageError::duplicate_key("E11000 duplicate key error").into())
            }),
        )
        .unwrap()
        .get(
            "/boom",
            Endpoint::new(|_ctx: RequestContext| async {
                Err::<Reply, _>(Failure::unexpected(anyhow::anyhow!("disk on fire")))
            }),
        )
        .unwrap()
        .get(
            "/panic",
            Endpoint::new(|_ctx: RequestContext| async {
                if true {
                    panic!("handler exploded");
                }
                Ok::<_, Failure>(Reply::ok())
            }),
        )
        .unwrap();
    TestClient::from_router(AppContext::new(mode), router).unwrap()
}

#[tokio::test]
async fn test_unknown_route() {
    let response = client(RuntimeMode::Production).get("/doesnotexist").send().await;
    response
        .assert_status(StatusCode::NOT_FOUND)
        .assert_envelope()
        .assert_message("Route GET /doesnotexist not found");
}

#[tokio::test]
async fn test_duplicate_key_is_conflict() {
    let response = client(RuntimeMode::Production)
        .post("/users")
        .json(&json!({}))
        .send()
        .await;
    response
        .assert_status(StatusCode::CONFLICT)
        .assert_envelope()
        .assert_message("Resource already exists");
    assert_eq!(response.data().unwrap(), None);
}

#[tokio::test]
async fn test_unknown_failure_hidden_in_production() {
    let response = client(RuntimeMode::Production).get("/boom").send().await;
    response
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_envelope()
        .assert_message("Something went wrong");
    assert_eq!(response.data().unwrap(), None);
}

#[tokio::test]
async fn test_unknown_failure_detailed_in_development() {
    let response = client(RuntimeMode::Development).get("/boom").send().await;
    response
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_message("disk on fire");
    assert_eq!(response.data().unwrap().unwrap()["error"], "disk on fire");
}

#[tokio::test]
async fn test_panicking_handler() {
    let response = client(RuntimeMode::Production).get("/panic").send().await;
    response
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_envelope()
        .assert_message("Something went wrong");
}

#[tokio::test]
async fn test_health() {
    let response = client(RuntimeMode::Production).get("/health").send().await;
    response.assert_status(StatusCode::OK).assert_envelope();
    assert_eq!(response.data().unwrap().unwrap()["status"], "healthy");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_success_iff_below_400(code in prop_oneof![200u16..=204, 400u16..=511]) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let response = runtime.block_on(async {
            client(RuntimeMode::Production)
                .get(format!("/status/{code}"))
                .send()
                .await
        });
        let success = response.success().unwrap();
        prop_assert_eq!(success, response.status_code() < 400);
        prop_assert!(response.request_id().is_some());
    }
}
