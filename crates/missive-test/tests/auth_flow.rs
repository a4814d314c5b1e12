//! End-to-end tests of the auth routes against the in-memory provider.

use http::StatusCode;
use missive_auth::{AuthProvider, AuthRoutes};
use missive_core::{AppContext, RuntimeMode};
use missive_server::{App, Router};
use missive_test::{MemoryAuthProvider, TestClient, TestResponse};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn client_with(provider: Arc<MemoryAuthProvider>, auth_limit: Option<u64>) -> TestClient {
    let mut routes = AuthRoutes::new(provider as Arc<dyn AuthProvider>);
    if let Some(limit) = auth_limit {
        routes = routes.rate_limit(limit, Duration::from_secs(15 * 60));
    }
    let mut router = Router::new();
    routes.mount(&mut router).unwrap();
    let app = App::builder(Arc::new(AppContext::new(RuntimeMode::Production)))
        .router(router)
        .build()
        .unwrap();
    TestClient::new(app)
}

fn sign_up_body() -> serde_json::Value {
    json!({"email": "ada@example.com", "password": "correct horse", "name": "Ada"})
}

#[tokio::test]
async fn test_full_session_lifecycle() {
    let provider = Arc::new(MemoryAuthProvider::new());
    let client = client_with(Arc::clone(&provider), None);

    let created = client.post("/api/auth/signup").json(&sign_up_body()).send().await;
    created
        .assert_status(StatusCode::CREATED)
        .assert_envelope()
        .assert_message("User created successfully");
    let data = created.data().unwrap().unwrap();
    assert_eq!(data["user"]["email"], "ada@example.com");
    assert_eq!(data["user"]["emailVerified"], false);

    let signed_in = client
        .post("/api/auth/signin")
        .json(&json!({"email": "ada@example.com", "password": "correct horse"}))
        .send()
        .await;
    signed_in
        .assert_status(StatusCode::OK)
        .assert_message("Signed in successfully");
    let token = signed_in.data().unwrap().unwrap()["session"]["token"]
        .as_str()
        .unwrap()
        .to_string();

    let session = client.get("/api/auth/session").bearer_token(&token).send().await;
    session
        .assert_status(StatusCode::OK)
        .assert_message("Session retrieved successfully");
    assert_eq!(session.data().unwrap().unwrap()["session"]["token"], token.as_str());

    client
        .post("/api/auth/signout")
        .bearer_token(&token)
        .send()
        .await
        .assert_status(StatusCode::OK)
        .assert_message("Signed out successfully");

    client
        .get("/api/auth/session")
        .bearer_token(&token)
        .send()
        .await
        .assert_status(StatusCode::UNAUTHORIZED)
        .assert_envelope()
        .assert_message("Invalid token");
}

#[tokio::test]
async fn test_duplicate_sign_up() {
    let client = client_with(Arc::new(MemoryAuthProvider::new()), None);
    client.post("/api/auth/signup").json(&sign_up_body()).send().await;

    client
        .post("/api/auth/signup")
        .json(&sign_up_body())
        .send()
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_message("User already exists");
}

#[tokio::test]
async fn test_expired_session() {
    let provider = Arc::new(MemoryAuthProvider::new());
    let client = client_with(Arc::clone(&provider), None);
    let created = client.post("/api/auth/signup").json(&sign_up_body()).send().await;
    let token = created.data().unwrap().unwrap()["session"]["token"]
        .as_str()
        .unwrap()
        .to_string();
    provider.expire_session_at(&token, chrono::Utc::now() - chrono::Duration::minutes(1));

    client
        .get("/api/auth/session")
        .bearer_token(&token)
        .send()
        .await
        .assert_status(StatusCode::UNAUTHORIZED)
        .assert_message("Token expired");
}

#[tokio::test]
async fn test_sign_up_validation_errors() {
    let client = client_with(Arc::new(MemoryAuthProvider::new()), None);
    let response = client
        .post("/api/auth/signup")
        .json(&json!({"email": "not-an-email", "password": "short"}))
        .send()
        .await;
    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_envelope()
        .assert_message("Validation failed");

    let errors = response.data().unwrap().unwrap()["errors"].clone();
    let fields: Vec<&str> = errors
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["body.email", "body.password", "body.name"]);
}

#[tokio::test]
async fn test_provider_unavailable() {
    let provider = Arc::new(MemoryAuthProvider::new());
    let client = client_with(Arc::clone(&provider), None);
    provider.set_unavailable("identity service down");

    client
        .post("/api/auth/signin")
        .json(&json!({"email": "ada@example.com", "password": "x"}))
        .send()
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE)
        .assert_envelope();
}

async fn sign_in_from(client: &TestClient, ip: &str) -> TestResponse {
    client
        .post("/api/auth/signin")
        .client_ip(ip)
        .json(&json!({"email": "ada@example.com", "password": "wrong"}))
        .send()
        .await
}

#[tokio::test]
async fn test_auth_rate_limit_per_ip() {
    let client = client_with(Arc::new(MemoryAuthProvider::new()), Some(2));

    for _ in 0..2 {
        sign_in_from(&client, "10.0.0.1")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    let limited = sign_in_from(&client, "10.0.0.1").await;
    limited
        .assert_status(StatusCode::TOO_MANY_REQUESTS)
        .assert_envelope();
    assert!(limited.header_str("retry-after").is_some());

    sign_in_from(&client, "10.0.0.2")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
