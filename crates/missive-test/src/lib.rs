//! # Missive Test
//!
//! In-memory testing for Missive applications. Requests are handed straight
//! to [`App::handle_from`](missive_server::App::handle_from) and run through
//! the complete pipeline, with no sockets or port binding.
//!
//! ## Key Features
//!
//! - **[`TestClient`]**: fluent request building and sending
//! - **[`TestResponse`]**: envelope accessors (`success`, `message`, `data`)
//!   and assertions
//! - **[`MemoryAuthProvider`]**: an [`AuthProvider`](missive_auth::AuthProvider)
//!   that keeps users and sessions in memory
//!
//! ## Example
//!
//! ```ignore
//! use missive_test::{MemoryAuthProvider, TestClient};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_sign_up() {
//!     let client = TestClient::new(app_with(MemoryAuthProvider::new()));
//!
//!     let response = client
//!         .post("/api/auth/signup")
//!         .json(&json!({"email": "ada@example.com", "password": "correct horse", "name": "Ada"}))
//!         .send()
//!         .await;
//!
//!     response
//!         .assert_status(http::StatusCode::CREATED)
//!         .assert_message("User created successfully");
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/missive-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod auth;
mod client;
mod error;
mod request;
mod response;

pub use auth::MemoryAuthProvider;
pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder};
pub use response::TestResponse;
