//! The `/api/auth` routes.
//!
//! | Method | Path | Success |
//! |--------|------|---------|
//! | POST | `/api/auth/signup` | 201 `User created successfully`, data `{user, session}` |
//! | POST | `/api/auth/signin` | 200 `Signed in successfully`, data `{user, session}` |
//! | POST | `/api/auth/signout` | 200 `Signed out successfully` |
//! | GET | `/api/auth/session` | 200 `Session retrieved successfully`, data `{user, session}` |
//!
//! Sign-out and session lookup read the bearer token from `Authorization`.
//! All four routes share one rate limiter when one is configured.

use crate::provider::AuthProvider;
use crate::schema::{sign_in_schema, sign_up_schema};
use missive_core::{AuthError, AuthErrorKind, Failure, Reply, RequestContext};
use missive_middleware::pipeline::{BoxedMiddleware, Endpoint};
use missive_middleware::stages::RateLimitMiddleware;
use missive_server::{Router, ServerError};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Mount point of the auth routes.
pub const AUTH_PREFIX: &str = "/api/auth";

/// Name of the auth rate limiter in logs and metrics.
pub const AUTH_RATE_LIMITER: &str = "auth_rate_limit";

#[derive(Debug, Deserialize)]
struct SignUpInput {
    email: String,
    password: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SignInInput {
    email: String,
    password: String,
}

/// Builds the auth routes for a provider.
///
/// # Example
///
/// ```rust,ignore
/// use missive_auth::AuthRoutes;
/// use missive_server::Router;
/// use std::time::Duration;
///
/// let mut router = Router::new();
/// AuthRoutes::new(provider)
///     .rate_limit(5, Duration::from_secs(15 * 60))
///     .mount(&mut router)?;
/// ```
pub struct AuthRoutes {
    provider: Arc<dyn AuthProvider>,
    limiter: Option<BoxedMiddleware>,
}

impl std::fmt::Debug for AuthRoutes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRoutes")
            .field("provider", &self.provider.name())
            .field("rate_limited", &self.limiter.is_some())
            .finish()
    }
}

impl AuthRoutes {
    /// Creates the routes without a rate limiter.
    #[must_use]
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            provider,
            limiter: None,
        }
    }

    /// Limits each client IP to `limit` auth requests per `window`.
    #[must_use]
    pub fn rate_limit(self, limit: u64, window: Duration) -> Self {
        let limiter = RateLimitMiddleware::builder()
            .name(AUTH_RATE_LIMITER)
            .limit(limit)
            .window(window)
            .per_ip()
            .build();
        self.limiter(Arc::new(limiter))
    }

    /// Uses an already built limiter for every auth route.
    #[must_use]
    pub fn limiter(mut self, limiter: BoxedMiddleware) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Returns the routes relative to [`AUTH_PREFIX`].
    pub fn router(self) -> Result<Router, ServerError> {
        let mut router = Router::new();
        router
            .post("/signup", self.endpoint(sign_up).validate(sign_up_schema()))?
            .post("/signin", self.endpoint(sign_in).validate(sign_in_schema()))?
            .post("/signout", self.endpoint(sign_out))?
            .get("/session", self.endpoint(get_session))?;
        Ok(router)
    }

    /// Mounts the routes under [`AUTH_PREFIX`].
    pub fn mount(self, router: &mut Router) -> Result<(), ServerError> {
        router.nest(AUTH_PREFIX, self.router()?)?;
        Ok(())
    }

    fn endpoint<F, Fut>(&self, operation: F) -> Endpoint
    where
        F: Fn(Arc<dyn AuthProvider>, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Reply, Failure>> + Send + 'static,
    {
        let provider = Arc::clone(&self.provider);
        let endpoint =
            Endpoint::new(move |ctx: RequestContext| operation(Arc::clone(&provider), ctx));
        match &self.limiter {
            Some(limiter) => endpoint.layer_boxed(Arc::clone(limiter)),
            None => endpoint,
        }
    }
}

fn require_token(ctx: &RequestContext) -> Result<String, AuthError> {
    ctx.bearer_token()
        .map(str::to_string)
        .ok_or_else(AuthError::missing_token)
}

async fn sign_up(provider: Arc<dyn AuthProvider>, ctx: RequestContext) -> Result<Reply, Failure> {
    let input: SignUpInput = ctx.body_as()?;
    let session = provider
        .sign_up(&input.email, &input.password, &input.name)
        .await?;
    tracing::info!(
        request_id = %ctx.request_id(),
        user_id = %session.user.id,
        "User signed up"
    );
    Reply::created()
        .message("User created successfully")
        .json(&session)
}

async fn sign_in(provider: Arc<dyn AuthProvider>, ctx: RequestContext) -> Result<Reply, Failure> {
    let input: SignInInput = ctx.body_as()?;
    let session = provider
        .sign_in(&input.email, &input.password)
        .await
        .map_err(|err| match err.kind() {
            AuthErrorKind::Rejected => AuthError::invalid_credentials(),
            _ => err,
        })?;
    tracing::info!(
        request_id = %ctx.request_id(),
        user_id = %session.user.id,
        "User signed in"
    );
    Reply::ok().message("Signed in successfully").json(&session)
}

async fn sign_out(provider: Arc<dyn AuthProvider>, ctx: RequestContext) -> Result<Reply, Failure> {
    let token = require_token(&ctx)?;
    provider.sign_out(&token).await?;
    Ok(Reply::ok().message("Signed out successfully"))
}

async fn get_session(
    provider: Arc<dyn AuthProvider>,
    ctx: RequestContext,
) -> Result<Reply, Failure> {
    let token = require_token(&ctx)?;
    let session = provider.get_session(&token).await?;
    Reply::ok()
        .message("Session retrieved successfully")
        .json(&session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuthSession, Session, SessionInfo, User};
    use crate::provider::AuthResult;
    use bytes::Bytes;
    use chrono::Utc;
    use http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use missive_core::{AppContext, BoxFuture, Response};
    use missive_server::App;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    const TOKEN: &str = "tok-1";

    #[derive(Default)]
    struct SingleUser {
        signed_out: Mutex<Vec<String>>,
    }

    fn session() -> AuthSession {
        let now = Utc::now();
        AuthSession {
            user: User::new("u1", "ada@example.com", "Ada", now),
            session: Session {
                token: TOKEN.to_string(),
                user_id: "u1".to_string(),
                expires_at: now + chrono::Duration::days(30),
            },
        }
    }

    impl AuthProvider for SingleUser {
        fn sign_up<'a>(
            &'a self,
            email: &'a str,
            _password: &'a str,
            _name: &'a str,
        ) -> BoxFuture<'a, AuthResult<AuthSession>> {
            Box::pin(async move {
                if email == "ada@example.com" {
                    Err(AuthError::rejected("User already exists"))
                } else {
                    Ok(session())
                }
            })
        }

        fn sign_in<'a>(
            &'a self,
            _email: &'a str,
            password: &'a str,
        ) -> BoxFuture<'a, AuthResult<AuthSession>> {
            Box::pin(async move {
                match password {
                    "correct horse" => Ok(session()),
                    "locked" => Err(AuthError::rejected("Account locked")),
                    _ => Err(AuthError::invalid_credentials()),
                }
            })
        }

        fn sign_out<'a>(&'a self, token: &'a str) -> BoxFuture<'a, AuthResult<()>> {
            Box::pin(async move {
                self.signed_out.lock().push(token.to_string());
                Ok(())
            })
        }

        fn get_session<'a>(&'a self, token: &'a str) -> BoxFuture<'a, AuthResult<SessionInfo>> {
            Box::pin(async move {
                if token == TOKEN {
                    Ok(session())
                } else {
                    Err(AuthError::invalid_token())
                }
            })
        }
    }

    fn app(routes: AuthRoutes) -> App {
        let mut router = Router::new();
        routes.mount(&mut router).unwrap();
        App::builder(Arc::new(AppContext::production()))
            .router(router)
            .build()
            .unwrap()
    }

    fn request(method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> Request<Bytes> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = body.map_or_else(Bytes::new, |b| Bytes::from(b.to_string()));
        builder
            .header("content-type", "application/json")
            .body(body)
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_routes_are_prefixed() {
        let provider = Arc::new(SingleUser::default());
        let mut router = Router::new();
        AuthRoutes::new(provider).mount(&mut router).unwrap();
        let routes: Vec<(String, String)> = router
            .routes()
            .map(|(m, p)| (m.to_string(), p.to_string()))
            .collect();
        assert_eq!(
            routes,
            vec![
                ("POST".to_string(), "/api/auth/signup".to_string()),
                ("POST".to_string(), "/api/auth/signin".to_string()),
                ("POST".to_string(), "/api/auth/signout".to_string()),
                ("GET".to_string(), "/api/auth/session".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_sign_up_created() {
        let app = app(AuthRoutes::new(Arc::new(SingleUser::default())));
        let body = json!({"email": "grace@example.com", "password": "correct horse", "name": "Grace"});
        let response = app
            .handle(request(Method::POST, "/api/auth/signup", None, Some(body)))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "User created successfully");
        assert_eq!(json["data"]["session"]["token"], TOKEN);
    }

    #[tokio::test]
    async fn test_sign_up_duplicate_is_bad_request() {
        let app = app(AuthRoutes::new(Arc::new(SingleUser::default())));
        let body = json!({"email": "ada@example.com", "password": "correct horse", "name": "Ada"});
        let response = app
            .handle(request(Method::POST, "/api/auth/signup", None, Some(body)))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"success": false, "message": "User already exists"})
        );
    }

    #[tokio::test]
    async fn test_sign_up_validation() {
        let app = app(AuthRoutes::new(Arc::new(SingleUser::default())));
        let body = json!({"email": "ada", "password": "correct horse", "name": "Ada"});
        let response = app
            .handle(request(Method::POST, "/api/auth/signup", None, Some(body)))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["message"], "Validation failed");
        assert_eq!(json["data"]["errors"][0]["field"], "body.email");
        assert_eq!(json["data"]["errors"][0]["message"], "Invalid email address");
    }

    #[tokio::test]
    async fn test_sign_in_failures_are_unauthorized() {
        let app = app(AuthRoutes::new(Arc::new(SingleUser::default())));
        for password in ["wrong", "locked"] {
            let body = json!({"email": "ada@example.com", "password": password});
            let response = app
                .handle(request(Method::POST, "/api/auth/signin", None, Some(body)))
                .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(json_body(response).await["message"], "Invalid email or password");
        }
    }

    #[tokio::test]
    async fn test_session_requires_token() {
        let app = app(AuthRoutes::new(Arc::new(SingleUser::default())));
        let response = app
            .handle(request(Method::GET, "/api/auth/session", None, None))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await,
            json!({"success": false, "message": "Authorization token required"})
        );

        let response = app
            .handle(request(Method::GET, "/api/auth/session", Some("stale"), None))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["message"], "Invalid token");

        let response = app
            .handle(request(Method::GET, "/api/auth/session", Some(TOKEN), None))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["message"], "Session retrieved successfully");
        assert_eq!(json["data"]["user"]["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn test_sign_out() {
        let provider = Arc::new(SingleUser::default());
        let app = app(AuthRoutes::new(Arc::clone(&provider) as Arc<dyn AuthProvider>));
        let response = app
            .handle(request(Method::POST, "/api/auth/signout", Some(TOKEN), None))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"success": true, "message": "Signed out successfully"})
        );
        assert_eq!(*provider.signed_out.lock(), vec![TOKEN.to_string()]);
    }

    #[tokio::test]
    async fn test_shared_rate_limit() {
        let app = app(
            AuthRoutes::new(Arc::new(SingleUser::default()))
                .rate_limit(2, Duration::from_secs(60)),
        );
        let statuses = [
            app.handle(request(Method::GET, "/api/auth/session", Some(TOKEN), None))
                .await
                .status(),
            app.handle(request(Method::POST, "/api/auth/signout", Some(TOKEN), None))
                .await
                .status(),
        ];
        assert_eq!(statuses, [StatusCode::OK, StatusCode::OK]);

        let response = app
            .handle(request(Method::GET, "/api/auth/session", Some(TOKEN), None))
            .await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(http::header::RETRY_AFTER));
    }
}
