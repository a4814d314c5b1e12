//! Terminal handler for unmatched routes.

use http::StatusCode;
use missive_core::envelope::render;
use missive_core::{RequestContext, Response};

/// Builds the not-found message for `method` and `url`.
///
/// `url` is the path plus query string as it appeared on the request line.
#[must_use]
pub fn not_found_message(method: &http::Method, url: &str) -> String {
    format!("Route {method} {url} not found")
}

/// Answers a request that matched no route.
#[must_use]
pub fn respond(ctx: &RequestContext) -> Response {
    let url = ctx.path_and_query();
    tracing::warn!(
        request_id = %ctx.request_id(),
        http.method = %ctx.method(),
        url = url,
        user_agent = ctx.header("user-agent").unwrap_or_default(),
        "Route not found: {} {}",
        ctx.method(),
        url
    );
    render(
        StatusCode::NOT_FOUND,
        Some(&not_found_message(ctx.method(), url)),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_message_keeps_query_string() {
        let ctx = RequestContext::builder(Method::DELETE, "/api/items/7?force=true".parse().unwrap()).build();
        let response = respond(&ctx);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"success":false,"message":"Route DELETE /api/items/7?force=true not found"}"#
        );
    }

    #[test]
    fn test_message_format() {
        assert_eq!(
            not_found_message(&Method::GET, "/doesnotexist"),
            "Route GET /doesnotexist not found"
        );
    }
}
