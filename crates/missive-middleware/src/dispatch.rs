//! Failure classification.
//!
//! The [`Dispatcher`] is the only place that decides the status code of a
//! failed request. It runs an ordered list of rules against the captured
//! [`Failure`]; the first rule that matches produces the [`Classification`].
//! The last rule matches everything, so dispatch never fails.
//!
//! | Order | Rule | Kind |
//! |---|---|---|
//! | 1 | schema violations | `Validation` |
//! | 2 | auth: token expired | `TokenExpired` |
//! | 3 | auth: invalid, missing, bad credentials | `Unauthorized` |
//! | 4 | storage: duplicate key | `Conflict` |
//! | 5 | storage: generic, connection, document validation | `Operational(500)`, `Operational(503)`, `Validation` |
//! | 6 | explicit 4xx or 5xx status | `Operational(n)` |
//! | 7 | rate-limit rejection | `RateLimited` |
//! | 8 | anything else | `Unknown` |

use missive_core::envelope::render;
use missive_core::{
    AppContext, AuthErrorKind, ErrorKind, Failure, RequestContext, Response, StorageErrorKind,
};
use serde_json::{json, Value};
use std::backtrace::BacktraceStatus;
use std::sync::Arc;

/// Message rendered for rate-limited requests.
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests, please try again later";

/// Marker searched for in unclassified failure messages.
const RATE_LIMIT_MARKER: &str = "Too many requests";

/// The outcome of classifying a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// The taxonomy entry.
    pub kind: ErrorKind,
    /// The message rendered in the envelope.
    pub message: String,
    /// Optional envelope data.
    pub data: Option<Value>,
    /// Seconds for the `Retry-After` header.
    pub retry_after: Option<u64>,
}

impl Classification {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
            retry_after: None,
        }
    }

    fn with_data(mut self, data: Option<Value>) -> Self {
        self.data = data;
        self
    }
}

type Rule = fn(&Dispatcher, &Failure) -> Option<Classification>;

const RULES: &[(&str, Rule)] = &[
    ("validation", Dispatcher::validation_rule),
    ("token_expired", Dispatcher::token_expired_rule),
    ("unauthorized", Dispatcher::unauthorized_rule),
    ("duplicate_key", Dispatcher::duplicate_key_rule),
    ("storage", Dispatcher::storage_rule),
    ("operational", Dispatcher::operational_rule),
    ("rate_limited", Dispatcher::rate_limited_rule),
];

/// Converts captured failures into responses.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    app: Arc<AppContext>,
}

impl Dispatcher {
    /// Creates a dispatcher for the given application.
    #[must_use]
    pub fn new(app: Arc<AppContext>) -> Self {
        Self { app }
    }

    /// Returns the application context.
    #[must_use]
    pub fn app(&self) -> &AppContext {
        &self.app
    }

    /// Classifies `failure`. Never fails.
    #[must_use]
    pub fn classify(&self, failure: &Failure) -> Classification {
        RULES
            .iter()
            .find_map(|(_, rule)| rule(self, failure))
            .unwrap_or_else(|| self.unknown(failure))
    }

    /// Returns the name of the rule that matches `failure`.
    #[must_use]
    pub fn matching_rule(&self, failure: &Failure) -> &'static str {
        RULES
            .iter()
            .find(|(_, rule)| rule(self, failure).is_some())
            .map_or("unknown", |(name, _)| *name)
    }

    /// Classifies, logs, and renders `failure` for the request in `ctx`.
    #[must_use]
    pub fn dispatch(&self, ctx: &RequestContext, failure: Failure) -> Response {
        let classification = self.classify(&failure);
        let status = classification.kind.status_code();

        if status.is_server_error() {
            tracing::error!(
                request_id = %ctx.request_id(),
                http.method = %ctx.method(),
                http.path = ctx.path_and_query(),
                http.status_code = status.as_u16(),
                error.kind = %classification.kind,
                error.source = failure.source_label(),
                error = %failure,
                "Error occurred"
            );
        } else {
            tracing::warn!(
                request_id = %ctx.request_id(),
                http.method = %ctx.method(),
                http.path = ctx.path_and_query(),
                http.status_code = status.as_u16(),
                error.kind = %classification.kind,
                error = %failure,
                "Request failed"
            );
        }
        missive_telemetry::metrics::record_failure(classification.kind.label());

        let mut response = render(status, Some(&classification.message), classification.data);
        if let Some(seconds) = classification.retry_after {
            response
                .headers_mut()
                .insert(http::header::RETRY_AFTER, http::HeaderValue::from(seconds));
        }
        response
    }

    fn dev_data(&self, failure: &Failure) -> Option<Value> {
        self.app
            .mode()
            .is_development()
            .then(|| json!({ "error": failure.to_string() }))
    }

    fn validation_rule(&self, failure: &Failure) -> Option<Classification> {
        let violations = failure.violations()?;
        Some(
            Classification::new(ErrorKind::Validation, "Validation failed")
                .with_data(Some(json!({ "errors": violations }))),
        )
    }

    fn token_expired_rule(&self, failure: &Failure) -> Option<Classification> {
        match failure {
            Failure::Auth(err) if err.kind() == AuthErrorKind::TokenExpired => {
                Some(Classification::new(ErrorKind::TokenExpired, "Token expired"))
            }
            _ => None,
        }
    }

    fn unauthorized_rule(&self, failure: &Failure) -> Option<Classification> {
        match failure {
            Failure::Auth(err)
                if matches!(
                    err.kind(),
                    AuthErrorKind::InvalidToken
                        | AuthErrorKind::MissingToken
                        | AuthErrorKind::InvalidCredentials
                ) =>
            {
                Some(Classification::new(ErrorKind::Unauthorized, err.message()))
            }
            _ => None,
        }
    }

    fn duplicate_key_rule(&self, failure: &Failure) -> Option<Classification> {
        match failure {
            Failure::Storage(err) if err.kind() == StorageErrorKind::DuplicateKey => Some(
                Classification::new(ErrorKind::Conflict, "Resource already exists")
                    .with_data(self.dev_data(failure)),
            ),
            _ => None,
        }
    }

    fn storage_rule(&self, failure: &Failure) -> Option<Classification> {
        let Failure::Storage(err) = failure else {
            return None;
        };
        let classification = match err.kind() {
            StorageErrorKind::Generic => Classification::new(
                ErrorKind::Operational(http::StatusCode::INTERNAL_SERVER_ERROR),
                "Database error occurred",
            )
            .with_data(self.dev_data(failure)),
            StorageErrorKind::Connection => Classification::new(
                ErrorKind::Operational(http::StatusCode::SERVICE_UNAVAILABLE),
                "Database unavailable",
            ),
            StorageErrorKind::Validation => {
                Classification::new(ErrorKind::Validation, "Validation error")
                    .with_data(self.dev_data(failure))
            }
            StorageErrorKind::DuplicateKey => return None,
        };
        Some(classification)
    }

    fn operational_rule(&self, failure: &Failure) -> Option<Classification> {
        // A status below 400 would render a success envelope.
        let status = failure
            .operational_status()
            .filter(|status| status.is_client_error() || status.is_server_error())?;
        let classification = Classification::new(ErrorKind::Operational(status), failure.to_string());
        if status.is_server_error() {
            Some(classification.with_data(self.dev_data(failure)))
        } else {
            Some(classification)
        }
    }

    fn rate_limited_rule(&self, failure: &Failure) -> Option<Classification> {
        match failure {
            Failure::RateLimited(rejection) => {
                let mut classification =
                    Classification::new(ErrorKind::RateLimited, RATE_LIMITED_MESSAGE);
                classification.retry_after = Some(rejection.retry_after_secs);
                Some(classification)
            }
            Failure::Unexpected(_) | Failure::Panic(_) | Failure::Operational { .. }
                if failure.to_string().contains(RATE_LIMIT_MARKER) =>
            {
                Some(Classification::new(ErrorKind::RateLimited, RATE_LIMITED_MESSAGE))
            }
            _ => None,
        }
    }

    fn unknown(&self, failure: &Failure) -> Classification {
        if self.app.mode().is_development() {
            let message = failure.to_string();
            let data = json!({ "error": message, "stack": stack_trace(failure) });
            Classification::new(ErrorKind::Unknown, message).with_data(Some(data))
        } else {
            Classification::new(ErrorKind::Unknown, self.app.generic_error_message())
        }
    }
}

/// Captured backtrace of an unexpected error, or the cause chain when no
/// backtrace was captured.
fn stack_trace(failure: &Failure) -> String {
    let causes: Vec<String> = match failure {
        Failure::Unexpected(err) => {
            if err.backtrace().status() == BacktraceStatus::Captured {
                return format!("{err:?}");
            }
            err.chain().map(ToString::to_string).collect()
        }
        other => std::iter::successors(Some(other as &dyn std::error::Error), |err| err.source())
            .map(ToString::to_string)
            .collect(),
    };
    causes.join("\n    caused by: ")
}
