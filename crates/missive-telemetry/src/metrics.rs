//! Request metrics.
//!
//! Metrics go through the `metrics` facade. Installing an exporter is left
//! to the embedding process; without one every call here is a no-op.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `missive_requests_total` | Counter | `method`, `status` |
//! | `missive_request_duration_seconds` | Histogram | `method` |
//! | `missive_failures_total` | Counter | `kind` |
//! | `missive_rate_limited_total` | Counter | `limiter` |

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Counter of completed requests.
pub const REQUESTS_TOTAL: &str = "missive_requests_total";

/// Histogram of pipeline time.
pub const REQUEST_DURATION_SECONDS: &str = "missive_request_duration_seconds";

/// Counter of dispatched failures by kind.
pub const FAILURES_TOTAL: &str = "missive_failures_total";

/// Counter of rate-limit rejections by limiter.
pub const RATE_LIMITED_TOTAL: &str = "missive_rate_limited_total";

/// Registers descriptions with the installed recorder.
///
/// Call once after installing an exporter.
pub fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, Unit::Count, "Completed requests");
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "Time spent in the request pipeline"
    );
    describe_counter!(FAILURES_TOTAL, Unit::Count, "Failures turned into responses");
    describe_counter!(RATE_LIMITED_TOTAL, Unit::Count, "Requests rejected by a limiter");
}

/// Records a completed request.
pub fn record_request(method: &str, status: u16, duration: Duration) {
    counter!(REQUESTS_TOTAL, "method" => method.to_string(), "status" => status.to_string())
        .increment(1);
    histogram!(REQUEST_DURATION_SECONDS, "method" => method.to_string())
        .record(duration.as_secs_f64());
}

/// Records a dispatched failure.
pub fn record_failure(kind: &'static str) {
    counter!(FAILURES_TOTAL, "kind" => kind).increment(1);
}

/// Records a rate-limit rejection.
pub fn record_rate_limited(limiter: &'static str) {
    counter!(RATE_LIMITED_TOTAL, "limiter" => limiter).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        describe_metrics();
        record_request("GET", 200, Duration::from_millis(3));
        record_failure("validation");
        record_rate_limited("auth");
    }

    #[test]
    fn test_metric_names() {
        for name in [
            REQUESTS_TOTAL,
            REQUEST_DURATION_SECONDS,
            FAILURES_TOTAL,
            RATE_LIMITED_TOTAL,
        ] {
            assert!(name.starts_with("missive_"));
        }
    }
}
