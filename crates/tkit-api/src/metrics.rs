//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "tkit_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "tkit_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "tkit_http_requests_in_flight";

    // Transfer metrics
    pub const UPLOADS_TOTAL: &str = "tkit_uploads_total";
    pub const UPLOAD_BYTES_TOTAL: &str = "tkit_upload_bytes_total";
    pub const UPLOAD_DURATION_SECONDS: &str = "tkit_upload_duration_seconds";
    pub const DOWNLOADS_TOTAL: &str = "tkit_downloads_total";
    pub const CLEANUP_FAILURES_TOTAL: &str = "tkit_cleanup_failures_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a stored upload.
pub fn record_upload(mode: &str, bytes: u64, duration_secs: f64) {
    let labels = [("mode", mode.to_string())];
    counter!(names::UPLOADS_TOTAL, &labels).increment(1);
    counter!(names::UPLOAD_BYTES_TOTAL).increment(bytes);
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration_secs);
}

pub fn record_download() {
    counter!(names::DOWNLOADS_TOTAL).increment(1);
}

/// Record a file that could not be removed after a download.
pub fn record_cleanup_failure(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::CLEANUP_FAILURES_TOTAL, &labels).increment(1);
}

static STATUS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/video/status/[^/]+$").expect("valid regex"));
static DOWNLOAD_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/video/download/[^/]+$").expect("valid regex"));

/// Sanitize path for metrics labels (job ids and file names become placeholders).
fn sanitize_path(path: &str) -> String {
    let path = STATUS_PATH.replace(path, "/video/status/:job_id");
    let path = DOWNLOAD_PATH.replace(&path, "/video/download/:filename");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
