use crate::error::{AppError, Result};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Metrics service for collecting and exposing Prometheus metrics
#[derive(Clone)]
pub struct MetricsService {
    handle: Arc<PrometheusHandle>,
}

impl MetricsService {
    /// Create a new metrics service
    pub fn new() -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            AppError::Internal(format!("Failed to install metrics recorder: {}", e))
        })?;

        // Register all metrics with descriptions
        Self::register_metrics();

        info!("Metrics service initialized successfully");

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    /// Register all metrics with descriptions
    fn register_metrics() {
        describe_counter!(
            "awards_requests_total",
            "Total number of HTTP requests received"
        );
        describe_histogram!(
            "awards_request_duration_seconds",
            "HTTP request latencies in seconds"
        );
        describe_counter!(
            "awards_admission_total",
            "Write requests by admission outcome (admitted, rejected, degraded)"
        );
        describe_counter!(
            "awards_rate_limit_exceeded_total",
            "Total number of write requests rejected due to rate limiting"
        );

        debug!("All metrics registered with descriptions");
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Metrics endpoint handler
pub async fn metrics_handler(State(service): State<MetricsService>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(service.render()),
    )
}

/// Middleware recording count and latency of every request
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let timer = Timer::new(request.method().to_string(), request.uri().path().to_string());
    let response = next.run(request).await;
    timer.record(response.status().as_u16());
    response
}

/// Record a request metric
pub fn record_request(method: &str, path: &str, status: u16, duration: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("awards_requests_total", &labels).increment(1);
    histogram!("awards_request_duration_seconds", &labels).record(duration);
}

/// Record the outcome of an admission check
pub fn record_admission(outcome: &'static str) {
    counter!("awards_admission_total", "outcome" => outcome).increment(1);
}

/// Record rate limit exceeded
pub fn record_rate_limit_exceeded(method: &str, path: &str) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
    ];
    counter!("awards_rate_limit_exceeded_total", &labels).increment(1);
}

/// Replace id-like path segments to keep label cardinality bounded
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .map(|seg| if is_likely_id(seg) { ":id" } else { seg })
        .collect::<Vec<_>>()
        .join("/")
}

/// Check if a path segment is likely an ID (numeric or UUID)
fn is_likely_id(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }

    if segment.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    segment.len() >= 32
        && segment.contains('-')
        && segment.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

/// Timer for measuring request duration
pub struct Timer {
    start: Instant,
    method: String,
    path: String,
}

impl Timer {
    /// Start a new timer for a request
    pub fn new(method: String, path: String) -> Self {
        Self {
            start: Instant::now(),
            method,
            path,
        }
    }

    /// Record the elapsed time with the given status code
    pub fn record(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();
        record_request(&self.method, &self.path, status, duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/api/employees/123"), "/api/employees/:id");
        assert_eq!(
            sanitize_path("/api/employees/42/awards"),
            "/api/employees/:id/awards"
        );
        assert_eq!(
            sanitize_path("/api/activities/550e8400-e29b-41d4-a716-446655440000"),
            "/api/activities/:id"
        );
        assert_eq!(sanitize_path("/api/organizations"), "/api/organizations");
    }

    #[test]
    fn test_is_likely_id() {
        assert!(is_likely_id("123"));
        assert!(is_likely_id("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_likely_id("employees"));
        assert!(!is_likely_id("awards"));
        assert!(!is_likely_id(""));
    }

    #[test]
    fn test_timer_creation() {
        let timer = Timer::new("POST".to_string(), "/api/employees".to_string());
        assert_eq!(timer.method, "POST");
        assert_eq!(timer.path, "/api/employees");
    }

    #[test]
    fn test_record_functions_dont_panic() {
        // These functions should not panic even if recorder isn't installed
        record_request("GET", "/api/employees", 200, 0.012);
        record_admission("admitted");
        record_admission("degraded");
        record_rate_limit_exceeded("POST", "/api/employees");
    }
}
