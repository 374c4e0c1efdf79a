use super::service::RateGovernor;
use super::types::{AdmissionDecision, AdmissionOutcome, BucketKey, BucketPolicy};
use crate::error::ApiError;
use crate::metrics;
use crate::observability::RequestId;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";
pub const RETRY_AFTER_HEADER: &str = "retry-after";

const REJECTION_MESSAGE: &str =
    "Rate limit exceeded. Too many write requests. Please try again later.";

/// Where a request ended up after admission control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionState {
    /// Not a candidate, or limiting is disabled
    Passthrough,
    Admitted(AdmissionDecision),
    Rejected(AdmissionDecision),
    /// Store unreachable; forwarded without headers
    DegradedAdmit,
}

/// Admission control for write requests on the protected API surface
#[derive(Clone)]
pub struct AdmissionMiddleware {
    governor: Arc<RateGovernor>,
    policy: BucketPolicy,
    key: BucketKey,
    /// Path prefix of the protected mutation surface
    api_prefix: Arc<str>,
}

impl AdmissionMiddleware {
    /// Create a new admission middleware
    pub fn new(
        governor: Arc<RateGovernor>,
        policy: BucketPolicy,
        key: BucketKey,
        api_prefix: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            governor,
            policy,
            key,
            api_prefix: api_prefix.into(),
        }
    }

    pub fn policy(&self) -> &BucketPolicy {
        &self.policy
    }

    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    /// Both the method and the path must match for limiting to apply
    pub fn is_candidate(&self, method: &Method, path: &str) -> bool {
        is_write_method(method) && is_protected_path(path, &self.api_prefix)
    }

    /// Run admission control for one request
    pub async fn evaluate(&self, method: &Method, path: &str) -> AdmissionState {
        if !self.policy.enabled() || !self.is_candidate(method, path) {
            return AdmissionState::Passthrough;
        }

        match self.governor.try_admit(&self.key, &self.policy).await {
            AdmissionOutcome::Admitted(decision) => {
                debug!(
                    method = %method,
                    path = %path,
                    remaining = decision.remaining_tokens,
                    "Write request admitted"
                );
                metrics::record_admission("admitted");
                AdmissionState::Admitted(decision)
            }
            AdmissionOutcome::Rejected(decision) => {
                metrics::record_admission("rejected");
                metrics::record_rate_limit_exceeded(method.as_str(), path);
                AdmissionState::Rejected(decision)
            }
            AdmissionOutcome::StoreUnavailable(e) => {
                error!(
                    method = %method,
                    path = %path,
                    "Error checking rate limit, admitting request: {}",
                    e
                );
                metrics::record_admission("degraded");
                AdmissionState::DegradedAdmit
            }
        }
    }
}

/// Write methods: POST, PUT, PATCH and DELETE
pub fn is_write_method(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}

/// Whether `path` lies under the protected prefix
pub fn is_protected_path(path: &str, api_prefix: &str) -> bool {
    path.starts_with(api_prefix)
}

/// Axum middleware function for write-path admission control
pub async fn admission_middleware(
    State(admission): State<AdmissionMiddleware>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    match admission.evaluate(&method, &path).await {
        AdmissionState::Passthrough | AdmissionState::DegradedAdmit => next.run(request).await,
        AdmissionState::Admitted(decision) => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(response.headers_mut(), &decision);
            response
        }
        AdmissionState::Rejected(decision) => {
            warn!(
                method = %method,
                path = %path,
                request_id = %request_id,
                retry_after = ?decision.retry_after_secs,
                "Rate limit exceeded for key {}",
                admission.key
            );
            create_rate_limit_response(&decision)
        }
    }
}

/// Add `X-RateLimit-*` headers for a decision
///
/// The reset header is only sent once the bucket has been drawn down.
pub fn add_rate_limit_headers(headers: &mut HeaderMap, decision: &AdmissionDecision) {
    headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(
        RATE_LIMIT_REMAINING_HEADER,
        HeaderValue::from(decision.remaining_tokens),
    );

    if decision.remaining_tokens < u64::from(decision.limit) {
        headers.insert(RATE_LIMIT_RESET_HEADER, HeaderValue::from(decision.reset_at));
    }
}

/// Create a 429 Too Many Requests response with rate limit headers
fn create_rate_limit_response(decision: &AdmissionDecision) -> Response {
    let retry_after = decision.retry_after_secs.unwrap_or(1);

    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ApiError::new(StatusCode::TOO_MANY_REQUESTS, REJECTION_MESSAGE)),
    )
        .into_response();

    let headers = response.headers_mut();
    add_rate_limit_headers(headers, decision);
    headers.insert(RETRY_AFTER_HEADER, HeaderValue::from(retry_after));

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::local::InMemoryTokenBucketStore;

    fn middleware(capacity: u32, enabled: bool) -> AdmissionMiddleware {
        let store = Arc::new(InMemoryTokenBucketStore::new());
        AdmissionMiddleware::new(
            Arc::new(RateGovernor::new(store)),
            BucketPolicy::new(capacity, 60, enabled).unwrap(),
            BucketKey::global_write(),
            "/api/",
        )
    }

    fn decision(remaining: u64, limit: u32) -> AdmissionDecision {
        AdmissionDecision {
            admitted: remaining > 0,
            remaining_tokens: remaining,
            limit,
            reset_at: 1_700_000_060,
            retry_after_secs: None,
        }
    }

    #[test]
    fn test_write_methods() {
        assert!(is_write_method(&Method::POST));
        assert!(is_write_method(&Method::PUT));
        assert!(is_write_method(&Method::PATCH));
        assert!(is_write_method(&Method::DELETE));
        assert!(!is_write_method(&Method::GET));
        assert!(!is_write_method(&Method::HEAD));
        assert!(!is_write_method(&Method::OPTIONS));
    }

    #[test]
    fn test_protected_paths() {
        assert!(is_protected_path("/api/employees", "/api/"));
        assert!(is_protected_path("/api/employees/4/awards", "/api/"));
        assert!(!is_protected_path("/health", "/api/"));
        assert!(!is_protected_path("/metrics", "/api/"));
        assert!(!is_protected_path("/apidocs", "/api/"));
    }

    #[test]
    fn test_candidate_needs_both_predicates() {
        let mw = middleware(10, true);
        assert!(mw.is_candidate(&Method::POST, "/api/employees"));
        assert!(!mw.is_candidate(&Method::GET, "/api/employees"));
        assert!(!mw.is_candidate(&Method::POST, "/health"));
    }

    #[tokio::test]
    async fn test_evaluate_walks_admitted_then_rejected() {
        let mw = middleware(1, true);

        let first = mw.evaluate(&Method::POST, "/api/employees").await;
        assert!(matches!(first, AdmissionState::Admitted(ref d) if d.remaining_tokens == 0));

        let second = mw.evaluate(&Method::DELETE, "/api/activities/3").await;
        assert!(matches!(second, AdmissionState::Rejected(ref d) if d.retry_after_secs == Some(60)));

        let read = mw.evaluate(&Method::GET, "/api/employees").await;
        assert_eq!(read, AdmissionState::Passthrough);
    }

    #[tokio::test]
    async fn test_evaluate_disabled_policy_is_passthrough() {
        let mw = middleware(1, false);
        for _ in 0..5 {
            assert_eq!(
                mw.evaluate(&Method::POST, "/api/employees").await,
                AdmissionState::Passthrough
            );
        }
    }

    #[test]
    fn test_headers_include_reset_only_when_drawn_down() {
        let mut headers = HeaderMap::new();
        add_rate_limit_headers(&mut headers, &decision(100, 100));
        assert_eq!(headers.get("X-RateLimit-Limit").unwrap(), "100");
        assert_eq!(headers.get("X-RateLimit-Remaining").unwrap(), "100");
        assert!(headers.get("X-RateLimit-Reset").is_none());

        let mut headers = HeaderMap::new();
        add_rate_limit_headers(&mut headers, &decision(99, 100));
        assert_eq!(headers.get("X-RateLimit-Reset").unwrap(), "1700000060");
    }

    #[test]
    fn test_rate_limit_response() {
        let mut rejected = decision(0, 100);
        rejected.retry_after_secs = Some(60);
        let response = create_rate_limit_response(&rejected);

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let headers = response.headers();
        assert_eq!(headers.get("X-RateLimit-Limit").unwrap(), "100");
        assert_eq!(headers.get("X-RateLimit-Remaining").unwrap(), "0");
        assert_eq!(headers.get("Retry-After").unwrap(), "60");
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
    }
}
