use crate::rate_limit::TokenBucketStore;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Health report
///
/// The service stays `UP` while the rate limit store is down, since writes
/// are admitted without limits in that case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    pub rate_limit_store: String,
}

/// Health endpoint handler
pub async fn health_handler(
    State(store): State<Arc<dyn TokenBucketStore>>,
) -> Json<HealthStatus> {
    let rate_limit_store = match store.ping().await {
        Ok(()) => "UP",
        Err(e) => {
            warn!("Rate limit store ({}) health check failed: {}", store.backend(), e);
            "DOWN"
        }
    };

    Json(HealthStatus {
        status: "UP".to_string(),
        rate_limit_store: rate_limit_store.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::InMemoryTokenBucketStore;

    #[tokio::test]
    async fn test_health_with_memory_store() {
        let store: Arc<dyn TokenBucketStore> = Arc::new(InMemoryTokenBucketStore::new());
        let Json(health) = health_handler(State(store)).await;

        assert_eq!(health.status, "UP");
        assert_eq!(health.rate_limit_store, "UP");
    }
}
