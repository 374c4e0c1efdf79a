use super::store::TokenBucketStore;
use super::types::{AdmissionDecision, AdmissionOutcome, BucketKey, BucketPolicy};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Decides admit/reject for one attempt and derives the header metadata
///
/// The governor holds no bucket state of its own; every decision is one
/// round-trip through the injected store. Store failures are handed back
/// untouched so the caller owns the fail-open decision.
#[derive(Clone)]
pub struct RateGovernor {
    store: Arc<dyn TokenBucketStore>,
}

impl RateGovernor {
    pub fn new(store: Arc<dyn TokenBucketStore>) -> Self {
        Self { store }
    }

    /// Get the underlying store
    pub fn store(&self) -> &Arc<dyn TokenBucketStore> {
        &self.store
    }

    /// Make exactly one admission attempt for `key` under `policy`
    pub async fn try_admit(&self, key: &BucketKey, policy: &BucketPolicy) -> AdmissionOutcome {
        let admission = match self.store.admit(key, policy).await {
            Ok(admission) => admission,
            Err(e) => return AdmissionOutcome::StoreUnavailable(e),
        };

        let reset_at = Utc::now().timestamp().max(0) as u64 + policy.window_secs();
        let mut decision = AdmissionDecision {
            admitted: admission.admitted,
            remaining_tokens: admission.available_tokens.max(0) as u64,
            limit: policy.capacity(),
            reset_at,
            retry_after_secs: None,
        };

        debug!(
            "Admission for key {} via {}: admitted={}, remaining={}",
            key,
            self.store.backend(),
            decision.admitted,
            decision.remaining_tokens
        );

        if decision.admitted {
            AdmissionOutcome::Admitted(decision)
        } else {
            decision.retry_after_secs =
                Some(retry_after_secs(admission.available_tokens, policy));
            AdmissionOutcome::Rejected(decision)
        }
    }
}

/// Seconds a rejected caller should wait
///
/// An exhausted bucket reports the whole window. A negative count means the
/// store cannot say where the window stands, so the amortized per-token
/// interval is used, rounded up and never below one second.
pub fn retry_after_secs(available_tokens: i64, policy: &BucketPolicy) -> u64 {
    if available_tokens >= 0 {
        return policy.window_secs();
    }

    let capacity = u64::from(policy.capacity().max(1));
    policy.window_secs().div_ceil(capacity).max(1)
}
