use super::types::{BucketKey, BucketPolicy, StoreAdmission, StoreUnavailable};
use async_trait::async_trait;

/// Shared bucket state behind an atomic admit primitive
///
/// `admit` must check and consume in one indivisible step with respect to
/// every other `admit` on the same key, including calls made by other
/// processes sharing the backing store.
#[async_trait]
pub trait TokenBucketStore: Send + Sync {
    /// Try to take one token for `key` under `policy`
    async fn admit(
        &self,
        key: &BucketKey,
        policy: &BucketPolicy,
    ) -> Result<StoreAdmission, StoreUnavailable>;

    /// Drop the bucket for `key`; it is recreated full on the next admit
    async fn reset(&self, key: &BucketKey) -> Result<(), StoreUnavailable>;

    /// Check that the backing store answers
    async fn ping(&self) -> Result<(), StoreUnavailable>;

    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;
}
