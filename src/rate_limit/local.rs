use super::store::TokenBucketStore;
use super::types::{BucketKey, BucketPolicy, StoreAdmission, StoreUnavailable};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use tokio::time::Instant;
use tracing::debug;

/// Local (in-memory) bucket store using the same sliding window as Redis
///
/// Only coordinates callers inside one process. Each key's entry lock makes
/// check-and-record atomic per key. Time comes from `tokio::time`, so tests
/// can pause and advance the clock across refill boundaries.
#[derive(Default)]
pub struct InMemoryTokenBucketStore {
    /// Admission timestamps per key, oldest first
    buckets: DashMap<Vec<u8>, VecDeque<Instant>>,
}

impl InMemoryTokenBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of buckets created so far (for testing/monitoring)
    pub fn active_buckets(&self) -> usize {
        self.buckets.len()
    }
}

#[async_trait]
impl TokenBucketStore for InMemoryTokenBucketStore {
    async fn admit(
        &self,
        key: &BucketKey,
        policy: &BucketPolicy,
    ) -> Result<StoreAdmission, StoreUnavailable> {
        let now = Instant::now();
        let window = policy.window();
        let capacity = policy.capacity() as usize;

        let mut admissions = self
            .buckets
            .entry(key.as_bytes().to_vec())
            .or_insert_with(|| {
                debug!("Creating new bucket for key: {}", key);
                VecDeque::new()
            });

        while admissions
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= window)
        {
            admissions.pop_front();
        }

        let admitted = admissions.len() < capacity;
        if admitted {
            admissions.push_back(now);
        }

        Ok(StoreAdmission {
            admitted,
            available_tokens: capacity as i64 - admissions.len() as i64,
        })
    }

    async fn reset(&self, key: &BucketKey) -> Result<(), StoreUnavailable> {
        self.buckets.remove(key.as_bytes());
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreUnavailable> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
