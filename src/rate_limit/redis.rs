use super::lua_scripts::SLIDING_WINDOW_ADMIT_SCRIPT;
use super::store::TokenBucketStore;
use super::types::{BucketKey, BucketPolicy, StoreAdmission, StoreUnavailable};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client, RedisError, Script};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Redis-backed distributed bucket store
///
/// The connection is established lazily and shared by every request; a
/// failed connect is retried on the next admission rather than at startup.
pub struct RedisTokenBucketStore {
    client: Client,
    /// Redis connection manager, created on first use
    connection: Arc<OnceCell<ConnectionManager>>,
    script: Script,
    /// Upper bound for one store round-trip
    timeout: Duration,
}

impl From<RedisError> for StoreUnavailable {
    fn from(err: RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            StoreUnavailable::Connection(err.to_string())
        } else {
            StoreUnavailable::Protocol(err.to_string())
        }
    }
}

impl RedisTokenBucketStore {
    /// Create a store for `redis_url` without connecting yet
    pub fn new(redis_url: &str, timeout: Duration) -> Result<Self, RedisError> {
        let client = Client::open(redis_url)?;

        Ok(Self {
            client,
            connection: Arc::new(OnceCell::new()),
            script: Script::new(SLIDING_WINDOW_ADMIT_SCRIPT),
            timeout,
        })
    }

    /// Create a store and probe the server once
    ///
    /// An unreachable server is logged and tolerated: admission checks fail
    /// open until it comes back.
    pub async fn connect(redis_url: &str, timeout: Duration) -> Result<Self, RedisError> {
        info!("Initializing Redis rate limit store at {}", redis_url);
        let store = Self::new(redis_url, timeout)?;

        match store.ping().await {
            Ok(()) => info!("Redis connection successful"),
            Err(e) => warn!(
                "Redis ping failed: {}, write requests will be admitted without limits until it recovers",
                e
            ),
        }

        Ok(store)
    }

    /// Run one round-trip in its own task, bounded by the store timeout
    ///
    /// The spawned task keeps running when the caller goes away, so a
    /// request dropped mid-check still leaves the bucket consistent.
    async fn round_trip<T, F, Fut>(&self, op: F) -> Result<T, StoreUnavailable>
    where
        T: Send + 'static,
        F: FnOnce(ConnectionManager) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, RedisError>> + Send + 'static,
    {
        let client = self.client.clone();
        let cell = self.connection.clone();

        let task = tokio::spawn(async move {
            let manager = cell
                .get_or_try_init(|| ConnectionManager::new(client))
                .await?
                .clone();
            op(manager).await
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result.map_err(StoreUnavailable::from),
            Ok(Err(join_err)) => Err(StoreUnavailable::Connection(format!(
                "store task failed: {}",
                join_err
            ))),
            Err(_) => Err(StoreUnavailable::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl TokenBucketStore for RedisTokenBucketStore {
    async fn admit(
        &self,
        key: &BucketKey,
        policy: &BucketPolicy,
    ) -> Result<StoreAdmission, StoreUnavailable> {
        let script = self.script.clone();
        let redis_key = key.as_bytes().to_vec();
        let capacity = policy.capacity();
        let window_micros = u64::try_from(policy.window().as_micros()).unwrap_or(u64::MAX);
        let member = Uuid::new_v4().to_string();

        let reply: Vec<i64> = self
            .round_trip(move |mut connection| async move {
                script
                    .key(redis_key)
                    .arg(capacity)
                    .arg(window_micros)
                    .arg(member)
                    .invoke_async::<_, Vec<i64>>(&mut connection)
                    .await
            })
            .await?;

        match reply.as_slice() {
            [admitted, available] => {
                debug!(
                    "Sliding window check for key {}: admitted={}, available={}",
                    key, admitted, available
                );
                Ok(StoreAdmission {
                    admitted: *admitted == 1,
                    available_tokens: *available,
                })
            }
            other => Err(StoreUnavailable::Protocol(format!(
                "unexpected admission reply {:?}",
                other
            ))),
        }
    }

    async fn reset(&self, key: &BucketKey) -> Result<(), StoreUnavailable> {
        let redis_key = key.as_bytes().to_vec();
        self.round_trip(move |mut connection| async move {
            redis::cmd("DEL")
                .arg(redis_key)
                .query_async::<_, i64>(&mut connection)
                .await
        })
        .await?;

        info!("Reset rate limit bucket {}", key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreUnavailable> {
        self.round_trip(|mut connection| async move {
            redis::cmd("PING")
                .query_async::<_, String>(&mut connection)
                .await
        })
        .await
        .map(|_| ())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: tests marked #[ignore] require a running Redis instance.
    // Run with: cargo test -- --ignored

    fn test_key(prefix: &str) -> BucketKey {
        BucketKey::new(format!("{}-{}", prefix, rand::random::<u32>()))
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(RedisTokenBucketStore::new("not-a-url", Duration::from_millis(100)).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_store_unavailable() {
        // Nothing listens on port 1
        let store =
            RedisTokenBucketStore::new("redis://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let policy = BucketPolicy::new(5, 60, true).unwrap();

        let result = store.admit(&test_key("unreachable"), &policy).await;
        assert!(matches!(
            result,
            Err(StoreUnavailable::Connection(_)) | Err(StoreUnavailable::Timeout(_))
        ));
    }

    /// Accept connections and never answer on them
    async fn silent_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        format!("redis://{}", addr)
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let timeout = Duration::from_millis(300);
        let store = RedisTokenBucketStore::new(&silent_server().await, timeout).unwrap();
        let policy = BucketPolicy::new(5, 60, true).unwrap();

        let started = std::time::Instant::now();
        let result = store.admit(&test_key("silent"), &policy).await;

        assert_eq!(result, Err(StoreUnavailable::Timeout(timeout)));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(matches!(store.ping().await, Err(StoreUnavailable::Timeout(_))));
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_admits_up_to_capacity() {
        let store = RedisTokenBucketStore::connect("redis://127.0.0.1:6379", Duration::from_secs(1))
            .await
            .expect("Failed to create Redis store");
        let policy = BucketPolicy::new(10, 60, true).unwrap();
        let key = test_key("test-admit");

        for i in 0..10 {
            let admission = store.admit(&key, &policy).await.unwrap();
            assert!(admission.admitted, "Request {} should be admitted", i);
            assert_eq!(admission.available_tokens, 9 - i);
        }

        let admission = store.admit(&key, &policy).await.unwrap();
        assert!(!admission.admitted);
        assert_eq!(admission.available_tokens, 0);
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_reset_refills_bucket() {
        let store = RedisTokenBucketStore::connect("redis://127.0.0.1:6379", Duration::from_secs(1))
            .await
            .expect("Failed to create Redis store");
        let policy = BucketPolicy::new(1, 60, true).unwrap();
        let key = test_key("test-reset");

        assert!(store.admit(&key, &policy).await.unwrap().admitted);
        assert!(!store.admit(&key, &policy).await.unwrap().admitted);

        store.reset(&key).await.unwrap();
        assert!(store.admit(&key, &policy).await.unwrap().admitted);
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_connection() {
        let store = RedisTokenBucketStore::connect("redis://127.0.0.1:6379", Duration::from_secs(1))
            .await
            .expect("Failed to create Redis store");

        assert!(store.ping().await.is_ok());
    }
}
