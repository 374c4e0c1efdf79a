//! Write-path admission control
//!
//! Every mutating request (`POST`, `PUT`, `PATCH`, `DELETE`) under the API
//! prefix draws one token from a bucket shared by all server instances.
//!
//! - **TokenBucketStore**: atomic admit primitive over shared state, backed by
//!   Redis (Lua script) or an in-process map
//! - **RateGovernor**: one admission attempt plus the derived header metadata
//! - **AdmissionMiddleware**: request classification, `X-RateLimit-*` headers
//!   and `429` rejections
//!
//! An unreachable store never blocks traffic: the request is admitted without
//! rate limit headers and the failure is logged.
//!
//! # Example
//!
//! ```rust,no_run
//! use awards_api::rate_limit::{
//!     AdmissionMiddleware, BucketKey, BucketPolicy, InMemoryTokenBucketStore, RateGovernor,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryTokenBucketStore::new());
//! let admission = AdmissionMiddleware::new(
//!     Arc::new(RateGovernor::new(store)),
//!     BucketPolicy::default(),
//!     BucketKey::global_write(),
//!     "/api/",
//! );
//!
//! // Or share the bucket across instances through Redis
//! // let store = RedisTokenBucketStore::connect("redis://localhost:6379", timeout).await?;
//! ```

pub mod local;
pub mod lua_scripts;
pub mod middleware;
pub mod redis;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use local::InMemoryTokenBucketStore;
pub use middleware::{
    add_rate_limit_headers, admission_middleware, is_protected_path, is_write_method,
    AdmissionMiddleware, AdmissionState,
};
pub use self::redis::RedisTokenBucketStore;
pub use service::{retry_after_secs, RateGovernor};
pub use store::TokenBucketStore;
pub use types::{
    AdmissionDecision, AdmissionOutcome, BucketKey, BucketPolicy, StoreAdmission,
    StoreUnavailable, GLOBAL_WRITE_KEY,
};
