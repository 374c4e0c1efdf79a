use crate::error::{AppError, Result};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Key shared by every write request when no per-caller identity is configured
pub const GLOBAL_WRITE_KEY: &str = "global:write:api";

/// Capacity and refill cadence of a bucket
///
/// Immutable once built. `new` refuses a non-positive capacity or window while
/// the policy is enabled, so a serving process can never hold one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketPolicy {
    capacity: u32,
    window_secs: u64,
    enabled: bool,
}

impl BucketPolicy {
    /// Create a policy, validating it when enabled
    pub fn new(capacity: u32, window_secs: u64, enabled: bool) -> Result<Self> {
        if enabled {
            if capacity == 0 {
                return Err(AppError::ConfigurationInvalid(
                    "Rate limit capacity must be > 0".to_string(),
                ));
            }
            if window_secs == 0 {
                return Err(AppError::ConfigurationInvalid(
                    "Rate limit window must be > 0".to_string(),
                ));
            }
        }

        Ok(Self {
            capacity,
            window_secs,
            enabled,
        })
    }

    /// A policy that lets every request through untouched
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Get the refill window as a Duration
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for BucketPolicy {
    fn default() -> Self {
        Self {
            capacity: 100,
            window_secs: 60,
            enabled: true,
        }
    }
}

/// Identity of the quota being governed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey(Vec<u8>);

impl BucketKey {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self(key.into())
    }

    /// The single quota shared by all write operations on the API
    pub fn global_write() -> Self {
        Self::new(GLOBAL_WRITE_KEY)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Raw reply of a single atomic admission round-trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreAdmission {
    pub admitted: bool,
    /// Tokens left after this attempt's accounting
    pub available_tokens: i64,
}

/// The backing store could not be consulted
///
/// Never conflated with a rejection: callers decide what an unreachable
/// store means for the request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreUnavailable {
    #[error("rate limit store connection failed: {0}")]
    Connection(String),

    #[error("rate limit store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("rate limit store protocol error: {0}")]
    Protocol(String),
}

/// Per-request admission decision with the metadata exposed in headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub admitted: bool,
    /// Tokens left after this request, never negative
    pub remaining_tokens: u64,
    /// Configured capacity
    pub limit: u32,
    /// Unix timestamp (seconds) by which the bucket is full again
    pub reset_at: u64,
    /// Seconds a rejected caller should wait before retrying
    pub retry_after_secs: Option<u64>,
}

/// Tagged result of one governed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionOutcome {
    Admitted(AdmissionDecision),
    Rejected(AdmissionDecision),
    StoreUnavailable(StoreUnavailable),
}
