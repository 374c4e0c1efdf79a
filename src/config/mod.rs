use crate::error::{AppError, Result};
use crate::rate_limit::types::{BucketKey, BucketPolicy, GLOBAL_WRITE_KEY};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `AWARDS__RATE_LIMIT__ENABLED=false`
pub const ENV_PREFIX: &str = "AWARDS";

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Write-path rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    /// Shared rate limit store connection
    #[serde(default)]
    pub redis: RedisConnectionConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Where bucket state lives
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Shared across instances
    Redis,
    /// Process-local, for development
    Memory,
}

/// Write-path rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Enable rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Write requests allowed per window
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u32,
    /// Window length in minutes
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u64,
    /// Bucket key shared by every write request
    #[serde(default = "default_bucket_key")]
    pub key: String,
    /// Path prefix of the protected API surface
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Upper bound for a single store round-trip in milliseconds
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// Store backend
    #[serde(default = "default_store_backend")]
    pub store: StoreBackend,
}

/// Redis connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConnectionConfig {
    #[serde(default = "default_redis_host")]
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
}

/// Log output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of the compact format
    #[serde(default)]
    pub json: bool,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    30
}

fn default_requests_per_window() -> u32 {
    100
}

fn default_window_minutes() -> u64 {
    1
}

fn default_bucket_key() -> String {
    GLOBAL_WRITE_KEY.to_string()
}

fn default_api_prefix() -> String {
    "/api/".to_string()
}

fn default_store_timeout_ms() -> u64 {
    500
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Redis
}

fn default_redis_host() -> String {
    "localhost".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            requests_per_window: default_requests_per_window(),
            window_minutes: default_window_minutes(),
            key: default_bucket_key(),
            api_prefix: default_api_prefix(),
            store_timeout_ms: default_store_timeout_ms(),
            store: default_store_backend(),
        }
    }
}

impl Default for RedisConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
        }
    }
}

impl RateLimitSettings {
    /// Build the bucket policy, rejecting non-positive values when enabled
    pub fn policy(&self) -> Result<BucketPolicy> {
        let window_secs = self.window_minutes.checked_mul(60).ok_or_else(|| {
            AppError::ConfigurationInvalid(format!(
                "Rate limit window of {} minutes is too large",
                self.window_minutes
            ))
        })?;

        BucketPolicy::new(self.requests_per_window, window_secs, self.enabled)
    }

    pub fn bucket_key(&self) -> BucketKey {
        BucketKey::new(self.key.as_str())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl RedisConnectionConfig {
    /// Connection URL for the redis client
    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

impl AppConfig {
    /// Load configuration from a file layered with `AWARDS__*` environment variables
    ///
    /// A missing file is not an error; defaults and the environment still apply.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(format!("Failed to load config: {}", e)))?;

        settings
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.enabled {
            if self.rate_limit.requests_per_window == 0 {
                return Err(AppError::ConfigurationInvalid(
                    "Rate limit requests_per_window must be > 0".to_string(),
                ));
            }
            if self.rate_limit.window_minutes == 0 {
                return Err(AppError::ConfigurationInvalid(
                    "Rate limit window_minutes must be > 0".to_string(),
                ));
            }
            if self.rate_limit.key.is_empty() {
                return Err(AppError::ConfigurationInvalid(
                    "Rate limit key cannot be empty".to_string(),
                ));
            }
            if self.rate_limit.store_timeout_ms == 0 {
                return Err(AppError::ConfigurationInvalid(
                    "Rate limit store_timeout_ms must be > 0".to_string(),
                ));
            }
        }

        if !self.rate_limit.api_prefix.starts_with('/') {
            return Err(AppError::ConfigurationInvalid(format!(
                "API prefix must start with '/': {}",
                self.rate_limit.api_prefix
            )));
        }

        self.rate_limit.policy()?;

        Ok(())
    }
}
