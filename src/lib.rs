pub mod api;
pub mod config;
pub mod error;
pub mod healthcheck;
pub mod metrics;
pub mod observability;
pub mod rate_limit;

use crate::api::Repository;
use crate::config::{AppConfig, RateLimitSettings, StoreBackend};
use crate::error::{AppError, Result};
use crate::healthcheck::health_handler;
use crate::metrics::{metrics_handler, track_metrics, MetricsService};
use crate::observability::request_id_middleware;
use crate::rate_limit::{
    admission_middleware, AdmissionMiddleware, InMemoryTokenBucketStore, RateGovernor,
    RedisTokenBucketStore, TokenBucketStore,
};
use axum::{middleware, routing::get, Router as AxumRouter};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, warn};

/// Create the bucket store selected by configuration
pub async fn build_store(config: &AppConfig) -> Result<Arc<dyn TokenBucketStore>> {
    if !config.rate_limit.enabled {
        info!("Write rate limiting disabled");
        return Ok(Arc::new(InMemoryTokenBucketStore::new()));
    }

    match config.rate_limit.store {
        StoreBackend::Memory => {
            warn!("Using in-memory rate limit store; limits are not shared across instances");
            Ok(Arc::new(InMemoryTokenBucketStore::new()))
        }
        StoreBackend::Redis => {
            let url = config.redis.url();
            let store = RedisTokenBucketStore::connect(&url, config.rate_limit.store_timeout())
                .await
                .map_err(|e| {
                    AppError::ConfigurationInvalid(format!("Invalid Redis URL {}: {}", url, e))
                })?;
            Ok(Arc::new(store))
        }
    }
}

/// Create the admission middleware for `store`
pub fn build_admission(
    settings: &RateLimitSettings,
    store: Arc<dyn TokenBucketStore>,
) -> Result<AdmissionMiddleware> {
    let policy = settings.policy()?;
    info!(
        enabled = policy.enabled(),
        capacity = policy.capacity(),
        window_secs = policy.window_secs(),
        prefix = %settings.api_prefix,
        "Write admission control configured"
    );

    Ok(AdmissionMiddleware::new(
        Arc::new(RateGovernor::new(store)),
        policy,
        settings.bucket_key(),
        settings.api_prefix.as_str(),
    ))
}

/// Assemble the application router
///
/// Admission control wraps every route; classification decides which
/// requests it actually touches.
pub fn build_app(
    repo: Repository,
    admission: AdmissionMiddleware,
    metrics: Option<MetricsService>,
    request_timeout: Duration,
) -> AxumRouter {
    let health = AxumRouter::new()
        .route("/health", get(health_handler))
        .with_state(admission.governor().store().clone());

    let mut app = api::router(repo).merge(health);

    if let Some(service) = metrics {
        app = app.merge(
            AxumRouter::new()
                .route("/metrics", get(metrics_handler))
                .with_state(service),
        );
    }

    app.layer(middleware::from_fn_with_state(admission, admission_middleware))
        .layer(middleware::from_fn(track_metrics))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
}

/// Initialize the API server
pub async fn init_server(config: AppConfig) -> Result<()> {
    // Validate configuration
    config.validate()?;

    info!("Starting awards API");

    let store = build_store(&config).await?;
    let admission = build_admission(&config.rate_limit, store)?;

    let metrics = match MetricsService::new() {
        Ok(service) => Some(service),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    };

    let app = build_app(
        Repository::new(),
        admission,
        metrics,
        Duration::from_secs(config.server.timeout_secs),
    );

    // Bind and serve
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
