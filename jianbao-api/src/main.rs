//! jianbao API Server Entry Point
//!
//! Bootstraps configuration, wires the store, cache and SMS sender, starts
//! the notification scheduler and serves the operational router.

use std::sync::Arc;

use jianbao_api::telemetry::{init_tracing, TelemetryConfig};
use jianbao_api::{
    create_router, ApiConfig, ApiError, ApiResult, AppState, CacheConfig, DbClient, DbConfig,
    NotifierConfig, SmsConfig, TemplatedSmsSender,
};
use jianbao_core::NotificationSender;
use jianbao_storage::{AppraisalStore, CacheStore, InMemoryCacheStore, RedisCacheStore, RedisPolicy};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let notifier_config = NotifierConfig::from_env();
    let api_config = ApiConfig::from_env()?;
    let cache = build_cache(&CacheConfig::from_env())?;

    let db = DbClient::from_config(&DbConfig::from_env())?;
    tracing::info!(pool_size = db.pool_size(), "Database pool ready");
    let store: Arc<dyn AppraisalStore> = Arc::new(db);

    let sender: Arc<dyn NotificationSender> =
        Arc::new(TemplatedSmsSender::from_config(&SmsConfig::from_env()));

    let state = AppState::new(store, cache, sender, &notifier_config);

    tracing::info!(
        environment = %notifier_config.environment,
        key_prefix = notifier_config.key_prefix(),
        sms_delay_secs = notifier_config.sms_delay.as_secs(),
        "Notifier configured"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = state.scheduler.clone();
    let scheduler_handle = tokio::spawn(scheduler.clone().run(shutdown_rx));

    let app = create_router(state);

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, "Starting jianbao API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    // Pending notifications are held in memory only and die with the process.
    let dropped = scheduler.cancel_all();
    if dropped > 0 {
        tracing::warn!(dropped, "Pending notifications dropped on shutdown");
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        tracing::error!(error = %e, "Notification scheduler task failed");
    }

    Ok(())
}

fn build_cache(config: &CacheConfig) -> ApiResult<Arc<dyn CacheStore>> {
    match &config.redis_url {
        Some(url) => {
            let policy = RedisPolicy {
                timeout: config.timeout,
            };
            let store = RedisCacheStore::new(url, policy).map_err(|e| {
                ApiError::service_unavailable(format!("Invalid Redis configuration: {}", e))
            })?;
            tracing::info!(
                timeout_ms = config.timeout.as_millis() as u64,
                "Using Redis statistics cache"
            );
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("JIANBAO_REDIS_URL not set, statistics kept in process memory");
            Ok(Arc::new(InMemoryCacheStore::new()))
        }
    }
}
