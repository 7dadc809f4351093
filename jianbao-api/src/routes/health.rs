//! Health Check Endpoints
//!
//! - /health/ping - Simple liveness check
//! - /health/ready - Store and cache connectivity, pending notifications
//!
//! No authentication required for health endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use jianbao_storage::AppraisalStore;

use crate::jobs::NotificationScheduler;
use crate::services::StatsService;
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDetails {
    pub database: ComponentHealth,
    pub cache: ComponentHealth,
    pub pending_notifications: usize,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn from_check(result: Result<u64, String>, failed: HealthStatus) -> Self {
        match result {
            Ok(latency) => Self {
                status: HealthStatus::Healthy,
                latency_ms: Some(latency),
                error: None,
            },
            Err(e) => Self {
                status: failed,
                latency_ms: None,
                error: Some(e),
            },
        }
    }
}

/// The database decides readiness. The stats cache is advisory, so losing
/// it only degrades the service.
fn overall_status(database: &ComponentHealth, cache: &ComponentHealth) -> HealthStatus {
    match (database.status, cache.status) {
        (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
        (HealthStatus::Healthy, _) => HealthStatus::Degraded,
        _ => HealthStatus::Unhealthy,
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/ready - Readiness check
pub async fn readiness(
    State(store): State<Arc<dyn AppraisalStore>>,
    State(stats): State<Arc<StatsService>>,
    State(scheduler): State<Arc<NotificationScheduler>>,
    State(start_time): State<Instant>,
) -> impl IntoResponse {
    let database =
        ComponentHealth::from_check(check_database(&store).await, HealthStatus::Unhealthy);
    let cache = ComponentHealth::from_check(check_cache(&stats).await, HealthStatus::Degraded);
    let status = overall_status(&database, &cache);

    let response = HealthResponse {
        status,
        message: None,
        details: Some(HealthDetails {
            database,
            cache,
            pending_notifications: scheduler.pending_count(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}

async fn check_database(store: &Arc<dyn AppraisalStore>) -> Result<u64, String> {
    let start = Instant::now();
    match store.ping().await {
        Ok(()) => Ok(start.elapsed().as_millis() as u64),
        Err(e) => Err(format!("Database check failed: {}", e)),
    }
}

async fn check_cache(stats: &StatsService) -> Result<u64, String> {
    let start = Instant::now();
    match stats.ping().await {
        Ok(()) => Ok(start.elapsed().as_millis() as u64),
        Err(e) => Err(format!("Cache check failed: {}", e)),
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router (no auth required)
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/ready", get(readiness))
}
