//! Prometheus Metrics Definitions
//!
//! Defines the notifier metrics and the /metrics scrape handler.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_gauge, CounterVec, Encoder, Gauge, TextEncoder};

use crate::error::{ApiError, ApiResult};

/// Global metrics instance - initialized once at first use
pub static METRICS: Lazy<ApiResult<JianbaoMetrics>> = Lazy::new(JianbaoMetrics::new);

/// The registered metrics, or `None` if registration failed.
///
/// Recording is best-effort; a failed registration was logged when the
/// health router first touched `METRICS`.
pub fn metrics() -> Option<&'static JianbaoMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all jianbao metrics.
#[derive(Clone)]
pub struct JianbaoMetrics {
    /// Bookkeeper outcomes - labels: outcome
    pub status_changes_total: CounterVec,

    /// Swallowed cache failures - labels: operation
    pub cache_errors_total: CounterVec,

    /// Scheduler lifecycle events - labels: event
    pub notifications_total: CounterVec,

    /// Notifications waiting for their delay to elapse
    pub pending_notifications: Gauge,

    /// Admin row updates - labels: status (success/failure)
    pub appraisal_updates_total: CounterVec,
}

impl JianbaoMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            status_changes_total: register_counter_vec!(
                "jianbao_status_changes_total",
                "Status transitions seen by the stats bookkeeper",
                &["outcome"]
            )
            .map_err(|e| register_error("status_changes_total", e))?,

            cache_errors_total: register_counter_vec!(
                "jianbao_cache_errors_total",
                "Stats cache failures swallowed as advisory",
                &["operation"]
            )
            .map_err(|e| register_error("cache_errors_total", e))?,

            notifications_total: register_counter_vec!(
                "jianbao_notifications_total",
                "Delayed notification events",
                &["event"]
            )
            .map_err(|e| register_error("notifications_total", e))?,

            pending_notifications: register_gauge!(
                "jianbao_pending_notifications",
                "Notifications scheduled and not yet fired"
            )
            .map_err(|e| register_error("pending_notifications", e))?,

            appraisal_updates_total: register_counter_vec!(
                "jianbao_appraisal_updates_total",
                "Appraisal row updates applied by admin actions",
                &["status"]
            )
            .map_err(|e| register_error("appraisal_updates_total", e))?,
        })
    }

    pub fn record_status_change(&self, outcome: &str) {
        self.status_changes_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_cache_error(&self, operation: &str) {
        self.cache_errors_total
            .with_label_values(&[operation])
            .inc();
    }

    pub fn record_notification(&self, event: &str) {
        self.notifications_total.with_label_values(&[event]).inc();
    }

    pub fn set_pending_notifications(&self, count: usize) {
        self.pending_notifications.set(count as f64);
    }

    pub fn record_appraisal_update(&self, success: bool) {
        let status = if success { "success" } else { "failure" };
        self.appraisal_updates_total
            .with_label_values(&[status])
            .inc();
    }
}

fn register_error(name: &str, err: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, err))
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    if let Err(e) = METRICS.as_ref() {
        tracing::error!(error = %e, "Metrics registration failed");
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
