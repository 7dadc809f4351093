//! Operational HTTP routes
//!
//! The notifier has no business endpoints of its own; this router only
//! exposes health checks and the Prometheus scrape endpoint.

pub mod health;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::telemetry::metrics_handler;

/// Build the operational router over shared state.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
