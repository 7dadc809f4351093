//! jianbao Telemetry - Observability Infrastructure
//!
//! Structured JSON logging and Prometheus metrics for the notifier.

pub mod logging;
pub mod metrics;

pub use logging::{init_tracing, TelemetryConfig};
pub use metrics::{metrics, metrics_handler, JianbaoMetrics, METRICS};
