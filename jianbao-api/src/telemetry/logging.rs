//! Logging Initialization
//!
//! JSON-formatted structured logs filtered by `RUST_LOG`, falling back to
//! the crate default filter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::constants::DEFAULT_LOG_FILTER;
use crate::error::{ApiError, ApiResult};

/// Logging configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup record
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var("JIANBAO_SERVICE_NAME")
                .unwrap_or_else(|_| "jianbao-api".to_string()),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            default_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup, before anything logs. A second call fails.
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = %config.service_name,
        service_version = %config.service_version,
        "Telemetry initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.default_filter, DEFAULT_LOG_FILTER);
        assert!(!config.service_version.is_empty());
    }
}
