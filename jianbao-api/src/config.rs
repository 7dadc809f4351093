//! Configuration Module
//!
//! Environment-driven settings for the notifier, the stats cache, the SMS
//! relay and the HTTP listener. Every struct has a `Default` for local runs
//! and a `from_env()` constructor documenting its variables.

use std::net::SocketAddr;
use std::time::Duration;

use jianbao_core::NotifyError;

use crate::constants::{
    DEFAULT_BIND_HOST, DEFAULT_COMPLETED_TTL_SECS, DEFAULT_COUNTER_TTL_SECS, DEFAULT_PORT,
    DEFAULT_REDIS_TIMEOUT_MS, DEFAULT_SMS_DELAY_SECS, DEFAULT_SMS_HTTP_TIMEOUT_SECS,
    DEV_KEY_PREFIX, PRODUCTION_KEY_PREFIX,
};
use crate::env_or;
use crate::error::{ApiError, ApiResult};

// ============================================================================
// NOTIFIER CONFIGURATION
// ============================================================================

/// Settings for the stats bookkeeper and the notification scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    /// Deployment environment name. `production` selects the `online` key prefix.
    pub environment: String,

    /// Delay between a status change and its SMS.
    pub sms_delay: Duration,

    /// Expiry for the pending and needs-supplement counters.
    pub counter_ttl: Duration,

    /// Expiry for the completed-id set.
    pub completed_ttl: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            sms_delay: Duration::from_secs(DEFAULT_SMS_DELAY_SECS),
            counter_ttl: Duration::from_secs(DEFAULT_COUNTER_TTL_SECS),
            completed_ttl: Duration::from_secs(DEFAULT_COMPLETED_TTL_SECS),
        }
    }
}

impl NotifierConfig {
    /// Environment variables:
    /// - `JIANBAO_ENVIRONMENT`: deployment name (default: development)
    /// - `JIANBAO_SMS_DELAY_SECS`: notification delay (default: 300)
    /// - `JIANBAO_TO_IMPROVE_TTL_SECS`: counter TTL (default: 3 days)
    /// - `JIANBAO_COMPLETED_TTL_SECS`: completed set TTL (default: 7 days)
    pub fn from_env() -> Self {
        Self {
            environment: std::env::var("JIANBAO_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            sms_delay: Duration::from_secs(env_or!(
                "JIANBAO_SMS_DELAY_SECS",
                DEFAULT_SMS_DELAY_SECS
            )),
            counter_ttl: Duration::from_secs(env_or!(
                "JIANBAO_TO_IMPROVE_TTL_SECS",
                DEFAULT_COUNTER_TTL_SECS
            )),
            completed_ttl: Duration::from_secs(env_or!(
                "JIANBAO_COMPLETED_TTL_SECS",
                DEFAULT_COMPLETED_TTL_SECS
            )),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case("production")
    }

    /// Namespace for every cache key written by this process.
    pub fn key_prefix(&self) -> &'static str {
        if self.is_production() {
            PRODUCTION_KEY_PREFIX
        } else {
            DEV_KEY_PREFIX
        }
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

/// Where the advisory statistics live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Redis connection URL. `None` keeps the statistics in process memory.
    pub redis_url: Option<String>,

    /// Per-command timeout for Redis round-trips.
    pub timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            timeout: Duration::from_millis(DEFAULT_REDIS_TIMEOUT_MS),
        }
    }
}

impl CacheConfig {
    /// Environment variables:
    /// - `JIANBAO_REDIS_URL`: e.g. `redis://127.0.0.1:6379/0` (unset = in-memory)
    /// - `JIANBAO_REDIS_TIMEOUT_MS`: command timeout (default: 500)
    pub fn from_env() -> Self {
        let redis_url = std::env::var("JIANBAO_REDIS_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            redis_url,
            timeout: Duration::from_millis(env_or!(
                "JIANBAO_REDIS_TIMEOUT_MS",
                DEFAULT_REDIS_TIMEOUT_MS
            )),
        }
    }
}

// ============================================================================
// SMS CONFIGURATION
// ============================================================================

/// Credentials and templates for the SMS relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsConfig {
    pub secret_id: String,
    pub secret_key: String,
    pub sdk_app_id: String,
    pub sign_name: String,
    pub region: String,

    /// Template for "please supplement your submission" messages.
    pub template_supplement: String,

    /// Template for "your appraisal is complete" messages.
    pub template_outcome: String,

    /// Relay endpoint that accepts send requests.
    pub gateway_url: String,

    pub http_timeout: Duration,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            secret_id: String::new(),
            secret_key: String::new(),
            sdk_app_id: String::new(),
            sign_name: String::new(),
            region: "ap-guangzhou".to_string(),
            template_supplement: "2532458".to_string(),
            template_outcome: "2532457".to_string(),
            gateway_url: String::new(),
            http_timeout: Duration::from_secs(DEFAULT_SMS_HTTP_TIMEOUT_SECS),
        }
    }
}

impl SmsConfig {
    /// Environment variables:
    /// - `JIANBAO_SMS_SECRET_ID` / `JIANBAO_SMS_SECRET_KEY`: vendor credentials
    /// - `JIANBAO_SMS_SDK_APP_ID`: application id
    /// - `JIANBAO_SMS_SIGN_NAME`: message signature
    /// - `JIANBAO_SMS_REGION`: vendor region (default: ap-guangzhou)
    /// - `JIANBAO_SMS_TEMPLATE_SUPPLEMENT` / `JIANBAO_SMS_TEMPLATE_OUTCOME`: template ids
    /// - `JIANBAO_SMS_GATEWAY_URL`: relay endpoint
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str, fallback: &str| {
            std::env::var(name)
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| fallback.to_string())
        };

        Self {
            secret_id: var("JIANBAO_SMS_SECRET_ID", ""),
            secret_key: var("JIANBAO_SMS_SECRET_KEY", ""),
            sdk_app_id: var("JIANBAO_SMS_SDK_APP_ID", ""),
            sign_name: var("JIANBAO_SMS_SIGN_NAME", ""),
            region: var("JIANBAO_SMS_REGION", &defaults.region),
            template_supplement: var(
                "JIANBAO_SMS_TEMPLATE_SUPPLEMENT",
                &defaults.template_supplement,
            ),
            template_outcome: var("JIANBAO_SMS_TEMPLATE_OUTCOME", &defaults.template_outcome),
            gateway_url: var("JIANBAO_SMS_GATEWAY_URL", ""),
            http_timeout: defaults.http_timeout,
        }
    }

    /// Names of the required settings that are empty.
    pub fn missing_fields(&self) -> Vec<String> {
        [
            ("JIANBAO_SMS_SECRET_ID", &self.secret_id),
            ("JIANBAO_SMS_SECRET_KEY", &self.secret_key),
            ("JIANBAO_SMS_SDK_APP_ID", &self.sdk_app_id),
            ("JIANBAO_SMS_SIGN_NAME", &self.sign_name),
            ("JIANBAO_SMS_GATEWAY_URL", &self.gateway_url),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name.to_string())
        .collect()
    }

    pub fn validate(&self) -> Result<(), NotifyError> {
        let fields = self.missing_fields();
        if fields.is_empty() {
            Ok(())
        } else {
            Err(NotifyError::NotConfigured { fields })
        }
    }
}

// ============================================================================
// SERVER CONFIGURATION
// ============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ApiConfig {
    /// Environment variables:
    /// - `JIANBAO_API_BIND`: listen host (default: 0.0.0.0)
    /// - `PORT` or `JIANBAO_API_PORT`: listen port (default: 8000)
    pub fn from_env() -> ApiResult<Self> {
        let host =
            std::env::var("JIANBAO_API_BIND").unwrap_or_else(|_| DEFAULT_BIND_HOST.to_string());
        let port = match std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("JIANBAO_API_PORT").ok())
        {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", raw)))?,
            None => DEFAULT_PORT,
        };
        Ok(Self { host, port })
    }

    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifier_defaults() {
        let config = NotifierConfig::default();
        assert_eq!(config.sms_delay, Duration::from_secs(300));
        assert_eq!(config.counter_ttl, Duration::from_secs(259_200));
        assert_eq!(config.completed_ttl, Duration::from_secs(604_800));
        assert_eq!(config.key_prefix(), "dev");
    }

    #[test]
    fn test_production_prefix() {
        let config = NotifierConfig {
            environment: " Production ".to_string(),
            ..NotifierConfig::default()
        };
        assert!(config.is_production());
        assert_eq!(config.key_prefix(), "online");
    }

    #[test]
    fn test_sms_validate_lists_missing_fields() {
        let config = SmsConfig {
            secret_id: "id".to_string(),
            sign_name: "sign".to_string(),
            ..SmsConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(
            err,
            NotifyError::NotConfigured {
                fields: vec![
                    "JIANBAO_SMS_SECRET_KEY".to_string(),
                    "JIANBAO_SMS_SDK_APP_ID".to_string(),
                    "JIANBAO_SMS_GATEWAY_URL".to_string(),
                ]
            }
        );
    }

    #[test]
    fn test_sms_validate_complete() {
        let config = SmsConfig {
            secret_id: "id".to_string(),
            secret_key: "key".to_string(),
            sdk_app_id: "1400000000".to_string(),
            sign_name: "sign".to_string(),
            gateway_url: "http://relay.local/send".to_string(),
            ..SmsConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bind_addr() {
        let config = ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 9000,
        };
        assert_eq!(config.bind_addr().unwrap().port(), 9000);

        let bad = ApiConfig {
            host: "not a host".to_string(),
            port: 9000,
        };
        assert!(bad.bind_addr().is_err());
    }
}
