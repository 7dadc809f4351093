//! Constants for the jianbao API
//!
//! Centralized defaults for the notifier, the cache layer and the server.

// ============================================================================
// STATS CACHE
// ============================================================================

/// TTL for the pending and needs-supplement counters (3 days)
pub const DEFAULT_COUNTER_TTL_SECS: u64 = 3 * 24 * 60 * 60;

/// TTL for the completed-id set (7 days)
pub const DEFAULT_COMPLETED_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Per-command timeout for the Redis backend
pub const DEFAULT_REDIS_TIMEOUT_MS: u64 = 500;

/// Key prefix used when `JIANBAO_ENVIRONMENT=production`
pub const PRODUCTION_KEY_PREFIX: &str = "online";

/// Key prefix for every other environment
pub const DEV_KEY_PREFIX: &str = "dev";

pub const PENDING_KEY_SEGMENT: &str = "appraisal_pending";
pub const TO_IMPROVE_KEY_SEGMENT: &str = "appraisal_to_improve";
pub const COMPLETED_KEY_SEGMENT: &str = "appraisal_completed";

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// Cooling-off delay before a status SMS is sent (5 minutes)
pub const DEFAULT_SMS_DELAY_SECS: u64 = 300;

/// Country code applied to bare mainland numbers
pub const DEFAULT_PHONE_COUNTRY_CODE: &str = "+86";

/// Timeout for one request to the SMS relay
pub const DEFAULT_SMS_HTTP_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// BATCH OPERATIONS
// ============================================================================

/// Maximum number of items accepted in a single batch update
pub const MAX_BATCH_ITEMS: usize = 100;

// ============================================================================
// SERVER
// ============================================================================

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

pub const DEFAULT_PORT: u16 = 8000;

/// Default tracing filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "jianbao_api=debug,tower_http=info,info";
