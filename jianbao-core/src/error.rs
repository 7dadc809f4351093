//! Error types for jianbao operations

use thiserror::Error;

/// Validation errors for caller-supplied data.
///
/// These are contract violations and are always surfaced to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ValidationError {
    pub fn missing(field: &str) -> Self {
        ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        }
    }
}

/// Cache backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache operation {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Cache connection failed: {reason}")]
    Connection { reason: String },

    #[error("Malformed counter value at {key}: {value:?}")]
    MalformedValue { key: String, value: String },

    #[error("Cache backend error: {reason}")]
    Backend { reason: String },
}

/// Relational store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Appraisal not found: {id}")]
    AppraisalNotFound { id: String },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Update failed for appraisal {id}: {reason}")]
    UpdateFailed { id: String, reason: String },

    #[error("Corrupt row for appraisal {id}: {reason}")]
    CorruptRow { id: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Outbound notification errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("SMS configuration missing: {}", fields.join(", "))]
    NotConfigured { fields: Vec<String> },

    #[error("Gateway rejected message to {phone}: {code} {message}")]
    Rejected {
        phone: String,
        code: String,
        message: String,
    },

    #[error("Gateway request failed: {reason}")]
    Transport { reason: String },
}

/// Master error type for all jianbao errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JianbaoError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// Result type for jianbao operations.
pub type JianbaoResult<T> = Result<T, JianbaoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_configured_lists_fields() {
        let err = NotifyError::NotConfigured {
            fields: vec!["SMS_SDK_APP_ID".to_string(), "SMS_SIGN_NAME".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "SMS configuration missing: SMS_SDK_APP_ID, SMS_SIGN_NAME"
        );
    }

    #[test]
    fn test_error_conversion_is_transparent() {
        let err: JianbaoError = ValidationError::missing("appraisal_id").into();
        assert_eq!(err.to_string(), "Required field missing: appraisal_id");
        assert!(matches!(err, JianbaoError::Validation(_)));
    }
}
