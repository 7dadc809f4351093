//! Error Types for the jianbao API
//!
//! - `ApiError` struct for structured error responses
//! - `ErrorCode` enum for categorizing errors
//! - `IntoResponse` implementation for Axum HTTP responses
//! - conversions from the domain, database and pool errors
//!
//! Advisory failures (stats cache, SMS delivery) never reach this type; they
//! are reported through `jianbao_core::Advisory`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use jianbao_core::{JianbaoError, StoreError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// Batch exceeds the accepted size
    BatchTooLarge,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested appraisal does not exist
    AppraisalNotFound,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Database operation failed
    DatabaseError,

    /// Service is temporarily unavailable
    ServiceUnavailable,

    /// Database connection pool exhausted
    ConnectionPoolExhausted,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::MissingField | ErrorCode::BatchTooLarge => {
                StatusCode::BAD_REQUEST
            }

            ErrorCode::AppraisalNotFound => StatusCode::NOT_FOUND,

            ErrorCode::ServiceUnavailable | ErrorCode::ConnectionPoolExhausted => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::BatchTooLarge => "Too many items in batch",
            ErrorCode::AppraisalNotFound => "Appraisal not found",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::ConnectionPoolExhausted => "Connection pool exhausted",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn batch_too_large(count: usize, max: usize) -> Self {
        Self::new(
            ErrorCode::BatchTooLarge,
            format!("Batch of {} items exceeds the limit of {}", count, max),
        )
    }

    pub fn appraisal_not_found(id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::AppraisalNotFound,
            format!("Appraisal {} not found", id),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn connection_pool_exhausted() -> Self {
        Self::from_code(ErrorCode::ConnectionPoolExhausted)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::RequiredFieldMissing { field } => ApiError::missing_field(&field),
            other => ApiError::invalid_input(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AppraisalNotFound { id } => ApiError::appraisal_not_found(id),
            other => {
                tracing::error!(error = %other, "Appraisal store error");
                ApiError::database_error(other.to_string())
            }
        }
    }
}

impl From<JianbaoError> for ApiError {
    fn from(err: JianbaoError) -> Self {
        match err {
            JianbaoError::Validation(e) => e.into(),
            JianbaoError::Store(e) => e.into(),
            // Advisory subsystems surface here only from operator paths.
            JianbaoError::Cache(e) => ApiError::service_unavailable(e.to_string()),
            JianbaoError::Notify(e) => ApiError::service_unavailable(e.to_string()),
        }
    }
}

/// Convert from tokio_postgres::Error to ApiError.
impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        tracing::error!("Database error: {:?}", err);

        // Generic message to avoid leaking internal details
        ApiError::database_error("Database operation failed")
    }
}

/// Convert from deadpool_postgres::PoolError to ApiError.
impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);

        match err {
            deadpool_postgres::PoolError::Timeout(_) => ApiError::connection_pool_exhausted(),
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Database connection pool is closed")
            }
            _ => ApiError::database_error("Failed to acquire database connection"),
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
