//! Identity types for appraisal entities
//!
//! Row identifiers are opaque strings issued by the intake system (the
//! `_id` column), so they are wrapped rather than parsed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Milliseconds since the Unix epoch, as stored in `updatedAt` columns.
pub type TimestampMs = i64;

/// Current time in epoch milliseconds.
pub fn now_ms() -> TimestampMs {
    Utc::now().timestamp_millis()
}

macro_rules! define_string_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier, rejecting blank values.
            pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
                let raw = raw.into();
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::missing($field));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// Identifier of an appraisal order.
    AppraisalId,
    "appraisal_id"
);

define_string_id!(
    /// Identifier of the submitting user's profile row (`userinfo._id`).
    UserInfoId,
    "userinfo_id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_ids_are_rejected() {
        assert_eq!(
            AppraisalId::new("   ").unwrap_err(),
            ValidationError::missing("appraisal_id")
        );
        assert_eq!(
            UserInfoId::new("").unwrap_err(),
            ValidationError::missing("userinfo_id")
        );
    }

    #[test]
    fn test_ids_are_trimmed() {
        let id = AppraisalId::new(" a1 ").expect("valid id");
        assert_eq!(id.as_str(), "a1");
        assert_eq!(id.to_string(), "a1");
    }
}
