//! Enum types for appraisal entities
//!
//! Status and result values are persisted as single-digit string codes
//! ("1".."6" and "1".."4"). `as_code`/`from_code` are the only place those
//! codes are spelled out.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// APPRAISAL STATUS
// ============================================================================

/// Lifecycle status of an appraisal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AppraisalStatus {
    /// Submitted, waiting for an appraiser
    Pending,
    /// An appraiser is looking at it
    InReview,
    /// Final outcome recorded (terminal)
    Completed,
    /// The submitter must provide more material
    NeedsSupplement,
    /// Withdrawn
    Cancelled,
    /// Anything else the intake system writes
    Other,
}

impl AppraisalStatus {
    pub const ALL: [AppraisalStatus; 6] = [
        AppraisalStatus::Pending,
        AppraisalStatus::InReview,
        AppraisalStatus::Completed,
        AppraisalStatus::NeedsSupplement,
        AppraisalStatus::Cancelled,
        AppraisalStatus::Other,
    ];

    /// Convert to the stored code.
    pub fn as_code(&self) -> &'static str {
        match self {
            AppraisalStatus::Pending => "1",
            AppraisalStatus::InReview => "2",
            AppraisalStatus::Completed => "3",
            AppraisalStatus::NeedsSupplement => "4",
            AppraisalStatus::Cancelled => "5",
            AppraisalStatus::Other => "6",
        }
    }

    /// Parse from the stored code.
    pub fn from_code(s: &str) -> Result<Self, StatusParseError> {
        match s.trim() {
            "1" => Ok(AppraisalStatus::Pending),
            "2" => Ok(AppraisalStatus::InReview),
            "3" => Ok(AppraisalStatus::Completed),
            "4" => Ok(AppraisalStatus::NeedsSupplement),
            "5" => Ok(AppraisalStatus::Cancelled),
            "6" => Ok(AppraisalStatus::Other),
            _ => Err(StatusParseError {
                kind: "appraisal status",
                value: s.to_string(),
            }),
        }
    }

    /// Whether the population of this status is kept in the stats cache.
    pub fn is_trackable(&self) -> bool {
        self.contribution().is_some()
    }

    /// Whether no further transition is expected out of this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppraisalStatus::Completed)
    }

    /// Which cached statistic this status contributes to, if any.
    pub fn contribution(&self) -> Option<Contribution> {
        match self {
            AppraisalStatus::Pending => Some(Contribution::PendingCount),
            AppraisalStatus::NeedsSupplement => Some(Contribution::ToImproveCount),
            AppraisalStatus::Completed => Some(Contribution::CompletedSet),
            AppraisalStatus::InReview | AppraisalStatus::Cancelled | AppraisalStatus::Other => {
                None
            }
        }
    }
}

/// Classify a status as trackable.
pub fn is_trackable(status: AppraisalStatus) -> bool {
    status.is_trackable()
}

/// Classify a status as terminal.
pub fn is_terminal(status: AppraisalStatus) -> bool {
    status.is_terminal()
}

impl fmt::Display for AppraisalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

impl FromStr for AppraisalStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s)
    }
}

impl TryFrom<String> for AppraisalStatus {
    type Error = StatusParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_code(&value)
    }
}

impl From<AppraisalStatus> for String {
    fn from(value: AppraisalStatus) -> Self {
        value.as_code().to_string()
    }
}

/// The cached statistic a trackable status feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Contribution {
    /// Plain counter of pending orders
    PendingCount,
    /// Plain counter of orders waiting on supplementary material
    ToImproveCount,
    /// Set of completed appraisal ids
    CompletedSet,
}

// ============================================================================
// APPRAISAL RESULT
// ============================================================================

/// Outcome recorded by an appraiser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AppraisalResult {
    Authentic,
    Fake,
    NeedsSupplement,
    Uncertain,
}

impl AppraisalResult {
    pub fn as_code(&self) -> &'static str {
        match self {
            AppraisalResult::Authentic => "1",
            AppraisalResult::Fake => "2",
            AppraisalResult::NeedsSupplement => "3",
            AppraisalResult::Uncertain => "4",
        }
    }

    pub fn from_code(s: &str) -> Result<Self, StatusParseError> {
        match s.trim() {
            "1" => Ok(AppraisalResult::Authentic),
            "2" => Ok(AppraisalResult::Fake),
            "3" => Ok(AppraisalResult::NeedsSupplement),
            "4" => Ok(AppraisalResult::Uncertain),
            _ => Err(StatusParseError {
                kind: "appraisal result",
                value: s.to_string(),
            }),
        }
    }

    /// Status an order moves to when this result is submitted.
    pub fn implied_status(&self) -> AppraisalStatus {
        match self {
            AppraisalResult::NeedsSupplement => AppraisalStatus::NeedsSupplement,
            AppraisalResult::Authentic | AppraisalResult::Fake | AppraisalResult::Uncertain => {
                AppraisalStatus::Completed
            }
        }
    }
}

impl fmt::Display for AppraisalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

impl FromStr for AppraisalResult {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s)
    }
}

impl TryFrom<String> for AppraisalResult {
    type Error = StatusParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_code(&value)
    }
}

impl From<AppraisalResult> for String {
    fn from(value: AppraisalResult) -> Self {
        value.as_code().to_string()
    }
}

// ============================================================================
// NOTIFICATION CATEGORY
// ============================================================================

/// Message family used when telling a submitter about a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    /// "Please add material" message
    Supplement,
    /// "Your appraisal is done" message
    FinalOutcome,
}

impl NotificationCategory {
    /// Category for a status, or `None` if reaching it sends nothing.
    pub fn from_status(status: AppraisalStatus) -> Option<Self> {
        match status {
            AppraisalStatus::NeedsSupplement => Some(NotificationCategory::Supplement),
            AppraisalStatus::Completed => Some(NotificationCategory::FinalOutcome),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Supplement => "supplement",
            NotificationCategory::FinalOutcome => "final_outcome",
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an unknown status or result code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusParseError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for StatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for StatusParseError {}
