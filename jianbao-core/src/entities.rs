//! Entity types

use serde::{Deserialize, Serialize};

use crate::{AppraisalId, AppraisalResult, AppraisalStatus, Timestamp, TimestampMs, UserInfoId};

/// An appraisal order row.
///
/// `status` and `result` are optional because the intake system may leave
/// them blank on freshly created rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appraisal {
    pub id: AppraisalId,
    pub userinfo_id: Option<UserInfoId>,
    pub title: Option<String>,
    pub status: Option<AppraisalStatus>,
    pub result: Option<AppraisalResult>,
    pub notes: Option<String>,
    pub updated_at_ms: Option<TimestampMs>,
}

/// Field changes applied to one appraisal by an admin action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppraisalUpdate {
    pub status: Option<AppraisalStatus>,
    pub result: Option<AppraisalResult>,
    /// Empty notes are ignored, matching the admin console behavior.
    pub notes: Option<String>,
}

impl AppraisalUpdate {
    /// Apply the changes to a row, returning the updated copy.
    pub fn apply_to(&self, appraisal: &Appraisal, updated_at_ms: TimestampMs) -> Appraisal {
        let mut next = appraisal.clone();
        if let Some(status) = self.status {
            next.status = Some(status);
        }
        if let Some(result) = self.result {
            next.result = Some(result);
        }
        if let Some(notes) = self.notes.as_deref().filter(|n| !n.is_empty()) {
            next.notes = Some(notes.to_string());
        }
        next.updated_at_ms = Some(updated_at_ms);
        next
    }
}

/// A recorded appraisal verdict, written on result submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppraisalVerdict {
    pub appraisal_id: AppraisalId,
    pub result: AppraisalResult,
    pub notes: String,
    /// Appraiser (admin user) who submitted the verdict.
    pub appraiser_id: Option<i64>,
    pub created_at: Timestamp,
}

/// The submitting user's profile row; only the contact fields matter here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: UserInfoId,
    pub phone: Option<String>,
    pub nick_name: Option<String>,
}

impl UserInfo {
    /// Phone number if one is on file and non-blank.
    pub fn contact_phone(&self) -> Option<&str> {
        self.phone.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

/// Per-user cached statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub pending: u64,
    pub to_improve: u64,
    pub completed: u64,
}

/// A notification waiting for its delay to elapse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNotification {
    pub appraisal_id: AppraisalId,
    pub phone: String,
    pub status: AppraisalStatus,
    pub created_at: Timestamp,
    pub fire_at: Timestamp,
    pub remaining_secs: u64,
}
