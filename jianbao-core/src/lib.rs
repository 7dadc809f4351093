//! jianbao Core - Domain Types
//!
//! Pure data structures and classification rules for appraisal orders.
//! No I/O lives here; the collaborator seams are declared as traits for the
//! storage and API crates to implement.

mod advisory;
mod entities;
mod enums;
mod error;
mod identity;
mod notify;

pub use advisory::{Advisory, SkipReason};
pub use entities::{
    Appraisal, AppraisalUpdate, AppraisalVerdict, PendingNotification, UserInfo, UserStats,
};
pub use enums::{
    is_terminal, is_trackable, AppraisalResult, AppraisalStatus, Contribution,
    NotificationCategory, StatusParseError,
};
pub use error::{
    CacheError, JianbaoError, JianbaoResult, NotifyError, StoreError, ValidationError,
};
pub use identity::{now_ms, AppraisalId, Timestamp, TimestampMs, UserInfoId};
pub use notify::{DeliveryReceipt, NotificationSender};
