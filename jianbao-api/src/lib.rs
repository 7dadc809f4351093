//! jianbao API - Appraisal Status-Change Notifier
//!
//! Reacts to appraisal status changes made by the admin pipeline:
//! per-user statistics are kept in Redis, and the submitter is sent a
//! delayed SMS when their order needs more material or is finished.
//!
//! The appraisal rows themselves live in PostgreSQL and are the only
//! authoritative state; the statistics and pending notifications are
//! advisory and never fail the write that triggered them.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod jobs;
pub mod macros;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ApiConfig, CacheConfig, NotifierConfig, SmsConfig};
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{NotificationScheduler, Scheduled, SchedulerSnapshot};
pub use routes::create_router;
pub use services::{
    AppraisalService, AppraisalUpdateItem, BatchUpdateReport, NotificationAction,
    ResultSubmission, StatsChange, StatsService, TemplatedSmsSender, UpdateOutcome,
};
pub use state::AppState;
