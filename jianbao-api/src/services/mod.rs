//! Service Layer
//!
//! - `stats_service`: cached per-user appraisal statistics
//! - `sms`: the SMS notification sender and its gateways
//! - `appraisal_service`: admin mutations and their side effects

pub mod appraisal_service;
pub mod sms;
pub mod stats_service;

pub use appraisal_service::{
    AppraisalService, AppraisalUpdateItem, BatchUpdateReport, FailedItem, NotificationAction,
    ResultSubmission, SideEffects, UpdateOutcome,
};
pub use sms::{
    format_phone_number, HttpSmsGateway, LogOnlyGateway, SmsGateway, SmsRequest,
    TemplatedSmsSender,
};
pub use stats_service::{StatsChange, StatsService};
