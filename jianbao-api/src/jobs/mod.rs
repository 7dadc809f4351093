//! Background Jobs
//!
//! - `notification_scheduler`: the delayed status-SMS loop

pub mod notification_scheduler;

pub use notification_scheduler::{
    NotificationScheduler, Scheduled, SchedulerMetrics, SchedulerSnapshot,
};
