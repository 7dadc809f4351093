//! Shared application state for Axum routers.

use std::sync::Arc;

use jianbao_core::NotificationSender;
use jianbao_storage::{AppraisalStore, CacheStore};

use crate::config::NotifierConfig;
use crate::jobs::NotificationScheduler;
use crate::services::{AppraisalService, StatsService};

/// Process-wide services, built once at startup and shared by handle.
#[derive(Clone)]
pub struct AppState {
    /// System of record for appraisal rows.
    pub store: Arc<dyn AppraisalStore>,
    /// Advisory per-user statistics.
    pub stats: Arc<StatsService>,
    /// Delayed status notifications. Its `run` loop is spawned by the owner.
    pub scheduler: Arc<NotificationScheduler>,
    /// Admin mutation pipeline.
    pub appraisals: Arc<AppraisalService>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AppraisalStore>,
        cache: Arc<dyn CacheStore>,
        sender: Arc<dyn NotificationSender>,
        config: &NotifierConfig,
    ) -> Self {
        let stats = Arc::new(StatsService::new(cache, config));
        let scheduler = Arc::new(NotificationScheduler::new(sender, config.sms_delay));
        let appraisals = Arc::new(AppraisalService::new(
            store.clone(),
            stats.clone(),
            scheduler.clone(),
        ));

        Self {
            store,
            stats,
            scheduler,
            appraisals,
            start_time: std::time::Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<dyn AppraisalStore>, store);
crate::impl_from_ref!(Arc<StatsService>, stats);
crate::impl_from_ref!(Arc<NotificationScheduler>, scheduler);
crate::impl_from_ref!(Arc<AppraisalService>, appraisals);
crate::impl_from_ref!(std::time::Instant, start_time);
