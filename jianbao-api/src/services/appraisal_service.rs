//! Appraisal Service
//!
//! Admin mutations on appraisal rows. Each item is read, changed, and
//! written on its own. Once the write has committed, the service updates
//! the cached statistics and schedules or cancels the status SMS from the
//! before/after status pair. Those side effects are advisory: their outcome
//! is reported, never turned into an error, and never rolls the row back.

use std::sync::Arc;

use chrono::Utc;
use jianbao_core::{
    now_ms, Advisory, Appraisal, AppraisalId, AppraisalResult, AppraisalStatus, AppraisalUpdate,
    AppraisalVerdict, JianbaoError, JianbaoResult, NotificationCategory, SkipReason, StoreError,
};
use jianbao_storage::AppraisalStore;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_BATCH_ITEMS;
use crate::error::{ApiError, ApiResult};
use crate::jobs::{NotificationScheduler, Scheduled};
use crate::services::stats_service::{StatsChange, StatsService};
use crate::telemetry::metrics;

// ============================================================================
// REQUEST AND REPORT TYPES
// ============================================================================

/// One item of a batch status/result update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppraisalUpdateItem {
    pub order_id: String,
    #[serde(default)]
    pub status: Option<AppraisalStatus>,
    #[serde(default)]
    pub result: Option<AppraisalResult>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One appraiser verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSubmission {
    pub order_id: String,
    pub result: AppraisalResult,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub appraiser_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub order_id: String,
    pub reason: String,
}

/// Per-batch summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchUpdateReport {
    pub success_count: usize,
    pub failed_count: usize,
    pub failed_items: Vec<FailedItem>,
}

impl BatchUpdateReport {
    fn succeeded(&mut self) {
        self.success_count += 1;
    }

    fn failed(&mut self, order_id: &str, reason: impl Into<String>) {
        self.failed_count += 1;
        self.failed_items.push(FailedItem {
            order_id: order_id.to_string(),
            reason: reason.into(),
        });
    }
}

/// What happened to the pending notification after a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationAction {
    Scheduled(Scheduled),
    Cancelled,
}

/// Advisory outcomes of one committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideEffects {
    pub stats: Advisory<StatsChange>,
    pub notification: Advisory<NotificationAction>,
}

/// A committed row and the side effects it triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub appraisal: Appraisal,
    pub effects: SideEffects,
}

// ============================================================================
// SERVICE
// ============================================================================

/// Orchestrates row writes with their stats and notification side effects.
pub struct AppraisalService {
    store: Arc<dyn AppraisalStore>,
    stats: Arc<StatsService>,
    scheduler: Arc<NotificationScheduler>,
}

impl AppraisalService {
    pub fn new(
        store: Arc<dyn AppraisalStore>,
        stats: Arc<StatsService>,
        scheduler: Arc<NotificationScheduler>,
    ) -> Self {
        Self {
            store,
            stats,
            scheduler,
        }
    }

    async fn load(&self, id: &AppraisalId) -> JianbaoResult<Appraisal> {
        self.store
            .get_appraisal(id)
            .await?
            .ok_or_else(|| {
                StoreError::AppraisalNotFound {
                    id: id.to_string(),
                }
                .into()
            })
    }

    /// Apply field changes to one appraisal.
    pub async fn update_appraisal(
        &self,
        id: &AppraisalId,
        update: &AppraisalUpdate,
    ) -> JianbaoResult<UpdateOutcome> {
        let before = self.load(id).await?;
        let after = update.apply_to(&before, now_ms());
        self.store.save_appraisal(&after).await?;

        let effects = self.after_commit(&before, &after).await;
        Ok(UpdateOutcome {
            appraisal: after,
            effects,
        })
    }

    /// Record an appraiser verdict and move the row to the status it implies.
    pub async fn submit_result(
        &self,
        id: &AppraisalId,
        submission: &ResultSubmission,
    ) -> JianbaoResult<UpdateOutcome> {
        let before = self.load(id).await?;
        let update = AppraisalUpdate {
            status: Some(submission.result.implied_status()),
            result: Some(submission.result),
            notes: submission.notes.clone(),
        };
        let after = update.apply_to(&before, now_ms());
        let verdict = AppraisalVerdict {
            appraisal_id: id.clone(),
            result: submission.result,
            notes: submission.notes.clone().unwrap_or_default(),
            appraiser_id: submission.appraiser_id,
            created_at: Utc::now(),
        };
        self.store.record_verdict(&after, &verdict).await?;

        let effects = self.after_commit(&before, &after).await;
        Ok(UpdateOutcome {
            appraisal: after,
            effects,
        })
    }

    /// Apply a batch of updates. Items fail independently.
    pub async fn batch_update(
        &self,
        items: &[AppraisalUpdateItem],
    ) -> ApiResult<BatchUpdateReport> {
        check_batch_size(items.len())?;

        let mut report = BatchUpdateReport::default();
        for item in items {
            let update = AppraisalUpdate {
                status: item.status,
                result: item.result,
                notes: item.notes.clone(),
            };
            let outcome = match AppraisalId::new(item.order_id.as_str()) {
                Ok(id) => self.update_appraisal(&id, &update).await,
                Err(e) => Err(e.into()),
            };
            record_item(&mut report, &item.order_id, outcome);
        }

        tracing::info!(
            success_count = report.success_count,
            failed_count = report.failed_count,
            "Batch update finished"
        );
        Ok(report)
    }

    /// Submit a batch of verdicts. Items fail independently.
    pub async fn submit_results(&self, items: &[ResultSubmission]) -> ApiResult<BatchUpdateReport> {
        check_batch_size(items.len())?;

        let mut report = BatchUpdateReport::default();
        for item in items {
            let outcome = match AppraisalId::new(item.order_id.as_str()) {
                Ok(id) => self.submit_result(&id, item).await,
                Err(e) => Err(e.into()),
            };
            record_item(&mut report, &item.order_id, outcome);
        }

        tracing::info!(
            success_count = report.success_count,
            failed_count = report.failed_count,
            "Result submission finished"
        );
        Ok(report)
    }

    // ========================================================================
    // SIDE EFFECTS
    // ========================================================================

    async fn after_commit(&self, before: &Appraisal, after: &Appraisal) -> SideEffects {
        let Some(new_status) = after.status else {
            return SideEffects {
                stats: Advisory::Skipped(SkipReason::Untracked),
                notification: Advisory::Skipped(SkipReason::NotNotifiable),
            };
        };
        let old_status = before.status;

        let stats = match &after.userinfo_id {
            Some(user) => {
                self.stats
                    .handle_status_change(user, &after.id, old_status, new_status)
                    .await
            }
            None => Advisory::Skipped(SkipReason::NoRecipient),
        };

        let notification = match old_status {
            Some(old) if old == new_status => Advisory::Skipped(SkipReason::Unchanged),
            // Leaving a terminal status neither sends nor cancels anything.
            Some(old) if old.is_terminal() => {
                tracing::warn!(
                    appraisal_id = %after.id,
                    old_status = %old,
                    new_status = %new_status,
                    "Transition out of a terminal status, notification left untouched"
                );
                Advisory::Skipped(SkipReason::TerminalGuard {
                    from: old,
                    to: new_status,
                })
            }
            _ => self.notify(after, new_status).await,
        };

        SideEffects {
            stats,
            notification,
        }
    }

    async fn notify(
        &self,
        appraisal: &Appraisal,
        new_status: AppraisalStatus,
    ) -> Advisory<NotificationAction> {
        if NotificationCategory::from_status(new_status).is_none() {
            // The debounce reflects only the latest status.
            return if self.scheduler.cancel(&appraisal.id) {
                Advisory::Applied(NotificationAction::Cancelled)
            } else {
                Advisory::Skipped(SkipReason::NotNotifiable)
            };
        }

        let Some(user_id) = &appraisal.userinfo_id else {
            tracing::warn!(appraisal_id = %appraisal.id, "Appraisal has no owner, SMS skipped");
            return Advisory::Skipped(SkipReason::NoRecipient);
        };

        let user = match self.store.get_user_info(user_id).await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!(
                    appraisal_id = %appraisal.id,
                    userinfo_id = %user_id,
                    error = %e,
                    "Owner lookup failed, SMS skipped"
                );
                return Advisory::degraded(e);
            }
        };

        let Some(phone) = user.as_ref().and_then(|u| u.contact_phone()) else {
            tracing::warn!(
                appraisal_id = %appraisal.id,
                userinfo_id = %user_id,
                "Owner has no phone number, SMS skipped"
            );
            return Advisory::Skipped(SkipReason::NoRecipient);
        };

        match self.scheduler.schedule(&appraisal.id, phone, new_status) {
            Ok(outcome) => outcome.map(NotificationAction::Scheduled),
            Err(e) => {
                tracing::warn!(appraisal_id = %appraisal.id, error = %e, "SMS not scheduled");
                Advisory::Skipped(SkipReason::NoRecipient)
            }
        }
    }
}

fn check_batch_size(count: usize) -> ApiResult<()> {
    if count > MAX_BATCH_ITEMS {
        return Err(ApiError::batch_too_large(count, MAX_BATCH_ITEMS));
    }
    Ok(())
}

fn record_item(
    report: &mut BatchUpdateReport,
    order_id: &str,
    outcome: Result<UpdateOutcome, JianbaoError>,
) {
    let success = outcome.is_ok();
    match outcome {
        Ok(done) => {
            tracing::info!(
                appraisal_id = %done.appraisal.id,
                status = ?done.appraisal.status,
                stats = done.effects.stats.label(),
                notification = done.effects.notification.label(),
                "Appraisal updated"
            );
            report.succeeded();
        }
        Err(JianbaoError::Store(StoreError::AppraisalNotFound { .. })) => {
            report.failed(order_id, "order not found");
        }
        Err(e) => {
            tracing::error!(order_id, error = %e, "Appraisal update failed");
            report.failed(order_id, e.to_string());
        }
    }
    if let Some(m) = metrics() {
        m.record_appraisal_update(success);
    }
}
