//! Stats Service
//!
//! Per-user appraisal statistics kept in the cache store:
//!
//! - `{prefix}:appraisal_pending:{user}`: counter of pending orders
//! - `{prefix}:appraisal_to_improve:{user}`: counter of orders waiting on material
//! - `{prefix}:appraisal_completed:{user}`: set of completed appraisal ids
//!
//! The relational row is the system of record. Everything here is advisory:
//! cache failures are logged, counted and swallowed, and every mutation
//! refreshes the key's TTL so stale users age out on their own.

use std::sync::Arc;
use std::time::Duration;

use jianbao_core::{
    Advisory, AppraisalId, AppraisalStatus, CacheError, Contribution, SkipReason, UserInfoId,
    UserStats,
};
use jianbao_storage::{CacheResult, CacheStore};

use crate::config::NotifierConfig;
use crate::constants::{COMPLETED_KEY_SEGMENT, PENDING_KEY_SEGMENT, TO_IMPROVE_KEY_SEGMENT};
use crate::telemetry::metrics;

/// The cache adjustments made for one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsChange {
    pub removed: Option<Contribution>,
    pub added: Option<Contribution>,
}

/// Bookkeeper for the per-user statistics.
pub struct StatsService {
    cache: Arc<dyn CacheStore>,
    key_prefix: String,
    counter_ttl: Duration,
    completed_ttl: Duration,
}

impl StatsService {
    pub fn new(cache: Arc<dyn CacheStore>, config: &NotifierConfig) -> Self {
        Self {
            cache,
            key_prefix: config.key_prefix().to_string(),
            counter_ttl: config.counter_ttl,
            completed_ttl: config.completed_ttl,
        }
    }

    // ========================================================================
    // KEYS
    // ========================================================================

    pub fn pending_key(&self, user: &UserInfoId) -> String {
        format!("{}:{}:{}", self.key_prefix, PENDING_KEY_SEGMENT, user)
    }

    pub fn to_improve_key(&self, user: &UserInfoId) -> String {
        format!("{}:{}:{}", self.key_prefix, TO_IMPROVE_KEY_SEGMENT, user)
    }

    pub fn completed_key(&self, user: &UserInfoId) -> String {
        format!("{}:{}:{}", self.key_prefix, COMPLETED_KEY_SEGMENT, user)
    }

    /// Check the cache backend is reachable.
    pub async fn ping(&self) -> CacheResult<()> {
        self.cache.ping().await
    }

    // ========================================================================
    // TRANSITIONS
    // ========================================================================

    /// Adjust the statistics for one observed status transition.
    ///
    /// `old_status == None` means the row was just created and nothing is
    /// counted. A transition out of a terminal status is ignored with a
    /// warning. Cache failures come back as `Advisory::Degraded`.
    pub async fn handle_status_change(
        &self,
        user: &UserInfoId,
        appraisal: &AppraisalId,
        old_status: Option<AppraisalStatus>,
        new_status: AppraisalStatus,
    ) -> Advisory<StatsChange> {
        let outcome = self
            .classify_and_apply(user, appraisal, old_status, new_status)
            .await;
        if let Some(m) = metrics() {
            m.record_status_change(outcome.label());
        }
        outcome
    }

    async fn classify_and_apply(
        &self,
        user: &UserInfoId,
        appraisal: &AppraisalId,
        old_status: Option<AppraisalStatus>,
        new_status: AppraisalStatus,
    ) -> Advisory<StatsChange> {
        let Some(old_status) = old_status else {
            tracing::debug!(
                userinfo_id = %user,
                appraisal_id = %appraisal,
                new_status = %new_status,
                "Creation, statistics not counted"
            );
            return Advisory::Skipped(SkipReason::Creation);
        };

        if old_status == new_status {
            tracing::debug!(
                appraisal_id = %appraisal,
                status = %new_status,
                "Status unchanged"
            );
            return Advisory::Skipped(SkipReason::Unchanged);
        }

        if old_status.is_terminal() {
            tracing::warn!(
                userinfo_id = %user,
                appraisal_id = %appraisal,
                old_status = %old_status,
                new_status = %new_status,
                "Transition out of a terminal status, statistics left untouched"
            );
            return Advisory::Skipped(SkipReason::TerminalGuard {
                from: old_status,
                to: new_status,
            });
        }

        let change = StatsChange {
            removed: old_status.contribution(),
            added: new_status.contribution(),
        };
        if change.removed.is_none() && change.added.is_none() {
            return Advisory::Skipped(SkipReason::Untracked);
        }

        match self.apply(user, appraisal, change).await {
            Ok(()) => {
                tracing::info!(
                    userinfo_id = %user,
                    appraisal_id = %appraisal,
                    old_status = %old_status,
                    new_status = %new_status,
                    "Appraisal statistics updated"
                );
                Advisory::Applied(change)
            }
            Err(e) => {
                self.swallow("handle_status_change", &e);
                Advisory::degraded(e)
            }
        }
    }

    async fn apply(
        &self,
        user: &UserInfoId,
        appraisal: &AppraisalId,
        change: StatsChange,
    ) -> CacheResult<()> {
        if let Some(contribution) = change.removed {
            self.remove_contribution(user, appraisal, contribution)
                .await?;
        }
        if let Some(contribution) = change.added {
            self.add_contribution(user, appraisal, contribution).await?;
        }
        Ok(())
    }

    async fn remove_contribution(
        &self,
        user: &UserInfoId,
        appraisal: &AppraisalId,
        contribution: Contribution,
    ) -> CacheResult<()> {
        match contribution {
            Contribution::PendingCount => {
                let key = self.pending_key(user);
                self.cache.decr_floor(&key, 1).await?;
                self.cache.expire(&key, self.counter_ttl).await?;
            }
            Contribution::ToImproveCount => {
                let key = self.to_improve_key(user);
                self.cache.decr_floor(&key, 1).await?;
                self.cache.expire(&key, self.counter_ttl).await?;
            }
            Contribution::CompletedSet => {
                let key = self.completed_key(user);
                self.cache.srem(&key, appraisal.as_str()).await?;
                self.cache.expire(&key, self.completed_ttl).await?;
            }
        }
        Ok(())
    }

    async fn add_contribution(
        &self,
        user: &UserInfoId,
        appraisal: &AppraisalId,
        contribution: Contribution,
    ) -> CacheResult<()> {
        match contribution {
            Contribution::PendingCount => {
                let key = self.pending_key(user);
                self.cache.incr(&key, 1).await?;
                self.cache.expire(&key, self.counter_ttl).await?;
            }
            Contribution::ToImproveCount => {
                let key = self.to_improve_key(user);
                self.cache.incr(&key, 1).await?;
                self.cache.expire(&key, self.counter_ttl).await?;
            }
            Contribution::CompletedSet => {
                let key = self.completed_key(user);
                self.cache.sadd(&key, appraisal.as_str()).await?;
                self.cache.expire(&key, self.completed_ttl).await?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub async fn get_pending_count(&self, user: &UserInfoId) -> u64 {
        self.read_counter("get_pending_count", &self.pending_key(user))
            .await
    }

    pub async fn get_to_improve_count(&self, user: &UserInfoId) -> u64 {
        self.read_counter("get_to_improve_count", &self.to_improve_key(user))
            .await
    }

    pub async fn get_completed_count(&self, user: &UserInfoId) -> u64 {
        match self.cache.scard(&self.completed_key(user)).await {
            Ok(count) => count,
            Err(e) => {
                self.swallow("get_completed_count", &e);
                0
            }
        }
    }

    /// Completed appraisal ids, in id order.
    pub async fn get_completed_ids(&self, user: &UserInfoId) -> Vec<AppraisalId> {
        match self.cache.smembers(&self.completed_key(user)).await {
            Ok(members) => members
                .into_iter()
                .filter_map(|m| AppraisalId::new(m).ok())
                .collect(),
            Err(e) => {
                self.swallow("get_completed_ids", &e);
                Vec::new()
            }
        }
    }

    pub async fn is_in_completed(&self, user: &UserInfoId, appraisal: &AppraisalId) -> bool {
        match self
            .cache
            .sismember(&self.completed_key(user), appraisal.as_str())
            .await
        {
            Ok(found) => found,
            Err(e) => {
                self.swallow("is_in_completed", &e);
                false
            }
        }
    }

    pub async fn get_user_stats(&self, user: &UserInfoId) -> UserStats {
        UserStats {
            pending: self.get_pending_count(user).await,
            to_improve: self.get_to_improve_count(user).await,
            completed: self.get_completed_count(user).await,
        }
    }

    async fn read_counter(&self, operation: &str, key: &str) -> u64 {
        let raw = match self.cache.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                self.swallow(operation, &e);
                return 0;
            }
        };
        let Some(raw) = raw else {
            return 0;
        };
        match raw.trim().parse::<i64>() {
            Ok(value) => u64::try_from(value).unwrap_or(0),
            Err(_) => {
                let e = CacheError::MalformedValue {
                    key: key.to_string(),
                    value: raw,
                };
                self.swallow(operation, &e);
                0
            }
        }
    }

    // ========================================================================
    // OPERATOR SEEDING
    // ========================================================================

    /// Overwrite the pending counter, e.g. after recounting from the database.
    pub async fn set_pending_count(&self, user: &UserInfoId, count: u64) -> Advisory<()> {
        self.write_counter("set_pending_count", &self.pending_key(user), count)
            .await
    }

    /// Overwrite the needs-supplement counter.
    pub async fn set_to_improve_count(&self, user: &UserInfoId, count: u64) -> Advisory<()> {
        self.write_counter("set_to_improve_count", &self.to_improve_key(user), count)
            .await
    }

    async fn write_counter(&self, operation: &str, key: &str, count: u64) -> Advisory<()> {
        match self
            .cache
            .set(key, &count.to_string(), Some(self.counter_ttl))
            .await
        {
            Ok(()) => {
                tracing::info!(key, count, "Counter seeded");
                Advisory::Applied(())
            }
            Err(e) => {
                self.swallow(operation, &e);
                Advisory::degraded(e)
            }
        }
    }

    fn swallow(&self, operation: &str, err: &CacheError) {
        tracing::error!(operation, error = %err, "Stats cache operation failed");
        if let Some(m) = metrics() {
            m.record_cache_error(operation);
        }
    }
}
