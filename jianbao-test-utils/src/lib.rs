//! jianbao Test Utilities
//!
//! Shared test infrastructure for the jianbao workspace:
//! - Mock collaborators (recording SMS sender, failing cache)
//! - Proptest generators for statuses and transitions
//! - Fixtures for appraisal rows and owners
//! - Assertions over advisory outcomes

pub use jianbao_core::{
    Advisory, Appraisal, AppraisalId, AppraisalResult, AppraisalStatus, CacheError,
    DeliveryReceipt, NotificationCategory, NotificationSender, NotifyError, SkipReason, UserInfo,
    UserInfoId,
};
pub use jianbao_storage::{CacheResult, CacheStore, InMemoryAppraisalStore, InMemoryCacheStore};

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// MOCK COLLABORATORS
// ============================================================================

/// One call observed by [`RecordingSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub phone: String,
    pub category: NotificationCategory,
    pub appraisal_id: AppraisalId,
}

/// Notification sender that records every attempt.
///
/// Attempts are recorded even when the sender is set to fail.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentNotification>>,
    failing: AtomicBool,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail with a transport error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent().len()
    }

    /// Attempts made for one appraisal, in order.
    pub fn sent_for(&self, appraisal_id: &AppraisalId) -> Vec<SentNotification> {
        self.sent()
            .into_iter()
            .filter(|n| &n.appraisal_id == appraisal_id)
            .collect()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send_status_notification(
        &self,
        phone: &str,
        category: NotificationCategory,
        appraisal_id: &AppraisalId,
    ) -> Result<DeliveryReceipt, NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(SentNotification {
                phone: phone.to_string(),
                category,
                appraisal_id: appraisal_id.clone(),
            });

        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport {
                reason: "recording sender set to fail".to_string(),
            });
        }

        Ok(DeliveryReceipt {
            request_id: Some(format!("test-{}", appraisal_id)),
            phone_number: phone.to_string(),
            template_id: category.as_str().to_string(),
        })
    }
}

/// Cache store whose every operation fails, as if Redis were unreachable.
#[derive(Debug, Clone, Default)]
pub struct FailingCacheStore;

impl FailingCacheStore {
    pub fn new() -> Self {
        Self
    }

    fn unreachable<T>() -> CacheResult<T> {
        Err(CacheError::Connection {
            reason: "connection refused".to_string(),
        })
    }
}

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn ping(&self) -> CacheResult<()> {
        Self::unreachable()
    }

    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Self::unreachable()
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> CacheResult<()> {
        Self::unreachable()
    }

    async fn incr(&self, _key: &str, _by: i64) -> CacheResult<i64> {
        Self::unreachable()
    }

    async fn decr_floor(&self, _key: &str, _by: i64) -> CacheResult<i64> {
        Self::unreachable()
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> CacheResult<bool> {
        Self::unreachable()
    }

    async fn ttl(&self, _key: &str) -> CacheResult<Option<Duration>> {
        Self::unreachable()
    }

    async fn sadd(&self, _key: &str, _member: &str) -> CacheResult<bool> {
        Self::unreachable()
    }

    async fn srem(&self, _key: &str, _member: &str) -> CacheResult<bool> {
        Self::unreachable()
    }

    async fn smembers(&self, _key: &str) -> CacheResult<BTreeSet<String>> {
        Self::unreachable()
    }

    async fn scard(&self, _key: &str) -> CacheResult<u64> {
        Self::unreachable()
    }

    async fn sismember(&self, _key: &str, _member: &str) -> CacheResult<bool> {
        Self::unreachable()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for appraisal statuses and transitions.

    use super::*;
    use proptest::prelude::*;

    /// Any status, including the untracked ones.
    pub fn arb_status() -> impl Strategy<Value = AppraisalStatus> {
        proptest::sample::select(AppraisalStatus::ALL.to_vec())
    }

    /// A status or a blank one, as found on freshly created rows.
    pub fn arb_maybe_status() -> impl Strategy<Value = Option<AppraisalStatus>> {
        proptest::option::of(arb_status())
    }

    pub fn arb_result() -> impl Strategy<Value = AppraisalResult> {
        prop_oneof![
            Just(AppraisalResult::Authentic),
            Just(AppraisalResult::Fake),
            Just(AppraisalResult::NeedsSupplement),
            Just(AppraisalResult::Uncertain),
        ]
    }

    /// A sequence of statuses one appraisal moves through.
    pub fn arb_status_walk(max_len: usize) -> impl Strategy<Value = Vec<AppraisalStatus>> {
        proptest::collection::vec(arb_status(), 1..=max_len)
    }

    /// Mainland mobile numbers, sometimes with the country code already present.
    pub fn arb_phone() -> impl Strategy<Value = String> {
        (prop::bool::ANY, 13_000_000_000u64..19_999_999_999u64).prop_map(|(prefixed, n)| {
            if prefixed {
                format!("+86{}", n)
            } else {
                n.to_string()
            }
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built rows for common scenarios.

    use super::*;

    pub const SAMPLE_PHONE: &str = "13800138000";

    pub fn appraisal_id(raw: &str) -> AppraisalId {
        AppraisalId::new(raw).expect("fixture appraisal id")
    }

    pub fn user_id(raw: &str) -> UserInfoId {
        UserInfoId::new(raw).expect("fixture user id")
    }

    /// An appraisal owned by `owner` in `status`.
    pub fn appraisal(id: &str, owner: &str, status: Option<AppraisalStatus>) -> Appraisal {
        Appraisal {
            id: appraisal_id(id),
            userinfo_id: Some(user_id(owner)),
            title: Some("Qianlong enamel bowl".to_string()),
            status,
            result: None,
            notes: None,
            updated_at_ms: None,
        }
    }

    /// An appraisal row with no owner.
    pub fn orphan_appraisal(id: &str, status: Option<AppraisalStatus>) -> Appraisal {
        Appraisal {
            userinfo_id: None,
            ..appraisal(id, "nobody", status)
        }
    }

    pub fn user(id: &str, phone: Option<&str>) -> UserInfo {
        UserInfo {
            id: user_id(id),
            phone: phone.map(str::to_string),
            nick_name: Some("collector".to_string()),
        }
    }

    /// Store seeded with one owner (phone on file) and the given rows.
    pub fn seeded_store(owner: &str, rows: Vec<Appraisal>) -> InMemoryAppraisalStore {
        let store = InMemoryAppraisalStore::new();
        store
            .insert_user(user(owner, Some(SAMPLE_PHONE)))
            .expect("seed user");
        for row in rows {
            store.insert_appraisal(row).expect("seed appraisal");
        }
        store
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over advisory outcomes.

    use super::*;

    /// Assert the outcome was applied and return its value.
    pub fn assert_applied<T: std::fmt::Debug>(outcome: &Advisory<T>) -> &T {
        match outcome {
            Advisory::Applied(value) => value,
            other => panic!("Expected Applied, got {:?}", other),
        }
    }

    pub fn assert_skipped<T: std::fmt::Debug>(outcome: &Advisory<T>, expected: &SkipReason) {
        match outcome {
            Advisory::Skipped(reason) => assert_eq!(reason, expected),
            other => panic!("Expected Skipped({:?}), got {:?}", expected, other),
        }
    }

    pub fn assert_degraded<T: std::fmt::Debug>(outcome: &Advisory<T>) {
        assert!(
            outcome.is_degraded(),
            "Expected Degraded, got {:?}",
            outcome
        );
    }

    /// Assert a TTL is set and no longer than `max`.
    pub fn assert_ttl_within(ttl: Option<Duration>, max: Duration) {
        let ttl = ttl.expect("Expected key to carry a TTL");
        assert!(ttl <= max, "TTL {:?} exceeds {:?}", ttl, max);
        assert!(!ttl.is_zero(), "TTL already elapsed");
    }
}

// ============================================================================
// TESTS
// ============================================================================
