//! End-to-end tests for the appraisal mutation pipeline
//!
//! Row write, then statistics, then the delayed SMS, wired through
//! `AppState` over in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use jianbao_api::routes::health::{readiness, HealthResponse, HealthStatus};
use jianbao_api::{
    AppState, AppraisalUpdateItem, NotificationAction, NotifierConfig, ResultSubmission,
    StatsChange,
};
use jianbao_core::{
    Advisory, AppraisalResult, AppraisalStatus, AppraisalUpdate, Contribution,
    NotificationCategory, SkipReason,
};
use jianbao_storage::{AppraisalStore, CacheStore, InMemoryAppraisalStore, InMemoryCacheStore};
use jianbao_test_utils::{assertions, fixtures, FailingCacheStore, RecordingSender};
use tokio::sync::watch;

const DELAY: Duration = Duration::from_secs(300);

struct Pipeline {
    state: AppState,
    store: Arc<InMemoryAppraisalStore>,
    sender: Arc<RecordingSender>,
    _shutdown_tx: watch::Sender<bool>,
}

fn config() -> NotifierConfig {
    NotifierConfig {
        sms_delay: DELAY,
        ..NotifierConfig::default()
    }
}

fn pipeline_with_cache(cache: Arc<dyn CacheStore>, rows: Vec<jianbao_core::Appraisal>) -> Pipeline {
    let store = Arc::new(fixtures::seeded_store("u1", rows));
    let sender = Arc::new(RecordingSender::new());
    let state = AppState::new(store.clone(), cache, sender.clone(), &config());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(state.scheduler.clone().run(shutdown_rx));

    Pipeline {
        state,
        store,
        sender,
        _shutdown_tx: shutdown_tx,
    }
}

fn pipeline(rows: Vec<jianbao_core::Appraisal>) -> Pipeline {
    pipeline_with_cache(Arc::new(InMemoryCacheStore::new()), rows)
}

fn status_update(status: AppraisalStatus) -> AppraisalUpdate {
    AppraisalUpdate {
        status: Some(status),
        result: None,
        notes: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_update_counts_and_notifies_after_delay() {
    let p = pipeline(vec![fixtures::appraisal(
        "a1",
        "u1",
        Some(AppraisalStatus::Pending),
    )]);
    let a1 = fixtures::appraisal_id("a1");
    let u1 = fixtures::user_id("u1");
    let _ = p.state.stats.set_pending_count(&u1, 1).await;

    let outcome = p
        .state
        .appraisals
        .update_appraisal(&a1, &status_update(AppraisalStatus::NeedsSupplement))
        .await
        .unwrap();

    assert_eq!(outcome.appraisal.status, Some(AppraisalStatus::NeedsSupplement));
    assert_eq!(
        assertions::assert_applied(&outcome.effects.stats),
        &StatsChange {
            removed: Some(Contribution::PendingCount),
            added: Some(Contribution::ToImproveCount),
        }
    );
    assert!(matches!(
        outcome.effects.notification,
        Advisory::Applied(NotificationAction::Scheduled(_))
    ));

    let stored = p.store.get_appraisal(&a1).await.unwrap().unwrap();
    assert_eq!(stored.status, Some(AppraisalStatus::NeedsSupplement));
    assert!(stored.updated_at_ms.is_some());

    assert_eq!(p.state.stats.get_pending_count(&u1).await, 0);
    assert_eq!(p.state.stats.get_to_improve_count(&u1).await, 1);

    // Nothing is sent before the delay.
    tokio::time::sleep(DELAY - Duration::from_secs(1)).await;
    assert_eq!(p.sender.sent_count(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let sent = p.sender.sent_for(&a1);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].phone, fixtures::SAMPLE_PHONE);
    assert_eq!(sent[0].category, NotificationCategory::Supplement);
}

#[tokio::test(start_paused = true)]
async fn test_moving_to_silent_status_cancels_pending_sms() {
    let p = pipeline(vec![fixtures::appraisal(
        "a1",
        "u1",
        Some(AppraisalStatus::InReview),
    )]);
    let a1 = fixtures::appraisal_id("a1");

    let first = p
        .state
        .appraisals
        .update_appraisal(&a1, &status_update(AppraisalStatus::NeedsSupplement))
        .await
        .unwrap();
    assert!(first.effects.notification.is_applied());

    let second = p
        .state
        .appraisals
        .update_appraisal(&a1, &status_update(AppraisalStatus::InReview))
        .await
        .unwrap();
    assert_eq!(
        second.effects.notification,
        Advisory::Applied(NotificationAction::Cancelled)
    );

    tokio::time::sleep(DELAY * 2).await;
    assert_eq!(p.sender.sent_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_submit_result_records_verdict_and_completes() {
    let p = pipeline(vec![fixtures::appraisal(
        "a1",
        "u1",
        Some(AppraisalStatus::InReview),
    )]);
    let a1 = fixtures::appraisal_id("a1");
    let u1 = fixtures::user_id("u1");

    let outcome = p
        .state
        .appraisals
        .submit_result(
            &a1,
            &ResultSubmission {
                order_id: "a1".to_string(),
                result: AppraisalResult::Authentic,
                notes: Some("period glaze, genuine mark".to_string()),
                appraiser_id: Some(7),
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.appraisal.status, Some(AppraisalStatus::Completed));
    assert_eq!(outcome.appraisal.result, Some(AppraisalResult::Authentic));

    let verdicts = p.store.verdicts().unwrap();
    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0].appraiser_id, Some(7));
    assert_eq!(verdicts[0].notes, "period glaze, genuine mark");

    assert!(p.state.stats.is_in_completed(&u1, &a1).await);

    tokio::time::sleep(DELAY + Duration::from_secs(1)).await;
    let sent = p.sender.sent_for(&a1);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].category, NotificationCategory::FinalOutcome);
}

#[tokio::test(start_paused = true)]
async fn test_same_status_neither_counts_nor_notifies() {
    let p = pipeline(vec![fixtures::appraisal(
        "a1",
        "u1",
        Some(AppraisalStatus::Completed),
    )]);

    let outcome = p
        .state
        .appraisals
        .update_appraisal(
            &fixtures::appraisal_id("a1"),
            &AppraisalUpdate {
                status: Some(AppraisalStatus::Completed),
                result: None,
                notes: Some("re-checked".to_string()),
            },
        )
        .await
        .unwrap();

    assertions::assert_skipped(&outcome.effects.stats, &SkipReason::Unchanged);
    assertions::assert_skipped(&outcome.effects.notification, &SkipReason::Unchanged);
    assert_eq!(outcome.appraisal.notes.as_deref(), Some("re-checked"));

    tokio::time::sleep(DELAY * 2).await;
    assert_eq!(p.sender.sent_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_owner_without_phone_skips_sms() {
    let p = pipeline(vec![fixtures::appraisal(
        "a1",
        "u2",
        Some(AppraisalStatus::InReview),
    )]);
    p.store.insert_user(fixtures::user("u2", None)).unwrap();

    let outcome = p
        .state
        .appraisals
        .update_appraisal(
            &fixtures::appraisal_id("a1"),
            &status_update(AppraisalStatus::Completed),
        )
        .await
        .unwrap();

    assert!(outcome.effects.stats.is_applied());
    assertions::assert_skipped(&outcome.effects.notification, &SkipReason::NoRecipient);
    assert_eq!(p.state.scheduler.pending_count(), 0);
}

fn terminal_guard(to: AppraisalStatus) -> SkipReason {
    SkipReason::TerminalGuard {
        from: AppraisalStatus::Completed,
        to,
    }
}

#[tokio::test(start_paused = true)]
async fn test_leaving_completed_sends_nothing() {
    let p = pipeline(vec![fixtures::appraisal(
        "a1",
        "u1",
        Some(AppraisalStatus::Completed),
    )]);
    let a1 = fixtures::appraisal_id("a1");

    let outcome = p
        .state
        .appraisals
        .update_appraisal(&a1, &status_update(AppraisalStatus::NeedsSupplement))
        .await
        .unwrap();

    // The row write stands; only the side effects are suppressed.
    assert_eq!(outcome.appraisal.status, Some(AppraisalStatus::NeedsSupplement));
    let guard = terminal_guard(AppraisalStatus::NeedsSupplement);
    assertions::assert_skipped(&outcome.effects.stats, &guard);
    assertions::assert_skipped(&outcome.effects.notification, &guard);
    assert_eq!(p.state.scheduler.pending_count(), 0);

    tokio::time::sleep(DELAY * 2).await;
    assert_eq!(p.sender.sent_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_leaving_completed_keeps_pending_outcome_sms() {
    let p = pipeline(vec![fixtures::appraisal(
        "a1",
        "u1",
        Some(AppraisalStatus::InReview),
    )]);
    let a1 = fixtures::appraisal_id("a1");

    let completed = p
        .state
        .appraisals
        .update_appraisal(&a1, &status_update(AppraisalStatus::Completed))
        .await
        .unwrap();
    assert!(completed.effects.notification.is_applied());

    tokio::time::sleep(Duration::from_secs(60)).await;
    let cancelled = p
        .state
        .appraisals
        .update_appraisal(&a1, &status_update(AppraisalStatus::Cancelled))
        .await
        .unwrap();

    assertions::assert_skipped(
        &cancelled.effects.notification,
        &terminal_guard(AppraisalStatus::Cancelled),
    );
    assert_eq!(p.state.scheduler.pending_count(), 1);

    tokio::time::sleep(DELAY).await;
    let sent = p.sender.sent_for(&a1);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].category, NotificationCategory::FinalOutcome);
}

#[tokio::test(start_paused = true)]
async fn test_result_on_completed_row_sends_nothing() {
    let p = pipeline(vec![fixtures::appraisal(
        "a1",
        "u1",
        Some(AppraisalStatus::Completed),
    )]);
    let a1 = fixtures::appraisal_id("a1");

    let outcome = p
        .state
        .appraisals
        .submit_result(
            &a1,
            &ResultSubmission {
                order_id: "a1".to_string(),
                result: AppraisalResult::NeedsSupplement,
                notes: None,
                appraiser_id: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(p.store.verdicts().unwrap().len(), 1);
    assertions::assert_skipped(
        &outcome.effects.notification,
        &terminal_guard(AppraisalStatus::NeedsSupplement),
    );

    tokio::time::sleep(DELAY * 2).await;
    assert_eq!(p.sender.sent_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_orphan_row_still_updates() {
    let p = pipeline(vec![fixtures::orphan_appraisal(
        "a1",
        Some(AppraisalStatus::InReview),
    )]);

    let outcome = p
        .state
        .appraisals
        .update_appraisal(
            &fixtures::appraisal_id("a1"),
            &status_update(AppraisalStatus::Completed),
        )
        .await
        .unwrap();

    assert_eq!(outcome.appraisal.status, Some(AppraisalStatus::Completed));
    assertions::assert_skipped(&outcome.effects.stats, &SkipReason::NoRecipient);
    assertions::assert_skipped(&outcome.effects.notification, &SkipReason::NoRecipient);
}

#[tokio::test(start_paused = true)]
async fn test_cache_outage_does_not_fail_the_write() {
    let p = pipeline_with_cache(
        Arc::new(FailingCacheStore::new()),
        vec![fixtures::appraisal("a1", "u1", Some(AppraisalStatus::InReview))],
    );
    let a1 = fixtures::appraisal_id("a1");

    let outcome = p
        .state
        .appraisals
        .update_appraisal(&a1, &status_update(AppraisalStatus::Completed))
        .await
        .unwrap();

    assertions::assert_degraded(&outcome.effects.stats);
    assert!(outcome.effects.notification.is_applied());
    let stored = p.store.get_appraisal(&a1).await.unwrap().unwrap();
    assert_eq!(stored.status, Some(AppraisalStatus::Completed));

    tokio::time::sleep(DELAY + Duration::from_secs(1)).await;
    assert_eq!(p.sender.sent_for(&a1).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_batch_update_reports_per_item() {
    let p = pipeline(vec![
        fixtures::appraisal("a1", "u1", Some(AppraisalStatus::Pending)),
        fixtures::appraisal("a2", "u1", Some(AppraisalStatus::Pending)),
    ]);

    let items = vec![
        AppraisalUpdateItem {
            order_id: "a1".to_string(),
            status: Some(AppraisalStatus::InReview),
            result: None,
            notes: None,
        },
        AppraisalUpdateItem {
            order_id: "missing".to_string(),
            status: Some(AppraisalStatus::InReview),
            result: None,
            notes: None,
        },
        AppraisalUpdateItem {
            order_id: "".to_string(),
            status: Some(AppraisalStatus::InReview),
            result: None,
            notes: None,
        },
        AppraisalUpdateItem {
            order_id: "a2".to_string(),
            status: None,
            result: Some(AppraisalResult::Fake),
            notes: Some("modern copy".to_string()),
        },
    ];

    let report = p.state.appraisals.batch_update(&items).await.unwrap();
    assert_eq!(report.success_count, 2);
    assert_eq!(report.failed_count, 2);
    assert_eq!(report.failed_items[0].order_id, "missing");
    assert_eq!(report.failed_items[0].reason, "order not found");
    assert_eq!(report.failed_items[1].order_id, "");

    let a2 = p
        .store
        .get_appraisal(&fixtures::appraisal_id("a2"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a2.status, Some(AppraisalStatus::Pending));
    assert_eq!(a2.result, Some(AppraisalResult::Fake));
}

#[tokio::test(start_paused = true)]
async fn test_submit_results_batch() {
    let p = pipeline(vec![
        fixtures::appraisal("a1", "u1", Some(AppraisalStatus::InReview)),
        fixtures::appraisal("a2", "u1", Some(AppraisalStatus::InReview)),
    ]);
    let u1 = fixtures::user_id("u1");

    let items = vec![
        ResultSubmission {
            order_id: "a1".to_string(),
            result: AppraisalResult::NeedsSupplement,
            notes: Some("need a photo of the base".to_string()),
            appraiser_id: None,
        },
        ResultSubmission {
            order_id: "a2".to_string(),
            result: AppraisalResult::Uncertain,
            notes: None,
            appraiser_id: None,
        },
    ];

    let report = p.state.appraisals.submit_results(&items).await.unwrap();
    assert_eq!(report.success_count, 2);
    assert_eq!(report.failed_count, 0);
    assert_eq!(p.store.verdicts().unwrap().len(), 2);

    assert_eq!(p.state.stats.get_to_improve_count(&u1).await, 1);
    assert_eq!(p.state.stats.get_completed_count(&u1).await, 1);
    assert_eq!(p.state.scheduler.pending_count(), 2);
}

#[tokio::test]
async fn test_oversized_batch_is_rejected() {
    let p = pipeline(Vec::new());
    let items: Vec<AppraisalUpdateItem> = (0..=jianbao_api::constants::MAX_BATCH_ITEMS)
        .map(|i| AppraisalUpdateItem {
            order_id: format!("a{}", i),
            status: Some(AppraisalStatus::InReview),
            result: None,
            notes: None,
        })
        .collect();

    let err = p.state.appraisals.batch_update(&items).await.unwrap_err();
    assert_eq!(err.code, jianbao_api::ErrorCode::BatchTooLarge);
}

#[tokio::test]
async fn test_readiness_reports_degraded_cache() {
    let p = pipeline_with_cache(Arc::new(FailingCacheStore::new()), Vec::new());
    let state = p.state.clone();

    let response = readiness(
        State(state.store.clone()),
        State(state.stats.clone()),
        State(state.scheduler.clone()),
        State(state.start_time),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, HealthStatus::Degraded);
    let details = health.details.unwrap();
    assert_eq!(details.database.status, HealthStatus::Healthy);
    assert_eq!(details.cache.status, HealthStatus::Degraded);
    assert_eq!(details.pending_notifications, 0);
}
