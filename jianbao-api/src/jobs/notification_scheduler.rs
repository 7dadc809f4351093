//! Delayed Notification Scheduler
//!
//! Sends one status SMS per appraisal after a cooling-off delay. Scheduling
//! again for the same appraisal replaces the pending entry, so a burst of
//! transitions collapses into one message carrying the latest status.
//!
//! All pending entries live in one map guarded by one mutex, next to a
//! min-heap of fire times. A single background loop (`run`) sleeps until the
//! earliest fire time and is woken through a `Notify` whenever the schedule
//! changes. Replaced and cancelled entries leave stale heap nodes behind;
//! the loop discards a node whose sequence number no longer matches the map.
//!
//! # Example
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let scheduler = Arc::new(NotificationScheduler::new(sender, Duration::from_secs(300)));
//! tokio::spawn(scheduler.clone().run(shutdown_rx));
//!
//! scheduler.schedule(&appraisal_id, "13800000000", AppraisalStatus::Completed)?;
//!
//! // On shutdown
//! let dropped = scheduler.cancel_all();
//! let _ = shutdown_tx.send(true);
//! ```

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use jianbao_core::{
    Advisory, AppraisalId, AppraisalStatus, NotificationCategory, NotificationSender,
    PendingNotification, SkipReason, Timestamp, ValidationError,
};
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

use crate::telemetry::metrics;

// ============================================================================
// METRICS
// ============================================================================

/// Counters for scheduler activity since startup.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    pub scheduled: AtomicU64,
    pub replaced: AtomicU64,
    pub cancelled: AtomicU64,
    pub fired: AtomicU64,
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
}

impl SchedulerMetrics {
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            replaced: self.replaced.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            fired: self.fired.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn bump(&self, counter: &AtomicU64, event: &str) {
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(m) = metrics() {
            m.record_notification(event);
        }
    }
}

/// Snapshot of scheduler metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub scheduled: u64,
    pub replaced: u64,
    pub cancelled: u64,
    pub fired: u64,
    pub delivered: u64,
    pub failed: u64,
}

// ============================================================================
// STATE
// ============================================================================

/// What `schedule` installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduled {
    pub fire_at: Timestamp,
    /// Whether an earlier pending entry for the same appraisal was dropped.
    pub replaced: bool,
}

#[derive(Debug, Clone)]
struct PendingEntry {
    seq: u64,
    phone: String,
    status: AppraisalStatus,
    created_at: Timestamp,
    scheduled_for: Timestamp,
    deadline: Instant,
}

#[derive(Debug, PartialEq, Eq)]
struct HeapNode {
    deadline: Instant,
    seq: u64,
    appraisal_id: AppraisalId,
}

impl Ord for HeapNode {
    // Reversed so `BinaryHeap` pops the earliest deadline first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for HeapNode {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    pending: HashMap<AppraisalId, PendingEntry>,
    heap: BinaryHeap<HeapNode>,
    next_seq: u64,
}

impl SchedulerState {
    /// Earliest live deadline, dropping stale heap nodes on the way.
    fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(node) = self.heap.peek() {
            let live = self
                .pending
                .get(&node.appraisal_id)
                .is_some_and(|entry| entry.seq == node.seq);
            if live {
                return Some(node.deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Remove and return every live entry whose deadline has passed.
    fn take_due(&mut self, now: Instant) -> Vec<(AppraisalId, PendingEntry)> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|node| node.deadline <= now) {
            let Some(node) = self.heap.pop() else {
                break;
            };
            let live = self
                .pending
                .get(&node.appraisal_id)
                .is_some_and(|entry| entry.seq == node.seq);
            if live {
                if let Some(entry) = self.pending.remove(&node.appraisal_id) {
                    due.push((node.appraisal_id, entry));
                }
            }
        }
        due
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Debouncing scheduler for status notifications.
pub struct NotificationScheduler {
    state: Mutex<SchedulerState>,
    wake: Notify,
    sender: Arc<dyn NotificationSender>,
    delay: Duration,
    metrics: SchedulerMetrics,
}

impl NotificationScheduler {
    pub fn new(sender: Arc<dyn NotificationSender>, delay: Duration) -> Self {
        Self {
            state: Mutex::new(SchedulerState::default()),
            wake: Notify::new(),
            sender,
            delay,
            metrics: SchedulerMetrics::default(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn metrics(&self) -> SchedulerSnapshot {
        self.metrics.snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        // A poisoned map is still consistent: every section is a single insert or remove.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish_pending(&self, count: usize) {
        if let Some(m) = metrics() {
            m.set_pending_notifications(count);
        }
    }

    /// Schedule the notification for `appraisal_id`, replacing any pending one.
    ///
    /// Statuses without a notification category are skipped. An empty phone
    /// number is a caller error.
    pub fn schedule(
        &self,
        appraisal_id: &AppraisalId,
        phone: &str,
        status: AppraisalStatus,
    ) -> Result<Advisory<Scheduled>, ValidationError> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(ValidationError::missing("phone"));
        }
        if NotificationCategory::from_status(status).is_none() {
            tracing::debug!(
                appraisal_id = %appraisal_id,
                status = %status,
                "Status has no notification template"
            );
            return Ok(Advisory::Skipped(SkipReason::NotNotifiable));
        }

        let created_at = Utc::now();
        let scheduled_for = created_at
            + chrono::Duration::from_std(self.delay).unwrap_or_else(|_| chrono::Duration::zero());
        let deadline = Instant::now() + self.delay;

        let (replaced, pending_count) = {
            let mut state = self.lock();
            state.next_seq += 1;
            let seq = state.next_seq;
            let previous = state.pending.insert(
                appraisal_id.clone(),
                PendingEntry {
                    seq,
                    phone: phone.to_string(),
                    status,
                    created_at,
                    scheduled_for,
                    deadline,
                },
            );
            state.heap.push(HeapNode {
                deadline,
                seq,
                appraisal_id: appraisal_id.clone(),
            });
            (previous.is_some(), state.pending.len())
        };
        self.wake.notify_one();
        self.publish_pending(pending_count);

        if replaced {
            self.metrics.bump(&self.metrics.replaced, "replaced");
            tracing::info!(appraisal_id = %appraisal_id, "Replaced pending notification");
        }
        self.metrics.bump(&self.metrics.scheduled, "scheduled");
        tracing::info!(
            appraisal_id = %appraisal_id,
            status = %status,
            delay_secs = self.delay.as_secs(),
            "Notification scheduled"
        );

        Ok(Advisory::Applied(Scheduled {
            fire_at: scheduled_for,
            replaced,
        }))
    }

    /// Drop the pending notification for `appraisal_id`. Returns whether one existed.
    pub fn cancel(&self, appraisal_id: &AppraisalId) -> bool {
        let (removed, pending_count) = {
            let mut state = self.lock();
            let removed = state.pending.remove(appraisal_id).is_some();
            (removed, state.pending.len())
        };
        if removed {
            self.wake.notify_one();
            self.publish_pending(pending_count);
            self.metrics.bump(&self.metrics.cancelled, "cancelled");
            tracing::info!(appraisal_id = %appraisal_id, "Pending notification cancelled");
        }
        removed
    }

    /// Drop every pending notification and return how many there were.
    ///
    /// Sends already handed to the sender are not recalled.
    pub fn cancel_all(&self) -> usize {
        let count = {
            let mut state = self.lock();
            let count = state.pending.len();
            state.pending.clear();
            state.heap.clear();
            count
        };
        self.wake.notify_one();
        self.publish_pending(0);
        for _ in 0..count {
            self.metrics.bump(&self.metrics.cancelled, "cancelled");
        }
        tracing::info!(count, "Cancelled all pending notifications");
        count
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Pending notifications ordered by fire time.
    pub fn pending_snapshot(&self) -> Vec<PendingNotification> {
        let now = Instant::now();
        let mut snapshot: Vec<PendingNotification> = self
            .lock()
            .pending
            .iter()
            .map(|(id, entry)| PendingNotification {
                appraisal_id: id.clone(),
                phone: entry.phone.clone(),
                status: entry.status,
                created_at: entry.created_at,
                fire_at: entry.scheduled_for,
                remaining_secs: entry.deadline.saturating_duration_since(now).as_secs(),
            })
            .collect();
        snapshot.sort_by(|a, b| {
            a.fire_at
                .cmp(&b.fire_at)
                .then_with(|| a.appraisal_id.cmp(&b.appraisal_id))
        });
        snapshot
    }

    // ========================================================================
    // BACKGROUND LOOP
    // ========================================================================

    /// Fire due notifications until the shutdown signal is received.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) -> SchedulerSnapshot {
        tracing::info!(
            delay_secs = self.delay.as_secs(),
            "Notification scheduler started"
        );

        loop {
            let next = self.lock().next_deadline();
            let sleep = async {
                match next {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::info!("Notification scheduler shutting down");
                        break;
                    }
                }

                _ = self.wake.notified() => {}

                _ = sleep => {
                    self.fire_due();
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            scheduled = snapshot.scheduled,
            replaced = snapshot.replaced,
            cancelled = snapshot.cancelled,
            fired = snapshot.fired,
            delivered = snapshot.delivered,
            failed = snapshot.failed,
            "Notification scheduler stopped"
        );
        snapshot
    }

    /// Take every due entry out of the map and hand it to the sender.
    fn fire_due(self: &Arc<Self>) {
        let (due, pending_count) = {
            let mut state = self.lock();
            let due = state.take_due(Instant::now());
            (due, state.pending.len())
        };
        if due.is_empty() {
            return;
        }
        self.publish_pending(pending_count);

        for (appraisal_id, entry) in due {
            self.metrics.bump(&self.metrics.fired, "fired");
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.deliver(appraisal_id, entry).await;
            });
        }
    }

    async fn deliver(&self, appraisal_id: AppraisalId, entry: PendingEntry) {
        let Some(category) = NotificationCategory::from_status(entry.status) else {
            return;
        };

        match self
            .sender
            .send_status_notification(&entry.phone, category, &appraisal_id)
            .await
        {
            Ok(receipt) => {
                self.metrics.bump(&self.metrics.delivered, "delivered");
                tracing::info!(
                    appraisal_id = %appraisal_id,
                    status = %entry.status,
                    request_id = ?receipt.request_id,
                    "Notification delivered"
                );
            }
            Err(e) => {
                self.metrics.bump(&self.metrics.failed, "failed");
                tracing::error!(
                    appraisal_id = %appraisal_id,
                    status = %entry.status,
                    error = %e,
                    "Notification delivery failed"
                );
            }
        }
    }
}
