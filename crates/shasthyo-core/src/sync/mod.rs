//! Reconciliation coordinator.
//!
//! Drains the durable sync queue against the backend whenever
//! connectivity returns, and periodically while online. Items are
//! submitted strictly in sequence order; a transiently failing item
//! stops the pass so nothing overtakes it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::connectivity::ConnectivityHandle;
use crate::error::Result;
use crate::models::{QueueStatus, SyncQueueItem};
use crate::rpc::{RpcClient, RpcError, SyncAck, SyncEnvelope};
use crate::services::StoreService;
use crate::util::unix_millis_now;

const DRAIN_BATCH: usize = 16;

/// Per-item retry policy between drain passes
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Backoff cap
    pub max_delay: Duration,
    /// Attempts before an item is abandoned into `failed_permanent`
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            max_attempts: 8,
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff: `base * 2^(attempts-1)`, capped
    pub fn delay_after(&self, attempt_count: u32) -> Duration {
        let exponent = attempt_count.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1 << exponent);
        delay.min(self.max_delay)
    }
}

/// What one drain pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub acknowledged: usize,
    pub rejected: usize,
    /// True when the pass stopped early: a transient failure, a head item
    /// still backing off, or connectivity loss mid-pass
    pub stalled: bool,
}

/// Outcome of a drain trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Another drain was already running; this trigger was absorbed
    Coalesced,
    Drained(DrainReport),
}

/// Drains the queue against the backend, one item at a time
pub struct ReconciliationCoordinator {
    store: StoreService,
    rpc: Arc<dyn RpcClient>,
    connectivity: ConnectivityHandle,
    policy: RetryPolicy,
    drain_interval: Duration,
    drain_lock: Mutex<()>,
}

impl ReconciliationCoordinator {
    pub fn new(
        store: StoreService,
        rpc: Arc<dyn RpcClient>,
        connectivity: ConnectivityHandle,
        policy: RetryPolicy,
        drain_interval: Duration,
    ) -> Self {
        Self {
            store,
            rpc,
            connectivity,
            policy,
            drain_interval,
            drain_lock: Mutex::new(()),
        }
    }

    /// Run one drain pass. Concurrent triggers coalesce: at most one
    /// pass executes at a time, and an overlapping trigger returns
    /// immediately instead of queueing behind it.
    pub async fn drain(&self) -> Result<DrainOutcome> {
        let Ok(_guard) = self.drain_lock.try_lock() else {
            tracing::debug!("drain already in progress, coalescing trigger");
            return Ok(DrainOutcome::Coalesced);
        };

        let mut report = DrainReport::default();
        'pass: loop {
            let batch = self.store.peek_batch(DRAIN_BATCH)?;
            if batch.is_empty() {
                break;
            }

            for item in batch {
                // Connectivity loss cancels the pass; the current item is
                // left (or restored) pending, safe to retry later.
                if !self.connectivity.is_online() {
                    tracing::info!("connectivity lost mid-drain, stopping pass");
                    report.stalled = true;
                    break 'pass;
                }

                // The head item gates the queue: if it is still backing
                // off, nothing behind it may be submitted.
                if item.next_attempt_at > unix_millis_now() {
                    report.stalled = true;
                    break 'pass;
                }

                if !self.submit_item(&item, &mut report).await? {
                    break 'pass;
                }
            }
        }

        tracing::debug!(
            acknowledged = report.acknowledged,
            rejected = report.rejected,
            stalled = report.stalled,
            "drain pass finished"
        );
        Ok(DrainOutcome::Drained(report))
    }

    /// Submit one item. Returns false when the pass must stop.
    async fn submit_item(&self, item: &SyncQueueItem, report: &mut DrainReport) -> Result<bool> {
        self.store.mark(
            item.sequence_no,
            QueueStatus::InFlight,
            item.attempt_count,
            item.next_attempt_at,
            item.last_error.as_deref(),
        )?;

        let envelope = SyncEnvelope::from(item);
        match self.rpc.sync(&[envelope]).await {
            Ok(acks) => self.apply_ack(item, acks.as_slice(), report),
            Err(error) if error.is_transient() => {
                self.defer_item(item, &error)?;
                report.stalled = true;
                Ok(false)
            }
            Err(error) => {
                tracing::warn!(
                    sequence_no = item.sequence_no,
                    "queued action permanently rejected: {error}"
                );
                self.store.mark(
                    item.sequence_no,
                    QueueStatus::FailedPermanent,
                    item.attempt_count + 1,
                    0,
                    Some(&error.to_string()),
                )?;
                report.rejected += 1;
                // A malformed item must not block the rest of the queue
                Ok(true)
            }
        }
    }

    fn apply_ack(
        &self,
        item: &SyncQueueItem,
        acks: &[SyncAck],
        report: &mut DrainReport,
    ) -> Result<bool> {
        let ack = acks
            .iter()
            .find(|ack| ack.idempotency_key == item.idempotency_key);

        match ack {
            Some(ack) if ack.status.is_applied() => {
                self.store.mark(
                    item.sequence_no,
                    QueueStatus::Acknowledged,
                    item.attempt_count + 1,
                    0,
                    None,
                )?;
                self.store.remove(item.sequence_no)?;
                tracing::info!(
                    sequence_no = item.sequence_no,
                    kind = %item.kind(),
                    "queued action acknowledged"
                );
                report.acknowledged += 1;
                Ok(true)
            }
            Some(ack) => {
                let message = ack.message.as_deref().unwrap_or("rejected by server");
                tracing::warn!(
                    sequence_no = item.sequence_no,
                    "queued action rejected: {message}"
                );
                self.store.mark(
                    item.sequence_no,
                    QueueStatus::FailedPermanent,
                    item.attempt_count + 1,
                    0,
                    Some(message),
                )?;
                report.rejected += 1;
                Ok(true)
            }
            None => {
                // No addressable ack for the item; treat as transient and
                // retry, the idempotency key makes that safe.
                self.defer_item(item, &RpcError::InvalidPayload(
                    "sync response did not address the submitted item".to_string(),
                ))?;
                report.stalled = true;
                Ok(false)
            }
        }
    }

    /// Restore a transiently failed item to pending with backoff, or
    /// abandon it once attempts are exhausted.
    fn defer_item(&self, item: &SyncQueueItem, error: &RpcError) -> Result<()> {
        let attempts = item.attempt_count + 1;
        if attempts >= self.policy.max_attempts {
            tracing::warn!(
                sequence_no = item.sequence_no,
                attempts,
                "retry attempts exhausted, abandoning item: {error}"
            );
            self.store.mark(
                item.sequence_no,
                QueueStatus::FailedPermanent,
                attempts,
                0,
                Some(&error.to_string()),
            )?;
            return Ok(());
        }

        let delay = self.policy.delay_after(attempts);
        let next_attempt_at = unix_millis_now() + i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        tracing::debug!(
            sequence_no = item.sequence_no,
            attempts,
            retry_in_ms = delay.as_millis() as u64,
            "transient failure, deferring item: {error}"
        );
        self.store.mark(
            item.sequence_no,
            QueueStatus::Pending,
            attempts,
            next_attempt_at,
            Some(&error.to_string()),
        )?;
        Ok(())
    }

    /// Event loop: drain on every online transition and on a periodic
    /// timer while online. Exits when the connectivity monitor shuts
    /// down.
    pub async fn run(&self) {
        let mut events = self.connectivity.clone();
        let mut ticker = tokio::time::interval(self.drain_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        if self.connectivity.is_online() {
            self.drain_logged().await;
        }

        loop {
            tokio::select! {
                changed = events.changed() => match changed {
                    Some(true) => {
                        tracing::info!("online transition, draining sync queue");
                        self.drain_logged().await;
                    }
                    Some(false) => {}
                    None => {
                        tracing::debug!("connectivity monitor stopped, exiting coordinator");
                        return;
                    }
                },
                _ = ticker.tick() => {
                    if self.connectivity.is_online() {
                        self.drain_logged().await;
                    }
                }
            }
        }
    }

    async fn drain_logged(&self) {
        if let Err(error) = self.drain().await {
            tracing::warn!("drain pass failed: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use tokio::sync::watch;
    use uuid::Uuid;

    use crate::models::{
        ActionPayload, Consultation, Gender, ProfileDraft, Symptom, TriageRequest, TriageResult,
        UserId, UserProfile,
    };
    use crate::rpc::{RpcResult, SyncAckStatus};

    /// Scripted sync outcomes, one per call, recording every envelope
    struct MockRpc {
        outcomes: StdMutex<Vec<RpcResult<SyncAckStatus>>>,
        submitted: StdMutex<Vec<SyncEnvelope>>,
    }

    impl MockRpc {
        fn new(outcomes: Vec<RpcResult<SyncAckStatus>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: StdMutex::new(outcomes),
                submitted: StdMutex::new(Vec::new()),
            })
        }

        fn submitted(&self) -> Vec<SyncEnvelope> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RpcClient for MockRpc {
        async fn fetch_symptoms(&self) -> RpcResult<Vec<Symptom>> {
            Ok(Vec::new())
        }

        async fn create_profile(&self, _draft: &ProfileDraft) -> RpcResult<UserProfile> {
            Err(RpcError::Timeout)
        }

        async fn fetch_profile(&self, _user_id: UserId) -> RpcResult<UserProfile> {
            Err(RpcError::Timeout)
        }

        async fn update_profile(&self, _profile: &UserProfile) -> RpcResult<UserProfile> {
            Err(RpcError::Timeout)
        }

        async fn triage(&self, _request: &TriageRequest) -> RpcResult<TriageResult> {
            Err(RpcError::Timeout)
        }

        async fn fetch_consultations(&self, _user_id: UserId) -> RpcResult<Vec<Consultation>> {
            Ok(Vec::new())
        }

        async fn sync(&self, items: &[SyncEnvelope]) -> RpcResult<Vec<SyncAck>> {
            let envelope = items[0].clone();
            self.submitted.lock().unwrap().push(envelope.clone());

            let mut outcomes = self.outcomes.lock().unwrap();
            let outcome = if outcomes.is_empty() {
                Ok(SyncAckStatus::Acked)
            } else {
                outcomes.remove(0)
            };
            match outcome {
                Ok(status) => Ok(vec![SyncAck {
                    idempotency_key: envelope.idempotency_key,
                    status,
                    message: match status {
                        SyncAckStatus::Rejected => Some("invalid payload".to_string()),
                        _ => None,
                    },
                }]),
                Err(error) => Err(error),
            }
        }
    }

    fn payload() -> ActionPayload {
        ActionPayload::ProfileUpdate {
            profile: UserProfile::new(ProfileDraft {
                age: 40,
                gender: Gender::Male,
                location: None,
            }),
        }
    }

    fn coordinator(
        store: &StoreService,
        rpc: Arc<MockRpc>,
        connectivity: ConnectivityHandle,
    ) -> ReconciliationCoordinator {
        ReconciliationCoordinator::new(
            store.clone(),
            rpc,
            connectivity,
            RetryPolicy {
                base_delay: Duration::from_secs(5),
                max_delay: Duration::from_secs(60),
                max_attempts: 3,
            },
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn drain_acknowledges_and_removes_in_fifo_order() {
        let store = StoreService::open_in_memory().unwrap();
        let first = store.enqueue(&payload()).unwrap();
        let second = store.enqueue(&payload()).unwrap();

        let rpc = MockRpc::new(vec![Ok(SyncAckStatus::Acked), Ok(SyncAckStatus::Acked)]);
        let coord = coordinator(&store, Arc::clone(&rpc), ConnectivityHandle::fixed(true));

        let outcome = coord.drain().await.unwrap();
        assert_eq!(
            outcome,
            DrainOutcome::Drained(DrainReport {
                acknowledged: 2,
                rejected: 0,
                stalled: false
            })
        );
        assert_eq!(store.pending_count().unwrap(), 0);

        let keys: Vec<Uuid> = rpc
            .submitted()
            .iter()
            .map(|envelope| envelope.idempotency_key)
            .collect();
        assert_eq!(keys, vec![first.idempotency_key, second.idempotency_key]);
    }

    #[tokio::test]
    async fn transient_failure_stops_pass_and_preserves_order() {
        let store = StoreService::open_in_memory().unwrap();
        let first = store.enqueue(&payload()).unwrap();
        let second = store.enqueue(&payload()).unwrap();
        let third = store.enqueue(&payload()).unwrap();

        let rpc = MockRpc::new(vec![
            Ok(SyncAckStatus::Acked),
            Err(RpcError::Timeout),
        ]);
        let coord = coordinator(&store, Arc::clone(&rpc), ConnectivityHandle::fixed(true));

        let outcome = coord.drain().await.unwrap();
        assert_eq!(
            outcome,
            DrainOutcome::Drained(DrainReport {
                acknowledged: 1,
                rejected: 0,
                stalled: true
            })
        );

        // Item 1 acknowledged and removed, item 2 back to pending with one
        // attempt and a backoff schedule, item 3 never attempted.
        assert_eq!(rpc.submitted().len(), 2);
        let unresolved = store.list_unresolved(10).unwrap();
        assert_eq!(unresolved.len(), 2);
        assert!(!unresolved.iter().any(|i| i.sequence_no == first.sequence_no));

        let stuck = &unresolved[0];
        assert_eq!(stuck.sequence_no, second.sequence_no);
        assert_eq!(stuck.status, QueueStatus::Pending);
        assert_eq!(stuck.attempt_count, 1);
        assert!(stuck.next_attempt_at > unix_millis_now());

        let untouched = &unresolved[1];
        assert_eq!(untouched.sequence_no, third.sequence_no);
        assert_eq!(untouched.attempt_count, 0);
    }

    #[tokio::test]
    async fn rejection_is_terminal_but_does_not_block_queue() {
        let store = StoreService::open_in_memory().unwrap();
        let first = store.enqueue(&payload()).unwrap();
        store.enqueue(&payload()).unwrap();

        let rpc = MockRpc::new(vec![
            Ok(SyncAckStatus::Rejected),
            Ok(SyncAckStatus::Acked),
        ]);
        let coord = coordinator(&store, Arc::clone(&rpc), ConnectivityHandle::fixed(true));

        let outcome = coord.drain().await.unwrap();
        assert_eq!(
            outcome,
            DrainOutcome::Drained(DrainReport {
                acknowledged: 1,
                rejected: 1,
                stalled: false
            })
        );

        let unresolved = store.list_unresolved(10).unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].sequence_no, first.sequence_no);
        assert_eq!(unresolved[0].status, QueueStatus::FailedPermanent);
        assert_eq!(unresolved[0].last_error.as_deref(), Some("invalid payload"));
    }

    #[tokio::test]
    async fn lost_ack_retry_reuses_idempotency_key() {
        let store = StoreService::open_in_memory().unwrap();
        let item = store.enqueue(&payload()).unwrap();

        let rpc = MockRpc::new(vec![
            Err(RpcError::Transport("connection reset".to_string())),
            Ok(SyncAckStatus::Duplicate),
        ]);
        let coord = coordinator(&store, Arc::clone(&rpc), ConnectivityHandle::fixed(true));

        coord.drain().await.unwrap();
        // Clear the backoff so the retry is immediately eligible
        store
            .mark(item.sequence_no, QueueStatus::Pending, 1, 0, None)
            .unwrap();
        coord.drain().await.unwrap();

        let submitted = rpc.submitted();
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[0].idempotency_key, item.idempotency_key);
        assert_eq!(submitted[1].idempotency_key, item.idempotency_key);
        // The duplicate ack still counts as applied exactly once
        assert_eq!(store.pending_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn exhausted_attempts_abandon_item_as_failed_permanent() {
        let store = StoreService::open_in_memory().unwrap();
        let item = store.enqueue(&payload()).unwrap();
        // Two failed attempts already recorded, max_attempts is 3
        store
            .mark(item.sequence_no, QueueStatus::Pending, 2, 0, Some("timeout"))
            .unwrap();

        let rpc = MockRpc::new(vec![Err(RpcError::Timeout)]);
        let coord = coordinator(&store, Arc::clone(&rpc), ConnectivityHandle::fixed(true));

        coord.drain().await.unwrap();

        let unresolved = store.list_unresolved(10).unwrap();
        assert_eq!(unresolved[0].status, QueueStatus::FailedPermanent);
        assert_eq!(unresolved[0].attempt_count, 3);
    }

    #[tokio::test]
    async fn backing_off_head_item_gates_the_queue() {
        let store = StoreService::open_in_memory().unwrap();
        let head = store.enqueue(&payload()).unwrap();
        store.enqueue(&payload()).unwrap();
        store
            .mark(
                head.sequence_no,
                QueueStatus::Pending,
                1,
                unix_millis_now() + 60_000,
                Some("timeout"),
            )
            .unwrap();

        let rpc = MockRpc::new(Vec::new());
        let coord = coordinator(&store, Arc::clone(&rpc), ConnectivityHandle::fixed(true));

        let outcome = coord.drain().await.unwrap();
        assert_eq!(
            outcome,
            DrainOutcome::Drained(DrainReport {
                acknowledged: 0,
                rejected: 0,
                stalled: true
            })
        );
        assert!(rpc.submitted().is_empty());
    }

    #[tokio::test]
    async fn connectivity_loss_cancels_pass_leaving_items_pending() {
        let store = StoreService::open_in_memory().unwrap();
        store.enqueue(&payload()).unwrap();
        store.enqueue(&payload()).unwrap();

        let (tx, rx) = watch::channel(false);
        let rpc = MockRpc::new(Vec::new());
        let coord = coordinator(
            &store,
            Arc::clone(&rpc),
            ConnectivityHandle::from_receiver(rx),
        );

        let outcome = coord.drain().await.unwrap();
        assert_eq!(
            outcome,
            DrainOutcome::Drained(DrainReport {
                acknowledged: 0,
                rejected: 0,
                stalled: true
            })
        );
        assert!(rpc.submitted().is_empty());
        assert_eq!(store.peek_batch(10).unwrap().len(), 2);
        drop(tx);
    }

    #[tokio::test]
    async fn overlapping_drain_triggers_coalesce() {
        let store = StoreService::open_in_memory().unwrap();
        store.enqueue(&payload()).unwrap();

        let rpc = MockRpc::new(Vec::new());
        let coord = Arc::new(coordinator(
            &store,
            Arc::clone(&rpc),
            ConnectivityHandle::fixed(true),
        ));

        let guard = coord.drain_lock.lock().await;
        let outcome = coord.drain().await.unwrap();
        assert_eq!(outcome, DrainOutcome::Coalesced);
        drop(guard);

        let outcome = coord.drain().await.unwrap();
        assert!(matches!(outcome, DrainOutcome::Drained(_)));
    }

    #[test]
    fn retry_policy_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            max_attempts: 8,
        };
        assert_eq!(policy.delay_after(1), Duration::from_secs(5));
        assert_eq!(policy.delay_after(2), Duration::from_secs(10));
        assert_eq!(policy.delay_after(3), Duration::from_secs(20));
        assert_eq!(policy.delay_after(6), Duration::from_secs(60));
    }
}
