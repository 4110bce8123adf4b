// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The drain: one sequential pass over a snapshot of the pending queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::evaluator::evaluate;
use crate::notify::SyncNotification;
use crate::queue::PendingMissionResult;
use crate::remote::CompletionPayload;

use super::types::SyncSession;
use super::{DrainOutcome, SyncCoordinator, SyncState};

impl SyncCoordinator {
    /// Drain the pending queue now.
    ///
    /// Returns [`DrainOutcome::AlreadyRunning`] without doing anything if
    /// another drain holds the in-flight flag, and [`DrainOutcome::Offline`]
    /// if the monitor reports no connectivity.
    #[tracing::instrument(skip(self))]
    pub async fn sync_now(&self) -> DrainOutcome {
        let outcome = self.try_drain().await;
        crate::metrics::record_drain(outcome.metric_label());
        outcome
    }

    async fn try_drain(&self) -> DrainOutcome {
        if !self.monitor.is_online() {
            debug!("Offline, skipping drain");
            return DrainOutcome::Offline;
        }

        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Drain already in flight");
            return DrainOutcome::AlreadyRunning;
        }
        let _guard = DrainGuard::engage(&self.in_flight, &self.state);

        let snapshot = self.queue.list().await;
        if snapshot.is_empty() {
            return DrainOutcome::Empty;
        }

        let report = self.drain_snapshot(snapshot).await;
        self.drains_completed.fetch_add(1, Ordering::Relaxed);
        *self.last_report.write() = Some(report.clone());
        DrainOutcome::Completed(report)
    }

    async fn drain_snapshot(&self, snapshot: Vec<PendingMissionResult>) -> super::SyncReport {
        let start = Instant::now();
        let total = snapshot.len();
        let pause = self.config.inter_item_delay();

        info!(pending = total, "Syncing pending mission results");
        self.notifier.notify(SyncNotification::SyncStarted { count: total });

        let mut session = SyncSession::default();
        let mut stop_rx = self.stopping.subscribe();
        let mut contacted_remote = false;
        let mut processed = 0;

        for entry in &snapshot {
            if self.stop_requested() {
                info!(remaining = total - processed, "Stop requested, leaving remaining results queued");
                break;
            }

            if self.queue.is_expired(entry, Utc::now()) {
                self.drop_expired(entry, &mut session).await;
                processed += 1;
                continue;
            }

            // Pace the backend between remote calls
            if contacted_remote && !pause.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = stop_signal(&mut stop_rx) => {
                        info!(remaining = total - processed, "Stop requested, leaving remaining results queued");
                        break;
                    }
                }
            }
            contacted_remote = true;

            // Runs to completion once started: the remote call and the
            // local removal are never split by a stop request
            self.push_entry(entry, &mut session).await;
            processed += 1;
        }

        let report = session.finish(total, start.elapsed());
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            expired = report.expired,
            duration_ms = report.duration.as_millis() as u64,
            "Sync finished"
        );
        crate::metrics::record_drain_duration(report.duration);
        self.notifier.notify(SyncNotification::SyncFinished {
            succeeded: report.succeeded,
            failed: report.failed,
        });
        report
    }

    async fn drop_expired(&self, entry: &PendingMissionResult, session: &mut SyncSession) {
        let age_hours = Utc::now().signed_duration_since(entry.created_at).num_hours();

        match self.queue.remove_entry(entry).await {
            Ok(true) => {
                info!(mission_id = %entry.mission_id, age_hours, "Dropped expired mission result without syncing");
                session.expired += 1;
                crate::metrics::record_result("expired");
            }
            Ok(false) => {
                debug!(mission_id = %entry.mission_id, "Expired result already replaced by a newer one");
            }
            Err(e) => {
                // Still queued; the next drain tries the removal again
                warn!(mission_id = %entry.mission_id, error = %e, "Failed to drop expired mission result");
            }
        }
    }

    async fn push_entry(&self, entry: &PendingMissionResult, session: &mut SyncSession) {
        let results = &entry.results;
        let grade = evaluate(
            results.correct_answers,
            results.total_questions,
            results.time_spent_seconds,
        );
        let payload = CompletionPayload::from_entry(entry, &grade);

        let call_start = Instant::now();
        let outcome = self.remote.update_completion(&entry.mission_id, &payload).await;
        crate::metrics::record_remote_latency(call_start.elapsed());

        match outcome {
            Ok(()) => {
                session.succeeded += 1;
                crate::metrics::record_result("success");
                debug!(mission_id = %entry.mission_id, stars = grade.stars, "Mission result synced");

                if let Err(e) = self.queue.remove_entry(entry).await {
                    // Remote update is idempotent; resending next drain is harmless
                    warn!(
                        mission_id = %entry.mission_id,
                        error = %e,
                        "Synced but failed to drop from local queue, will resend"
                    );
                }
            }
            Err(e) => {
                session.failed += 1;
                crate::metrics::record_result("failure");
                warn!(
                    mission_id = %entry.mission_id,
                    error = %e,
                    "Remote update failed, keeping result for next drain"
                );
            }
        }
    }
}

/// Resolves once a stop is requested after `stop_rx` was created.
async fn stop_signal(stop_rx: &mut watch::Receiver<bool>) {
    while stop_rx.changed().await.is_ok() {
        if *stop_rx.borrow_and_update() {
            return;
        }
    }
    // Sender gone: no stop can arrive
    std::future::pending::<()>().await;
}

/// RAII guard: publishes `Draining` on engage, releases the in-flight flag
/// and publishes `Idle` on drop.
struct DrainGuard<'a> {
    flag: &'a AtomicBool,
    state: &'a watch::Sender<SyncState>,
}

impl<'a> DrainGuard<'a> {
    fn engage(flag: &'a AtomicBool, state: &'a watch::Sender<SyncState>) -> Self {
        state.send_replace(SyncState::Draining);
        crate::metrics::set_sync_state(true);
        Self { flag, state }
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.state.send_replace(SyncState::Idle);
        crate::metrics::set_sync_state(false);
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::network::NetworkStatusMonitor;
    use crate::notify::RecordingNotifier;
    use crate::queue::{MissionResults, PendingQueueStore, DEFAULT_QUEUE_KEY};
    use crate::remote::{InMemoryMissionStore, RemoteError, RemoteMissionStore};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    /// Records call order; fails for listed mission ids.
    #[derive(Default)]
    struct ScriptedRemote {
        calls: Mutex<Vec<String>>,
        failing: Mutex<HashSet<String>>,
        latency: Duration,
    }

    #[async_trait]
    impl RemoteMissionStore for ScriptedRemote {
        async fn update_completion(
            &self,
            mission_id: &str,
            _payload: &CompletionPayload,
        ) -> Result<(), RemoteError> {
            self.calls.lock().push(mission_id.to_string());
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if self.failing.lock().contains(mission_id) {
                Err(RemoteError::Unavailable("503".into()))
            } else {
                Ok(())
            }
        }
    }

    fn results(correct: u32) -> MissionResults {
        MissionResults {
            correct_answers: correct,
            total_questions: 10,
            time_spent_seconds: 90,
            question_attempts: None,
        }
    }

    async fn coordinator(
        remote: Arc<dyn RemoteMissionStore>,
        online: bool,
    ) -> (Arc<RecordingNotifier>, SyncCoordinator) {
        let config = SyncConfig { inter_item_delay_ms: 0, ..Default::default() };
        let notifier = Arc::new(RecordingNotifier::new());
        let queue = PendingQueueStore::open(Arc::new(MemoryStore::new()), DEFAULT_QUEUE_KEY, config.expiry())
            .await
            .unwrap();
        let monitor = NetworkStatusMonitor::new(online, config.recovery_window(), notifier.clone());
        let coordinator = SyncCoordinator::new(
            config,
            Arc::new(queue),
            remote,
            Arc::new(monitor),
            notifier.clone(),
        );
        (notifier, coordinator)
    }

    #[tokio::test]
    async fn test_empty_queue_is_silent() {
        let (notifier, coordinator) = coordinator(Arc::new(InMemoryMissionStore::new()), true).await;

        assert_eq!(coordinator.sync_now().await, DrainOutcome::Empty);
        assert!(notifier.events().is_empty());
        assert_eq!(coordinator.state(), SyncState::Idle);
        assert!(coordinator.last_report().is_none());
    }

    #[tokio::test]
    async fn test_offline_skips_drain() {
        let remote = Arc::new(ScriptedRemote::default());
        let (_notifier, coordinator) = coordinator(remote.clone(), false).await;
        coordinator.enqueue_pending_result("a", 5, 10, 60, None).await.unwrap();

        assert_eq!(coordinator.sync_now().await, DrainOutcome::Offline);
        assert!(remote.calls.lock().is_empty());
        assert_eq!(coordinator.queue().len().await, 1);
    }

    #[tokio::test]
    async fn test_success_removes_and_notifies() {
        let remote = Arc::new(InMemoryMissionStore::new());
        let (notifier, coordinator) = coordinator(remote.clone(), true).await;
        coordinator.enqueue_pending_result("a", 9, 10, 60, None).await.unwrap();

        let outcome = coordinator.sync_now().await;
        let report = outcome.report().unwrap();
        assert_eq!((report.total, report.succeeded, report.failed), (1, 1, 0));
        assert!(coordinator.queue().is_empty().await);
        assert_eq!(remote.get("a").unwrap().stars_earned, 3);

        assert_eq!(
            notifier.events(),
            vec![
                SyncNotification::SyncStarted { count: 1 },
                SyncNotification::SyncFinished { succeeded: 1, failed: 0 },
            ]
        );
        assert_eq!(coordinator.stats().await.drains_completed, 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_entry_without_retry() {
        let remote = Arc::new(ScriptedRemote::default());
        remote.failing.lock().insert("b".into());
        let (_notifier, coordinator) = coordinator(remote.clone(), true).await;
        for id in ["a", "b", "c"] {
            coordinator.enqueue_pending_result(id, 8, 10, 60, None).await.unwrap();
        }

        let report = coordinator.sync_now().await.report().cloned().unwrap();
        assert_eq!((report.succeeded, report.failed), (2, 1));
        assert_eq!(*remote.calls.lock(), vec!["a", "b", "c"]);

        let left: Vec<_> = coordinator.queue().list().await.into_iter().map(|e| e.mission_id).collect();
        assert_eq!(left, vec!["b"]);
    }

    #[tokio::test]
    async fn test_expired_entry_dropped_without_remote_call() {
        let remote = Arc::new(ScriptedRemote::default());
        let (_notifier, coordinator) = coordinator(remote.clone(), true).await;
        let stale = PendingMissionResult::completed_at(
            "stale",
            results(10),
            Utc::now() - chrono::Duration::hours(25),
        );
        coordinator.queue().enqueue(stale).await.unwrap();
        coordinator.enqueue_pending_result("fresh", 7, 10, 60, None).await.unwrap();

        let report = coordinator.sync_now().await.report().cloned().unwrap();
        assert_eq!(report.expired, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.attempted(), 1);
        assert_eq!(*remote.calls.lock(), vec!["fresh"]);
        assert!(coordinator.queue().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_replaced_mid_drain_is_kept() {
        let remote = Arc::new(ScriptedRemote {
            latency: Duration::from_millis(100),
            ..Default::default()
        });
        let (_notifier, coordinator) = coordinator(remote.clone(), true).await;
        let coordinator = Arc::new(coordinator);
        coordinator.enqueue_pending_result("fresh", 9, 10, 60, None).await.unwrap();
        let stale = PendingMissionResult::completed_at(
            "retaken",
            results(3),
            Utc::now() - chrono::Duration::hours(30),
        );
        coordinator.queue().enqueue(stale).await.unwrap();

        let draining = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.sync_now().await })
        };

        // Learner retakes the mission while "fresh" is in flight
        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.enqueue_pending_result("retaken", 10, 10, 60, None).await.unwrap();

        let report = draining.await.unwrap().report().cloned().unwrap();
        assert_eq!(report.expired, 0);
        assert_eq!(report.succeeded, 1);
        assert_eq!(*remote.calls.lock(), vec!["fresh"]);

        let queued = coordinator.queue().list().await;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].mission_id, "retaken");
        assert_eq!(queued[0].results.correct_answers, 10);
    }

    #[tokio::test]
    async fn test_guard_resets_state_after_drain() {
        let (_notifier, coordinator) = coordinator(Arc::new(InMemoryMissionStore::new()), true).await;
        let mut state_rx = coordinator.state_receiver();
        coordinator.enqueue_pending_result("a", 9, 10, 60, None).await.unwrap();

        coordinator.sync_now().await;

        assert!(state_rx.has_changed().unwrap());
        assert_eq!(*state_rx.borrow_and_update(), SyncState::Idle);
        assert!(!coordinator.is_draining());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_item_pause_paces_remote_calls() {
        let remote = Arc::new(InMemoryMissionStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let config = SyncConfig { inter_item_delay_ms: 500, ..Default::default() };
        let queue = PendingQueueStore::open(Arc::new(MemoryStore::new()), DEFAULT_QUEUE_KEY, config.expiry())
            .await
            .unwrap();
        let monitor = NetworkStatusMonitor::new(true, config.recovery_window(), notifier.clone());
        let coordinator = SyncCoordinator::new(config, Arc::new(queue), remote, Arc::new(monitor), notifier);
        for id in ["a", "b", "c"] {
            coordinator.enqueue_pending_result(id, 9, 10, 60, None).await.unwrap();
        }

        let started = tokio::time::Instant::now();
        coordinator.sync_now().await;

        // Two pauses between three calls, none after the last
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000) && elapsed < Duration::from_millis(1500));
    }
}
