// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync coordinator.
//!
//! The [`SyncCoordinator`] ties the pending queue, the connectivity monitor,
//! the remote store and the notifier together and owns the drain state
//! machine:
//!
//! ```text
//!          online transition │ 30 s tick (queue non-empty) │ manual
//!                            ▼
//!   Idle ──(in-flight flag swap succeeds)──▶ Draining ──(snapshot done)──▶ Idle
//!     ▲                                          │
//!     └──── concurrent trigger: AlreadyRunning ◀─┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mission_sync::{SyncConfig, SyncCoordinator, InMemoryMissionStore, TracingNotifier};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), mission_sync::StorageError> {
//! let coordinator = SyncCoordinator::init(
//!     SyncConfig::default(),
//!     Arc::new(InMemoryMissionStore::new()),
//!     Arc::new(TracingNotifier),
//!     true,
//! )
//! .await?;
//!
//! let handle = coordinator.start();
//! coordinator.enqueue_pending_result("mission-1", 9, 10, 120, None).await?;
//! handle.request_sync();
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod types;
mod drain;
mod lifecycle;

pub use types::{CoordinatorStats, DrainOutcome, SyncReport, SyncState};
pub use lifecycle::CoordinatorHandle;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::network::{NetworkStatusMonitor, Transition};
use crate::notify::Notifier;
use crate::queue::PendingQueueStore;
use crate::remote::RemoteMissionStore;
use crate::storage::{KeyValueStore, MemoryStore, SqliteStore, StorageError};

/// Drains queued mission results to the remote store, one drain at a time.
///
/// Every piece of mutable state lives on the instance, so independent
/// coordinators can run side by side (tests do this constantly).
pub struct SyncCoordinator {
    pub(super) config: SyncConfig,
    pub(super) queue: Arc<PendingQueueStore>,
    pub(super) remote: Arc<dyn RemoteMissionStore>,
    pub(super) monitor: Arc<NetworkStatusMonitor>,
    pub(super) notifier: Arc<dyn Notifier>,

    /// Single-flight flag, swapped before any drain work starts
    pub(super) in_flight: AtomicBool,

    /// Sync state (broadcast to watchers)
    pub(super) state: watch::Sender<SyncState>,

    /// Set by shutdown; a drain stops before its next entry
    pub(super) stopping: watch::Sender<bool>,

    pub(super) drains_completed: AtomicU64,
    pub(super) last_report: RwLock<Option<SyncReport>>,
}

impl SyncCoordinator {
    /// Assemble a coordinator from already-built parts.
    pub fn new(
        config: SyncConfig,
        queue: Arc<PendingQueueStore>,
        remote: Arc<dyn RemoteMissionStore>,
        monitor: Arc<NetworkStatusMonitor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        let (stopping, _) = watch::channel(false);

        Self {
            config,
            queue,
            remote,
            monitor,
            notifier,
            in_flight: AtomicBool::new(false),
            state,
            stopping,
            drains_completed: AtomicU64::new(0),
            last_report: RwLock::new(None),
        }
    }

    /// Build every local component from `config`.
    ///
    /// Opens the SQLite queue at `config.db_path` (or an in-memory queue when
    /// unset), restores pending results, and creates the connectivity monitor
    /// from the platform's current reading.
    #[tracing::instrument(skip(config, remote, notifier), fields(db_path = ?config.db_path))]
    pub async fn init(
        config: SyncConfig,
        remote: Arc<dyn RemoteMissionStore>,
        notifier: Arc<dyn Notifier>,
        initially_online: bool,
    ) -> Result<Arc<Self>, StorageError> {
        let backend: Arc<dyn KeyValueStore> = match config.db_path {
            Some(ref path) => Arc::new(SqliteStore::open(path).await?),
            None => {
                warn!("No db_path configured - pending results will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        let queue = PendingQueueStore::open(backend, config.queue_key.clone(), config.expiry()).await?;
        let monitor = NetworkStatusMonitor::new(initially_online, config.recovery_window(), notifier.clone());

        info!(
            pending = queue.len().await,
            online = initially_online,
            "Sync coordinator initialized"
        );

        Ok(Arc::new(Self::new(
            config,
            Arc::new(queue),
            remote,
            Arc::new(monitor),
            notifier,
        )))
    }

    /// Get current sync state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub(super) fn stop_requested(&self) -> bool {
        *self.stopping.borrow()
    }

    pub fn queue(&self) -> &Arc<PendingQueueStore> {
        &self.queue
    }

    pub fn monitor(&self) -> &Arc<NetworkStatusMonitor> {
        &self.monitor
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Queue a completed mission. Persists before returning; never waits on
    /// the network.
    pub async fn enqueue_pending_result(
        &self,
        mission_id: &str,
        correct_answers: u32,
        total_questions: u32,
        time_spent_seconds: u32,
        question_attempts: Option<Value>,
    ) -> Result<(), StorageError> {
        self.queue
            .enqueue_pending_result(
                mission_id,
                correct_answers,
                total_questions,
                time_spent_seconds,
                question_attempts,
            )
            .await
    }

    /// Forward a platform connectivity reading to the monitor.
    ///
    /// A running coordinator reacts to the resulting online transition on
    /// its own; this does not drain inline.
    pub fn handle_connectivity(&self, online: bool) -> Transition {
        self.monitor.handle_connectivity(online)
    }

    #[must_use]
    pub fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().clone()
    }

    pub async fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            state: self.state(),
            online: self.monitor.is_online(),
            queue_depth: self.queue.len().await,
            drains_completed: self.drains_completed.load(Ordering::Relaxed),
            last_report: self.last_report(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::remote::InMemoryMissionStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_init_in_memory_starts_idle() {
        let coordinator = SyncCoordinator::init(
            SyncConfig::default(),
            Arc::new(InMemoryMissionStore::new()),
            Arc::new(RecordingNotifier::new()),
            true,
        )
        .await
        .unwrap();

        assert_eq!(coordinator.state(), SyncState::Idle);
        assert!(!coordinator.is_draining());

        let stats = coordinator.stats().await;
        assert_eq!(stats.queue_depth, 0);
        assert!(stats.online);
        assert_eq!(stats.drains_completed, 0);
        assert!(stats.last_report.is_none());
    }

    #[tokio::test]
    async fn test_init_restores_sqlite_queue() {
        let dir = tempdir().unwrap();
        let config = SyncConfig {
            db_path: Some(dir.path().join("queue.db").to_string_lossy().to_string()),
            ..Default::default()
        };

        {
            let coordinator = SyncCoordinator::init(
                config.clone(),
                Arc::new(InMemoryMissionStore::new()),
                Arc::new(RecordingNotifier::new()),
                false,
            )
            .await
            .unwrap();
            coordinator.enqueue_pending_result("m-1", 5, 10, 60, None).await.unwrap();
            coordinator.enqueue_pending_result("m-2", 6, 10, 60, None).await.unwrap();
        }

        let coordinator = SyncCoordinator::init(
            config,
            Arc::new(InMemoryMissionStore::new()),
            Arc::new(RecordingNotifier::new()),
            false,
        )
        .await
        .unwrap();
        let ids: Vec<_> = coordinator.queue().list().await.into_iter().map(|e| e.mission_id).collect();
        assert_eq!(ids, vec!["m-1", "m-2"]);
    }

    #[tokio::test]
    async fn test_starting_offline_notifies() {
        let notifier = Arc::new(RecordingNotifier::new());
        let _coordinator = SyncCoordinator::init(
            SyncConfig::default(),
            Arc::new(InMemoryMissionStore::new()),
            notifier.clone(),
            false,
        )
        .await
        .unwrap();

        assert_eq!(notifier.count(&crate::notify::SyncNotification::WentOffline), 1);
    }
}
