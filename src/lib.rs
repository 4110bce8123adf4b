// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Mission Sync
//!
//! Offline-capable sync of completed mission results.
//!
//! A learner finishes a mission with or without connectivity. The result is
//! persisted locally first, then pushed to the remote mission store whenever
//! the device is online.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Enqueue                              │
//! │  • enqueue_pending_result() persists before returning      │
//! │  • Latest result per mission wins, moved to the tail       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   PendingQueueStore                         │
//! │  • Ordered JSON list under one key                         │
//! │  • SQLite (WAL journal) or in-memory backend               │
//! │  • Entries older than 24 h are dropped unsynced            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          (online transition, 30 s tick, manual request)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SyncCoordinator                          │
//! │  • One drain at a time (in-flight flag)                    │
//! │  • FIFO, paced, evaluates stars per entry                  │
//! │  • Failed entries stay queued for the next drain           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  RemoteMissionStore                         │
//! │  • update_completion(mission_id, payload)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mission_sync::{InMemoryMissionStore, SyncConfig, SyncCoordinator, TracingNotifier};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mission_sync::StorageError> {
//!     let config = SyncConfig {
//!         db_path: Some("./mission_sync.db".into()),
//!         ..Default::default()
//!     };
//!
//!     let coordinator = SyncCoordinator::init(
//!         config,
//!         Arc::new(InMemoryMissionStore::new()),
//!         Arc::new(TracingNotifier),
//!         false,
//!     )
//!     .await?;
//!     let handle = coordinator.start();
//!
//!     // Finished offline: persisted, not sent
//!     coordinator.enqueue_pending_result("mission-42", 9, 10, 300, None).await?;
//!
//!     // Platform reports connectivity: the run loop drains on its own
//!     coordinator.handle_connectivity(true);
//!
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`evaluator`]: Stars and pass/fail from raw counts
//! - [`queue`]: Pending results and their durable queue
//! - [`storage`]: Key/value backends (SQLite, memory)
//! - [`network`]: Connectivity tracking and the recovery window
//! - [`coordinator`]: The drain state machine and its run loop
//! - [`remote`]: The remote mission store contract
//! - [`notify`]: User-facing sync notifications
//! - [`resilience`]: Retry for local startup

pub mod config;
pub mod evaluator;
pub mod queue;
pub mod storage;
pub mod resilience;
pub mod network;
pub mod notify;
pub mod remote;
pub mod coordinator;
pub mod metrics;

pub use config::SyncConfig;
pub use coordinator::{CoordinatorHandle, CoordinatorStats, DrainOutcome, SyncCoordinator, SyncReport, SyncState};
pub use evaluator::{evaluate, Grade};
pub use queue::{MissionResults, PendingMissionResult, PendingQueueStore};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore, StorageError};
pub use remote::{CompletionPayload, InMemoryMissionStore, RemoteError, RemoteMissionStore};
pub use notify::{BroadcastNotifier, Notifier, RecordingNotifier, SyncNotification, TracingNotifier};
pub use network::{NetworkState, NetworkStatusMonitor, Transition};
pub use resilience::retry::RetryConfig;
