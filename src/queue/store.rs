// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Durable FIFO of mission results waiting for the remote store.
//!
//! The whole queue is serialized as one JSON array under a single key of a
//! [`KeyValueStore`]. Every mutation builds the next queue on a copy,
//! persists it, and only then swaps it into memory, so a failed write leaves
//! the in-memory queue equal to what is on disk.
//!
//! All mutations hold one async mutex for the full copy/persist/swap step.
//! Readers take a snapshot and release the lock immediately; the coordinator
//! never holds it across a remote call.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::pending::{MissionResults, PendingMissionResult};
use crate::storage::traits::{KeyValueStore, StorageError};

/// Well-known key the queue is stored under.
pub const DEFAULT_QUEUE_KEY: &str = "pending_mission_results";

pub struct PendingQueueStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    ttl: Duration,
    entries: Mutex<Vec<PendingMissionResult>>,
}

impl PendingQueueStore {
    /// Load the queue persisted under `key`.
    ///
    /// A missing key is an empty queue. A value that does not parse is
    /// logged and also treated as empty; it gets overwritten by the next
    /// successful mutation. Backend read errors are returned.
    pub async fn open(
        backend: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        ttl: Duration,
    ) -> Result<Self, StorageError> {
        let key = key.into();
        let entries = match backend.get(&key).await? {
            Some(raw) => decode_queue(&key, &raw),
            None => Vec::new(),
        };

        if !entries.is_empty() {
            info!(key = %key, pending = entries.len(), "Restored pending mission results");
        }
        crate::metrics::set_queue_depth(entries.len());

        Ok(Self {
            backend,
            key,
            ttl,
            entries: Mutex::new(entries),
        })
    }

    /// Insert `entry`, replacing any queued result for the same mission.
    ///
    /// The replacement goes to the tail: latest payload wins and the queue
    /// position reflects the latest enqueue.
    pub async fn enqueue(&self, entry: PendingMissionResult) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;

        let mut next = entries.clone();
        let before = next.len();
        next.retain(|e| e.mission_id != entry.mission_id);
        let replaced = next.len() != before;
        let mission_id = entry.mission_id.clone();
        next.push(entry);

        self.persist(&next).await?;
        *entries = next;

        debug!(mission_id = %mission_id, replaced, pending = entries.len(), "Mission result queued");
        crate::metrics::record_enqueued(replaced);
        crate::metrics::set_queue_depth(entries.len());
        Ok(())
    }

    /// Queue a freshly completed mission, stamped with the current time.
    pub async fn enqueue_pending_result(
        &self,
        mission_id: &str,
        correct_answers: u32,
        total_questions: u32,
        time_spent_seconds: u32,
        question_attempts: Option<Value>,
    ) -> Result<(), StorageError> {
        let results = MissionResults {
            correct_answers,
            total_questions,
            time_spent_seconds,
            question_attempts,
        };
        self.enqueue(PendingMissionResult::new(mission_id, results)).await
    }

    /// Snapshot of the queue in FIFO order.
    pub async fn list(&self) -> Vec<PendingMissionResult> {
        self.entries.lock().await.clone()
    }

    /// Drop the entry for `mission_id`. Returns `false` if it was not queued.
    pub async fn remove(&self, mission_id: &str) -> Result<bool, StorageError> {
        let mut entries = self.entries.lock().await;

        if !entries.iter().any(|e| e.mission_id == mission_id) {
            return Ok(false);
        }

        let next: Vec<_> = entries
            .iter()
            .filter(|e| e.mission_id != mission_id)
            .cloned()
            .collect();

        self.persist(&next).await?;
        *entries = next;

        crate::metrics::set_queue_depth(entries.len());
        Ok(true)
    }

    /// Drop `entry` only if the queue still holds exactly this entry.
    ///
    /// Used after a successful sync: if the mission was re-enqueued with a
    /// newer result while the old one was in flight, the newer one stays.
    pub async fn remove_entry(&self, entry: &PendingMissionResult) -> Result<bool, StorageError> {
        let mut entries = self.entries.lock().await;

        let Some(position) = entries.iter().position(|e| e == entry) else {
            return Ok(false);
        };

        let mut next = entries.clone();
        next.remove(position);

        self.persist(&next).await?;
        *entries = next;

        crate::metrics::set_queue_depth(entries.len());
        Ok(true)
    }

    /// Whether `entry` is past the retention window at `now`.
    #[must_use]
    pub fn is_expired(&self, entry: &PendingMissionResult, now: DateTime<Utc>) -> bool {
        entry.is_expired_at(now, self.ttl)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write `next` to the backend. An empty queue deletes the key.
    async fn persist(&self, next: &[PendingMissionResult]) -> Result<(), StorageError> {
        let written = if next.is_empty() {
            self.backend.delete(&self.key).await
        } else {
            let encoded = encode_queue(next)?;
            self.backend.put(&self.key, &encoded).await
        };
        if let Err(e) = written {
            warn!(key = %self.key, error = %e, "Failed to persist pending queue");
            crate::metrics::record_persist_error();
            return Err(e);
        }
        Ok(())
    }
}

/// Serialize a queue to its persisted JSON form.
pub fn encode_queue(entries: &[PendingMissionResult]) -> Result<String, StorageError> {
    Ok(serde_json::to_string(entries)?)
}

/// Parse a persisted queue, falling back to empty on corruption.
///
/// Duplicate mission ids (from a hand-edited or foreign blob) are collapsed
/// to the last occurrence so the one-entry-per-mission invariant holds.
pub fn decode_queue(key: &str, raw: &str) -> Vec<PendingMissionResult> {
    match serde_json::from_str::<Vec<PendingMissionResult>>(raw) {
        Ok(mut entries) => {
            let mut seen = std::collections::HashSet::new();
            let before = entries.len();
            entries.reverse();
            entries.retain(|e| seen.insert(e.mission_id.clone()));
            entries.reverse();
            if entries.len() != before {
                warn!(key, dropped = before - entries.len(), "Collapsed duplicate mission ids in persisted queue");
            }
            entries
        }
        Err(e) => {
            error!(key, error = %e, bytes = raw.len(), "Persisted queue is corrupt, starting empty");
            crate::metrics::record_corrupt_queue();
            Vec::new()
        }
    }
}
