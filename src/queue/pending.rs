// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pending mission result data structure.
//!
//! A [`PendingMissionResult`] is one completed mission that has not yet been
//! acknowledged by the remote store. It is the unit the queue persists and
//! the coordinator drains.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw outcome of a mission as reported by the game layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionResults {
    pub correct_answers: u32,
    pub total_questions: u32,
    pub time_spent_seconds: u32,
    /// Per-question detail from the game, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_attempts: Option<Value>,
}

/// One unsynced completion event, keyed by `mission_id`.
///
/// # Example
///
/// ```
/// use mission_sync::{MissionResults, PendingMissionResult};
///
/// let entry = PendingMissionResult::new(
///     "mission-42",
///     MissionResults {
///         correct_answers: 8,
///         total_questions: 10,
///         time_spent_seconds: 95,
///         question_attempts: None,
///     },
/// );
///
/// assert_eq!(entry.mission_id, "mission-42");
/// assert!(!entry.is_expired_at(entry.created_at, chrono::Duration::hours(24)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMissionResult {
    pub mission_id: String,
    pub results: MissionResults,
    /// When the mission was completed. Drives FIFO order and expiry.
    pub created_at: DateTime<Utc>,
}

impl PendingMissionResult {
    /// Create an entry stamped with the current time.
    pub fn new(mission_id: impl Into<String>, results: MissionResults) -> Self {
        Self::completed_at(mission_id, results, Utc::now())
    }

    /// Create an entry with an explicit completion time (restores, tests).
    pub fn completed_at(
        mission_id: impl Into<String>,
        results: MissionResults,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            mission_id: mission_id.into(),
            results,
            created_at,
        }
    }

    /// Whether this entry is older than `ttl` at `now`.
    ///
    /// Strictly greater: an entry exactly `ttl` old is still live.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.created_at) > ttl
    }
}
