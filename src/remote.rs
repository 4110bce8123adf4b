// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Remote mission store contract.
//!
//! The backend owns mission records; this crate only needs one idempotent
//! upsert keyed by mission id. Delivery is at-least-once, so applying the
//! same update twice must leave the record as if it was applied once.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::evaluator::Grade;
use crate::queue::PendingMissionResult;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Remote rejected update: {0}")]
    Rejected(String),
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

/// Body of a completion update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionPayload {
    /// Always `"completed"`
    pub status: &'static str,
    pub completed_questions: u32,
    pub correct_answers: u32,
    pub time_spent: u32,
    pub stars_earned: u8,
    /// RFC 3339, UTC
    pub completed_at: String,
    pub question_attempts: Option<Value>,
}

impl CompletionPayload {
    pub const STATUS_COMPLETED: &'static str = "completed";

    /// Build the payload for a queued entry and its grade.
    ///
    /// `completed_at` is the original completion time, not the sync time.
    #[must_use]
    pub fn from_entry(entry: &PendingMissionResult, grade: &Grade) -> Self {
        Self {
            status: Self::STATUS_COMPLETED,
            completed_questions: entry.results.total_questions,
            correct_answers: entry.results.correct_answers,
            time_spent: entry.results.time_spent_seconds,
            stars_earned: grade.stars,
            completed_at: format_timestamp(entry.created_at),
            question_attempts: entry.results.question_attempts.clone(),
        }
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
pub trait RemoteMissionStore: Send + Sync {
    /// Upsert the completion for `mission_id`. Must be idempotent.
    async fn update_completion(
        &self,
        mission_id: &str,
        payload: &CompletionPayload,
    ) -> Result<(), RemoteError>;
}

/// Reference store keeping the last payload per mission.
pub struct InMemoryMissionStore {
    records: DashMap<String, CompletionPayload>,
}

impl InMemoryMissionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, mission_id: &str) -> Option<CompletionPayload> {
        self.records.get(mission_id).map(|r| r.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for InMemoryMissionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteMissionStore for InMemoryMissionStore {
    async fn update_completion(
        &self,
        mission_id: &str,
        payload: &CompletionPayload,
    ) -> Result<(), RemoteError> {
        self.records.insert(mission_id.to_string(), payload.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::queue::MissionResults;
    use serde_json::json;

    fn entry() -> PendingMissionResult {
        let created = DateTime::parse_from_rfc3339("2026-05-04T08:15:30.250Z")
            .unwrap()
            .with_timezone(&Utc);
        PendingMissionResult::completed_at(
            "mission-9",
            MissionResults {
                correct_answers: 9,
                total_questions: 10,
                time_spent_seconds: 200,
                question_attempts: Some(json!([{"q": 1}])),
            },
            created,
        )
    }

    #[test]
    fn test_payload_from_entry() {
        let entry = entry();
        let grade = evaluate(9, 10, 200);
        let payload = CompletionPayload::from_entry(&entry, &grade);

        assert_eq!(payload.status, "completed");
        assert_eq!(payload.completed_questions, 10);
        assert_eq!(payload.correct_answers, 9);
        assert_eq!(payload.time_spent, 200);
        assert_eq!(payload.stars_earned, 3);
        assert_eq!(payload.completed_at, "2026-05-04T08:15:30.250Z");
        assert_eq!(payload.question_attempts, Some(json!([{"q": 1}])));
    }

    #[test]
    fn test_payload_json_field_names() {
        let entry = entry();
        let payload = CompletionPayload::from_entry(&entry, &evaluate(9, 10, 200));
        let value = serde_json::to_value(&payload).unwrap();

        for field in [
            "status",
            "completed_questions",
            "correct_answers",
            "time_spent",
            "stars_earned",
            "completed_at",
            "question_attempts",
        ] {
            assert!(value.get(field).is_some(), "missing {}", field);
        }
    }

    #[tokio::test]
    async fn test_in_memory_store_is_idempotent() {
        let store = InMemoryMissionStore::new();
        let entry = entry();
        let payload = CompletionPayload::from_entry(&entry, &evaluate(9, 10, 200));

        store.update_completion("mission-9", &payload).await.unwrap();
        store.update_completion("mission-9", &payload).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("mission-9"), Some(payload));
    }
}
