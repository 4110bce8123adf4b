// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the sync coordinator.

use std::time::Duration;

/// Coordinator state.
///
/// Use [`super::SyncCoordinator::state()`] to check current state or
/// [`super::SyncCoordinator::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No drain running
    Idle,
    /// A drain owns the in-flight flag
    Draining,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Draining => write!(f, "Draining"),
        }
    }
}

/// Counters for one drain, returned when it ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries in the drain's snapshot
    pub total: usize,
    /// Remote updates acknowledged
    pub succeeded: usize,
    /// Remote updates that failed; still queued
    pub failed: usize,
    /// Dropped for age without a remote call
    pub expired: usize,
    pub duration: Duration,
}

impl SyncReport {
    /// Check if every attempted update succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Remote calls made
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Result of asking the coordinator to drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// A drain ran over a non-empty snapshot
    Completed(SyncReport),
    /// Nothing was queued
    Empty,
    /// Another drain holds the in-flight flag; this request did nothing
    AlreadyRunning,
    /// Connectivity is down; the queue was not touched
    Offline,
}

impl DrainOutcome {
    pub(super) fn metric_label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Empty => "empty",
            Self::AlreadyRunning => "already_running",
            Self::Offline => "offline",
        }
    }

    #[must_use]
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Point-in-time view for status screens and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub state: SyncState,
    pub online: bool,
    pub queue_depth: usize,
    pub drains_completed: u64,
    pub last_report: Option<SyncReport>,
}

/// Mutable counters for the drain in progress.
#[derive(Debug, Default)]
pub(super) struct SyncSession {
    pub succeeded: usize,
    pub failed: usize,
    pub expired: usize,
}

impl SyncSession {
    pub fn finish(self, total: usize, duration: Duration) -> SyncReport {
        SyncReport {
            total,
            succeeded: self.succeeded,
            failed: self.failed,
            expired: self.expired,
            duration,
        }
    }
}
