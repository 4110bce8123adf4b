// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for mission-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for installing an exporter.
//!
//! # Metric Naming Convention
//! - `mission_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `outcome`: completed, empty, already_running, offline (drains)
//! - `status`: success, failure, expired (per result)

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a result accepted into the pending queue
pub fn record_enqueued(replaced: bool) {
    counter!(
        "mission_sync_enqueued_total",
        "replaced" => if replaced { "true" } else { "false" }
    )
    .increment(1);
}

/// Record the outcome of syncing one queued result
pub fn record_result(status: &'static str) {
    counter!("mission_sync_results_total", "status" => status).increment(1);
}

/// Record a drain attempt and how it ended
pub fn record_drain(outcome: &'static str) {
    counter!("mission_sync_drains_total", "outcome" => outcome).increment(1);
}

/// Record how long a non-empty drain took
pub fn record_drain_duration(duration: Duration) {
    histogram!("mission_sync_drain_seconds").record(duration.as_secs_f64());
}

/// Record one remote update call latency
pub fn record_remote_latency(duration: Duration) {
    histogram!("mission_sync_remote_update_seconds").record(duration.as_secs_f64());
}

/// Set current pending queue depth
pub fn set_queue_depth(depth: usize) {
    gauge!("mission_sync_queue_depth").set(depth as f64);
}

/// Record a failed write of the pending queue
pub fn record_persist_error() {
    counter!("mission_sync_persist_errors_total").increment(1);
}

/// Record a persisted queue that failed to parse on load
pub fn record_corrupt_queue() {
    counter!("mission_sync_corrupt_queue_total").increment(1);
}

/// Set connectivity (1 = online, 0 = offline)
pub fn set_online(online: bool) {
    gauge!("mission_sync_online").set(if online { 1.0 } else { 0.0 });
}

/// Record a connectivity transition ("online" / "offline")
pub fn record_connectivity_transition(to: &'static str) {
    counter!("mission_sync_connectivity_transitions_total", "to" => to).increment(1);
}

/// Set coordinator sync state (0 = Idle, 1 = Draining)
pub fn set_sync_state(draining: bool) {
    gauge!("mission_sync_draining").set(if draining { 1.0 } else { 0.0 });
}
