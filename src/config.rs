// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the mission sync engine.
//!
//! # Example
//!
//! ```
//! use mission_sync::SyncConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SyncConfig::default();
//! assert_eq!(config.expiry_hours, 24);
//! assert_eq!(config.periodic_interval_secs, 30);
//!
//! // Persist to a file and pace the backend harder
//! let config = SyncConfig {
//!     db_path: Some("./mission_sync.db".into()),
//!     inter_item_delay_ms: 800,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;
use std::time::Duration;

/// Configuration for the sync engine.
///
/// All fields have defaults. Without `db_path` the queue is kept in memory
/// only and does not survive a restart.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// SQLite file for the pending queue
    #[serde(default)]
    pub db_path: Option<String>,

    /// Key the queue is stored under
    #[serde(default = "default_queue_key")]
    pub queue_key: String,

    /// Queued results older than this are dropped unsynced
    #[serde(default = "default_expiry_hours")]
    pub expiry_hours: u32,

    /// Reconciliation tick while online (0 = disabled)
    #[serde(default = "default_periodic_interval_secs")]
    pub periodic_interval_secs: u64,

    /// Pause between remote updates within one drain
    #[serde(default = "default_inter_item_delay_ms")]
    pub inter_item_delay_ms: u64,

    /// How long `recently_recovered` stays set after reconnecting
    #[serde(default = "default_recovery_window_secs")]
    pub recovery_window_secs: u64,
}

fn default_queue_key() -> String { crate::queue::DEFAULT_QUEUE_KEY.to_string() }
fn default_expiry_hours() -> u32 { 24 }
fn default_periodic_interval_secs() -> u64 { 30 }
fn default_inter_item_delay_ms() -> u64 { 500 }
fn default_recovery_window_secs() -> u64 { 5 }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            queue_key: default_queue_key(),
            expiry_hours: default_expiry_hours(),
            periodic_interval_secs: default_periodic_interval_secs(),
            inter_item_delay_ms: default_inter_item_delay_ms(),
            recovery_window_secs: default_recovery_window_secs(),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn expiry(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.expiry_hours))
    }

    /// `None` when periodic reconciliation is disabled.
    #[must_use]
    pub fn periodic_interval(&self) -> Option<Duration> {
        (self.periodic_interval_secs > 0).then(|| Duration::from_secs(self.periodic_interval_secs))
    }

    #[must_use]
    pub fn inter_item_delay(&self) -> Duration {
        Duration::from_millis(self.inter_item_delay_ms)
    }

    #[must_use]
    pub fn recovery_window(&self) -> Duration {
        Duration::from_secs(self.recovery_window_secs)
    }
}
