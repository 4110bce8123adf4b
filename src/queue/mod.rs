// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pending mission results and the durable queue that holds them.

pub mod pending;
pub mod store;

pub use pending::{MissionResults, PendingMissionResult};
pub use store::{decode_queue, encode_queue, PendingQueueStore, DEFAULT_QUEUE_KEY};
