// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Failed to encode pending queue: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable string key/value storage.
///
/// The pending queue lives under a single well-known key, so backends only
/// need whole-value reads and writes. `put` must not return `Ok` until the
/// value is durable; the queue relies on that to keep memory and disk in step.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}
