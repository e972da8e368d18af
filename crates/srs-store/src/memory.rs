// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StoreResult;
use crate::normalized_name;
use crate::store::{BlobMetadata, SrsBlob, SrsStore};

/// Process-local store. The production bridge embeds one of these per host;
/// nothing outlives the process.
#[derive(Default)]
pub struct MemorySrsStore {
    blobs: Mutex<HashMap<String, SrsBlob>>,
}

impl MemorySrsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SrsStore for MemorySrsStore {
    async fn put(&self, blob: SrsBlob) -> StoreResult<()> {
        let key = normalized_name(&blob.name)?;
        debug!(operation = "srs_put", name = %key, size = %blob.size(), "storing blob");
        let mut blob = blob;
        blob.name = key.clone();
        self.blobs.lock().await.insert(key, blob);
        Ok(())
    }

    async fn get(&self, name: &str) -> StoreResult<Option<SrsBlob>> {
        let key = normalized_name(name)?;
        Ok(self.blobs.lock().await.get(&key).cloned())
    }

    async fn delete(&self, name: &str) -> StoreResult<bool> {
        let key = normalized_name(name)?;
        Ok(self.blobs.lock().await.remove(&key).is_some())
    }

    async fn list(&self) -> StoreResult<Vec<BlobMetadata>> {
        let blobs = self.blobs.lock().await;
        let mut entries: Vec<BlobMetadata> = blobs.values().map(BlobMetadata::of).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn contains(&self, name: &str) -> StoreResult<bool> {
        let key = normalized_name(name)?;
        Ok(self.blobs.lock().await.contains_key(&key))
    }
}
