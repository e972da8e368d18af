// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// One SRS parameter blob. `content` is reference-counted, so cloning a
/// blob or handing its bytes to the host never copies the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrsBlob {
    pub name: String,
    pub content: Bytes,
    pub uploaded_at: DateTime<Utc>,
}

impl SrsBlob {
    pub fn new(name: impl Into<String>, content: Bytes) -> Self {
        Self {
            name: name.into(),
            content,
            uploaded_at: Utc::now(),
        }
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Listing record for a stored blob. Directory stores persist this next to
/// the payload as a JSON sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub name: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl BlobMetadata {
    pub fn of(blob: &SrsBlob) -> Self {
        Self {
            name: blob.name.clone(),
            size: blob.size(),
            uploaded_at: blob.uploaded_at,
        }
    }
}

/// Backing storage for SRS blobs. Names are matched case-insensitively;
/// implementations normalize them to lower case on write.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SrsStore: Send + Sync {
    async fn put(&self, blob: SrsBlob) -> StoreResult<()>;

    async fn get(&self, name: &str) -> StoreResult<Option<SrsBlob>>;

    /// Remove a blob. Reports whether anything was there to remove.
    async fn delete(&self, name: &str) -> StoreResult<bool>;

    /// Metadata for every stored blob, ordered by name.
    async fn list(&self) -> StoreResult<Vec<BlobMetadata>>;

    async fn contains(&self, name: &str) -> StoreResult<bool> {
        Ok(self.get(name).await?.is_some())
    }
}
