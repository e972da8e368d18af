// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Directory-backed store used by operator tooling. Each blob is a plain
//! file named after its lower-cased blob name, with a `<name>.meta.json`
//! sidecar recording the upload time.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::StoreResult;
use crate::normalized_name;
use crate::store::{BlobMetadata, SrsBlob, SrsStore};

const META_SUFFIX: &str = ".meta.json";

pub struct DirSrsStore {
    root: PathBuf,
}

impl DirSrsStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn payload_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}{META_SUFFIX}"))
    }

    /// Upload time from the sidecar, or the payload's mtime for blobs that
    /// were dropped into the directory by hand.
    async fn recorded_upload_time(&self, key: &str) -> StoreResult<DateTime<Utc>> {
        match tokio::fs::read(self.sidecar_path(key)).await {
            Ok(raw) => Ok(serde_json::from_slice::<BlobMetadata>(&raw)?.uploaded_at),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let modified = tokio::fs::metadata(self.payload_path(key)).await?.modified()?;
                Ok(modified.into())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl SrsStore for DirSrsStore {
    async fn put(&self, blob: SrsBlob) -> StoreResult<()> {
        let key = normalized_name(&blob.name)?;
        debug!(
            operation = "srs_put",
            name = %key,
            size = %blob.size(),
            root = %self.root.display(),
            "storing blob"
        );
        tokio::fs::write(self.payload_path(&key), &blob.content).await?;

        let meta = BlobMetadata {
            name: key.clone(),
            size: blob.size(),
            uploaded_at: blob.uploaded_at,
        };
        tokio::fs::write(self.sidecar_path(&key), serde_json::to_vec_pretty(&meta)?).await?;
        Ok(())
    }

    async fn get(&self, name: &str) -> StoreResult<Option<SrsBlob>> {
        let key = normalized_name(name)?;
        let content = match tokio::fs::read(self.payload_path(&key)).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let uploaded_at = self.recorded_upload_time(&key).await?;
        Ok(Some(SrsBlob {
            name: key,
            content: content.into(),
            uploaded_at,
        }))
    }

    async fn delete(&self, name: &str) -> StoreResult<bool> {
        let key = normalized_name(name)?;
        match tokio::fs::remove_file(self.payload_path(&key)).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err.into()),
        }
        match tokio::fs::remove_file(self.sidecar_path(&key)).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(true)
    }

    async fn list(&self) -> StoreResult<Vec<BlobMetadata>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name();
            let name = match file_name.to_str() {
                Some(name) => name.to_string(),
                None => continue,
            };
            if name.ends_with(META_SUFFIX) || !entry.file_type().await?.is_file() {
                continue;
            }
            entries.push(BlobMetadata {
                size: entry.metadata().await?.len(),
                uploaded_at: self.recorded_upload_time(&name).await?,
                name,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn contains(&self, name: &str) -> StoreResult<bool> {
        let key = normalized_name(name)?;
        Ok(tokio::fs::try_exists(self.payload_path(&key)).await?)
    }
}
