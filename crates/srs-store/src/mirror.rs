// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Pulls missing SRS blobs from a distribution mirror into a local store.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{StoreError, StoreResult};
use crate::store::{SrsBlob, SrsStore};
use crate::REQUIRED_SRS_NAMES;

/// Remote end a mirror pulls payloads from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteSrsSource: Send + Sync {
    async fn fetch(&self, name: &str) -> StoreResult<Bytes>;
}

/// HTTP distribution point. Blobs live under `srs/` with upper-case names,
/// matching how the proving hosts lay them out on their virtual disk.
pub struct HttpSrsSource {
    base: Url,
    client: reqwest::Client,
}

impl HttpSrsSource {
    pub fn new(mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Self {
            base,
            client: reqwest::Client::new(),
        }
    }

    fn blob_url(&self, name: &str) -> StoreResult<Url> {
        Ok(self.base.join(&format!("srs/{}", name.to_uppercase()))?)
    }
}

#[async_trait]
impl RemoteSrsSource for HttpSrsSource {
    async fn fetch(&self, name: &str) -> StoreResult<Bytes> {
        let url = self.blob_url(name)?;
        debug!(operation = "srs_mirror_fetch", url = %url, "requesting blob");
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(StoreError::HttpStatus(
                response.status().as_u16(),
                url.to_string(),
            ));
        }
        Ok(response.bytes().await?)
    }
}

#[derive(Debug)]
pub struct MirrorOutcome {
    pub name: String,
    pub outcome: StoreResult<u64>,
}

/// Fills a store with the required blobs it does not yet hold.
pub struct SrsMirror<S: SrsStore> {
    store: S,
    source: Box<dyn RemoteSrsSource>,
}

impl<S: SrsStore> SrsMirror<S> {
    pub fn new(store: S, source: Box<dyn RemoteSrsSource>) -> Self {
        Self { store, source }
    }

    pub fn over_http(store: S, base: Url) -> Self {
        Self::new(store, Box::new(HttpSrsSource::new(base)))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Download each required blob the store is missing. One failed
    /// download is reported in its outcome and does not stop the others.
    pub async fn sync_missing(&self) -> StoreResult<Vec<MirrorOutcome>> {
        let mut outcomes = Vec::new();
        for name in REQUIRED_SRS_NAMES {
            if self.store.contains(name).await? {
                continue;
            }
            let outcome = self.pull(name).await;
            if let Err(err) = &outcome {
                warn!(operation = "srs_mirror_pull", name = %name, error = %err, "download failed");
            }
            outcomes.push(MirrorOutcome {
                name: name.to_string(),
                outcome,
            });
        }
        Ok(outcomes)
    }

    async fn pull(&self, name: &str) -> StoreResult<u64> {
        let content = self.source.fetch(name).await?;
        let size = content.len() as u64;
        info!(operation = "srs_mirror_pull", name = %name, size = %size, "fetched blob");
        self.store.put(SrsBlob::new(name, content)).await?;
        Ok(size)
    }
}
