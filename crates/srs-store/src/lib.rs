// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Storage for the structured reference strings the proof engine consumes
//!
//! A proving host cannot start without its SRS parameter blobs. This crate
//! defines the [`SrsStore`] trait the host reads them through, an in-memory
//! implementation for tests and embedded use, a directory-backed
//! implementation for operator machines, and a mirror client that fills a
//! store from an HTTP distribution point.

pub mod dir;
pub mod error;
pub mod memory;
pub mod mirror;
pub mod store;

pub use dir::DirSrsStore;
pub use error::{StoreError, StoreResult};
pub use memory::MemorySrsStore;
pub use mirror::{HttpSrsSource, MirrorOutcome, RemoteSrsSource, SrsMirror};
pub use store::{BlobMetadata, SrsBlob, SrsStore};

/// Committer key parameters.
pub const SRS_CK_NAME: &str = "srs.ck.bin";

/// Lagrange key parameters, degree 9.
pub const SRS_LK_NAME: &str = "srs.lk.9.bin";

/// Blobs a proving host refuses to start without.
pub const REQUIRED_SRS_NAMES: [&str; 2] = [SRS_CK_NAME, SRS_LK_NAME];

/// True when `name` is one of the SRS blobs the proof engine expects.
/// Matching ignores case.
pub fn is_valid_srs_name(name: &str) -> bool {
    REQUIRED_SRS_NAMES
        .iter()
        .any(|required| required.eq_ignore_ascii_case(name))
}

/// A storable blob name: non-empty, free of path separators, and not a
/// directory shorthand.
fn is_storable_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

pub(crate) fn normalized_name(name: &str) -> StoreResult<String> {
    if !is_storable_name(name) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(name.to_ascii_lowercase())
}

/// Which of `names` the store cannot currently serve.
pub async fn missing_names(store: &dyn SrsStore, names: &[&str]) -> StoreResult<Vec<String>> {
    let mut missing = Vec::new();
    for name in names {
        if !store.contains(name).await? {
            missing.push((*name).to_string());
        }
    }
    Ok(missing)
}

/// Human-readable byte count, two decimals at most.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
