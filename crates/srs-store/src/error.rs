// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("'{0}' is not a valid SRS blob name")]
    InvalidName(String),

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob metadata is unreadable: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("mirror request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mirror answered HTTP {0} for {1}")]
    HttpStatus(u16, String),

    #[error("mirror URL is invalid: {0}")]
    Url(#[from] url::ParseError),
}
