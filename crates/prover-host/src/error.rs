// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::time::Duration;

use thiserror::Error;

/// Why a bootstrap attempt could not bring the engine up. Cloneable so one
/// attempt's outcome can be fanned out to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BootstrapError {
    #[error("SRS blobs are missing from the store: {}", .0.join(", "))]
    PrerequisiteMissing(Vec<String>),

    #[error("SRS store failed: {0}")]
    Store(String),

    #[error("engine start failed: {0}")]
    Start(String),

    #[error("engine did not report ready within {0:?}")]
    ReadyTimeout(Duration),
}

impl From<srs_store::StoreError> for BootstrapError {
    fn from(err: srs_store::StoreError) -> Self {
        Self::Store(err.to_string())
    }
}

/// Failure surfaced by the guest module itself.
#[derive(Error, Debug)]
pub enum GuestError {
    #[error("guest reported: {0}")]
    Reported(String),

    #[error("guest call failed: {0}")]
    Call(String),
}

#[derive(Error, Debug)]
pub enum ProofError {
    #[error("engine bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("proving failed: {0}")]
    Guest(#[from] GuestError),
}

#[derive(Error, Debug)]
pub enum SignError {
    #[error("wallet secret is not usable: {0}")]
    InvalidSecret(String),

    #[error("wallet cryptography failed: {0}")]
    Crypto(String),

    #[error(transparent)]
    Proof(#[from] ProofError),
}
