// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wasmfs_core::GuestSyscalls;

use crate::error::GuestError;

pub type GuestResult<T> = Result<T, GuestError>;

/// Environment map handed to the guest at start.
pub type GuestEnv = HashMap<String, String>;

/// The seven scalar arguments of a proof call: the wallet's salt and
/// secret-hash commitment plus the five transaction digests. All values are
/// `0x`-prefixed hex strings, as the engine expects them on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofInputs {
    pub salt: String,
    pub hash: String,
    pub secret_hash: String,
    pub tx_hash_x: String,
    pub tx_hash_y: String,
    pub tx_hash_z: String,
    pub tx_hash_w: String,
}

/// The sandboxed proof engine, as seen from the host.
///
/// An implementation wraps a WASM module whose import table is wired to the
/// [`GuestSyscalls`] capability it receives at start. The host never calls
/// the exported functions before a readiness probe has answered true, and a
/// guest-reported error payload surfaces as [`GuestError::Reported`].
#[async_trait]
pub trait GuestModule: Send + Sync {
    /// Launch the module. Called once per bootstrap attempt; every attempt
    /// on a host hands over the same syscall capability.
    async fn start(&self, syscalls: Arc<dyn GuestSyscalls>, env: GuestEnv) -> GuestResult<()>;

    /// Whether the engine has raised its readiness flag, which it does
    /// once its SRS parameters are loaded.
    async fn is_ready(&self) -> GuestResult<bool>;

    /// Environment defaults compiled into the module. Host overrides are
    /// merged over these before start.
    fn default_env(&self) -> GuestEnv;

    /// Exported proof call. Returns the proof encoding the engine
    /// produces, `0x`-prefixed.
    async fn generate_proof(&self, inputs: &ProofInputs) -> GuestResult<String>;

    /// Exported verification-key call for the wallet's commitment.
    async fn generate_verification_key(&self, salt: &str, hash: &str) -> GuestResult<String>;
}
