// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Lifecycle and signing host for the sandboxed ZK proof engine
//!
//! The proof engine runs as a WASM guest with no filesystem of its own.
//! This crate owns everything around it: fetching SRS parameters from an
//! [`srs_store::SrsStore`], laying them out on a [`wasmfs_core::VirtualFs`]
//! the guest reads through its syscall shim, starting the guest and waiting
//! for it to report ready, and driving the transaction signing pipeline on
//! top of the proving calls.

pub mod bootstrap;
pub mod error;
pub mod guest;
pub mod signer;
pub mod testing;

pub use bootstrap::{BootstrapConfig, BootstrapPhase, ProverHost};
pub use error::{BootstrapError, GuestError, ProofError, SignError};
pub use guest::{GuestEnv, GuestModule, GuestResult, ProofInputs};
pub use signer::{DraftTransaction, TransactionSigner, TxHashes, Wallet, WalletCrypto};
