// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Transaction signing on top of the proving host
//!
//! Signing is a pipeline: check the secret against the wallet, derive the
//! transaction digests, prove them in the engine, fetch the verification
//! key, and encode the wire transaction. The secret itself never crosses
//! into the guest; only digests derived from it do.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bootstrap::ProverHost;
use crate::error::SignError;
use crate::guest::ProofInputs;

/// Wallet document in its export format. The secret is deliberately not
/// part of it; callers supply the secret per signing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub address: String,
    pub salt: String,
    pub hash: String,
}

/// A spend draft: input and output commitment coordinates, `0x`-hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftTransaction {
    pub ix: String,
    pub iy: String,
    pub ox: String,
    pub oy: String,
}

/// Digests the wallet cryptography derives from a draft and a secret.
/// Together with the wallet's salt and hash they form the proof inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHashes {
    pub secret_hash: String,
    pub tx_hash_x: String,
    pub tx_hash_y: String,
    pub tx_hash_z: String,
    pub tx_hash_w: String,
}

/// The wallet's cryptographic functions, an external collaborator. Kept
/// behind a trait so the pipeline can be exercised without a curve
/// implementation.
pub trait WalletCrypto: Send + Sync {
    /// Derive a fresh wallet document from a secret.
    fn create_wallet(&self, secret: &str) -> Result<Wallet, SignError>;

    /// Parse and validate a wallet export.
    fn import_wallet(&self, json: &str) -> Result<Wallet, SignError>;

    /// Whether the secret controls the wallet's commitment.
    fn verify_wallet(&self, wallet: &Wallet, secret: &str) -> Result<bool, SignError>;

    /// Derive the transaction digests for a draft.
    fn tx_hashes(&self, draft: &DraftTransaction, secret: &str) -> Result<TxHashes, SignError>;

    /// Assemble the wire transaction from the key, the proof, and the
    /// draft it proves.
    fn encode_signed_tx(
        &self,
        vk: &str,
        proof: &str,
        draft: &DraftTransaction,
    ) -> Result<String, SignError>;
}

pub struct TransactionSigner {
    host: Arc<ProverHost>,
    crypto: Arc<dyn WalletCrypto>,
}

impl TransactionSigner {
    pub fn new(host: Arc<ProverHost>, crypto: Arc<dyn WalletCrypto>) -> Self {
        Self { host, crypto }
    }

    /// Sign a draft transaction. A secret that fails verification is
    /// rejected before the engine is touched, so it never triggers a
    /// bootstrap.
    pub async fn sign(
        &self,
        wallet: &Wallet,
        secret: &str,
        draft: &DraftTransaction,
    ) -> Result<String, SignError> {
        if !self.crypto.verify_wallet(wallet, secret)? {
            return Err(SignError::InvalidSecret(
                "secret does not control this wallet".to_string(),
            ));
        }

        let hashes = self.crypto.tx_hashes(draft, secret)?;
        let inputs = ProofInputs {
            salt: wallet.salt.clone(),
            hash: wallet.hash.clone(),
            secret_hash: hashes.secret_hash,
            tx_hash_x: hashes.tx_hash_x,
            tx_hash_y: hashes.tx_hash_y,
            tx_hash_z: hashes.tx_hash_z,
            tx_hash_w: hashes.tx_hash_w,
        };

        let proof = self.host.generate_proof(&inputs).await?;
        let vk = self
            .host
            .generate_verification_key(&wallet.salt, &wallet.hash)
            .await?;
        info!(operation = "sign_tx", address = %wallet.address, "transaction proved");
        self.crypto.encode_signed_tx(&vk, &proof, draft)
    }
}
