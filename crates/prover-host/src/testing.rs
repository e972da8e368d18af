// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Scripted guest, store, and wallet doubles for exercising the host
//! without a WASM engine, a disk, or a curve library.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use srs_store::{BlobMetadata, MemorySrsStore, SrsBlob, SrsStore, StoreError, StoreResult};
use wasmfs_core::GuestSyscalls;

use crate::error::{GuestError, SignError};
use crate::guest::{GuestEnv, GuestModule, GuestResult, ProofInputs};
use crate::signer::{DraftTransaction, TxHashes, Wallet, WalletCrypto};

/// How a scripted guest answers readiness probes after a start.
#[derive(Debug, Clone, Copy)]
pub enum ReadyBehavior {
    Immediate,
    After(Duration),
    Never,
}

/// Everything a scripted guest saw in one start call.
#[derive(Clone)]
pub struct RecordedStart {
    pub syscalls: Arc<dyn GuestSyscalls>,
    pub env: GuestEnv,
}

/// Guest double that follows a readiness script and answers exports with
/// deterministic hex built from its arguments.
pub struct ScriptedGuest {
    ready_behavior: Mutex<ReadyBehavior>,
    ready_at: Mutex<Option<Instant>>,
    defaults: GuestEnv,
    starts: Mutex<Vec<RecordedStart>>,
    proof_calls: Mutex<Vec<ProofInputs>>,
    start_count: AtomicUsize,
    start_failure: Option<String>,
    proof_failure: Option<String>,
}

impl ScriptedGuest {
    pub fn new() -> Self {
        Self::with_ready(ReadyBehavior::Immediate)
    }

    pub fn with_ready(behavior: ReadyBehavior) -> Self {
        Self {
            ready_behavior: Mutex::new(behavior),
            ready_at: Mutex::new(None),
            defaults: GuestEnv::from([
                ("HOME".to_string(), "/".to_string()),
                ("ZKPROVER_LOG".to_string(), "info".to_string()),
            ]),
            starts: Mutex::new(Vec::new()),
            proof_calls: Mutex::new(Vec::new()),
            start_count: AtomicUsize::new(0),
            start_failure: None,
            proof_failure: None,
        }
    }

    pub fn failing_start(message: &str) -> Self {
        Self {
            start_failure: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn failing_proofs(message: &str) -> Self {
        Self {
            proof_failure: Some(message.to_string()),
            ..Self::new()
        }
    }

    /// Reschedule readiness, for scripts that fail a first attempt and
    /// succeed on retry.
    pub fn set_ready_behavior(&self, behavior: ReadyBehavior) {
        *self.ready_behavior.lock().unwrap() = behavior;
        *self.ready_at.lock().unwrap() = None;
    }

    pub fn start_count(&self) -> usize {
        self.start_count.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> Vec<RecordedStart> {
        self.starts.lock().unwrap().clone()
    }

    pub fn proof_calls(&self) -> Vec<ProofInputs> {
        self.proof_calls.lock().unwrap().clone()
    }

    /// The proof this double returns for `inputs`.
    pub fn canned_proof(inputs: &ProofInputs) -> String {
        let packed = [
            inputs.salt.as_str(),
            inputs.hash.as_str(),
            inputs.secret_hash.as_str(),
            inputs.tx_hash_x.as_str(),
            inputs.tx_hash_y.as_str(),
            inputs.tx_hash_z.as_str(),
            inputs.tx_hash_w.as_str(),
        ]
        .join("|");
        format!("0x{}", hex::encode(packed))
    }

    /// The verification key this double returns for `(salt, hash)`.
    pub fn canned_vk(salt: &str, hash: &str) -> String {
        format!("0x{}", hex::encode(format!("vk|{salt}|{hash}")))
    }
}

impl Default for ScriptedGuest {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GuestModule for ScriptedGuest {
    async fn start(&self, syscalls: Arc<dyn GuestSyscalls>, env: GuestEnv) -> GuestResult<()> {
        if let Some(message) = &self.start_failure {
            return Err(GuestError::Call(message.clone()));
        }
        self.start_count.fetch_add(1, Ordering::SeqCst);
        self.starts.lock().unwrap().push(RecordedStart { syscalls, env });
        if let ReadyBehavior::After(delay) = *self.ready_behavior.lock().unwrap() {
            *self.ready_at.lock().unwrap() = Some(Instant::now() + delay);
        }
        Ok(())
    }

    async fn is_ready(&self) -> GuestResult<bool> {
        let behavior = *self.ready_behavior.lock().unwrap();
        Ok(match behavior {
            ReadyBehavior::Immediate => true,
            ReadyBehavior::Never => false,
            ReadyBehavior::After(_) => match *self.ready_at.lock().unwrap() {
                Some(at) => Instant::now() >= at,
                None => false,
            },
        })
    }

    fn default_env(&self) -> GuestEnv {
        self.defaults.clone()
    }

    async fn generate_proof(&self, inputs: &ProofInputs) -> GuestResult<String> {
        if let Some(message) = &self.proof_failure {
            return Err(GuestError::Reported(message.clone()));
        }
        self.proof_calls.lock().unwrap().push(inputs.clone());
        Ok(Self::canned_proof(inputs))
    }

    async fn generate_verification_key(&self, salt: &str, hash: &str) -> GuestResult<String> {
        Ok(Self::canned_vk(salt, hash))
    }
}

/// Store double wrapping a [`MemorySrsStore`] with scripted read latency
/// and a countdown of get calls to fail before serving normally again.
pub struct ScriptedStore {
    inner: MemorySrsStore,
    latency: Duration,
    failing_gets: AtomicUsize,
    get_calls: AtomicUsize,
}

impl ScriptedStore {
    pub fn wrapping(inner: MemorySrsStore) -> Self {
        Self {
            inner,
            latency: Duration::ZERO,
            failing_gets: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long before answering each get, for scripts that need
    /// the host to dwell in its fetch phase.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Answer the next `count` get calls with an I/O error.
    pub fn fail_next_gets(&self, count: usize) {
        self.failing_gets.store(count, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl SrsStore for ScriptedStore {
    async fn put(&self, blob: SrsBlob) -> StoreResult<()> {
        self.inner.put(blob).await
    }

    async fn get(&self, name: &str) -> StoreResult<Option<SrsBlob>> {
        self.pause().await;
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_gets.load(Ordering::SeqCst) > 0 {
            self.failing_gets.fetch_sub(1, Ordering::SeqCst);
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "backing store went away",
            )));
        }
        self.inner.get(name).await
    }

    async fn delete(&self, name: &str) -> StoreResult<bool> {
        self.inner.delete(name).await
    }

    async fn list(&self) -> StoreResult<Vec<BlobMetadata>> {
        self.inner.list().await
    }
}

/// Wallet cryptography double. Every derivation is a tagged hex encode, so
/// create, verify, and the digest pipeline stay consistent with each other
/// without any curve arithmetic.
pub struct ScriptedWallet;

impl ScriptedWallet {
    pub fn new() -> Self {
        Self
    }

    fn digest(tag: &str, value: &str) -> String {
        format!("0x{}", hex::encode(format!("{tag}:{value}")))
    }
}

impl Default for ScriptedWallet {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletCrypto for ScriptedWallet {
    fn create_wallet(&self, secret: &str) -> Result<Wallet, SignError> {
        Ok(Wallet {
            address: format!("wal1{}", hex::encode(secret)),
            salt: Self::digest("salt", secret),
            hash: Self::digest("hash", secret),
        })
    }

    fn import_wallet(&self, json: &str) -> Result<Wallet, SignError> {
        let wallet: Wallet = serde_json::from_str(json)
            .map_err(|err| SignError::Crypto(format!("wallet JSON is unreadable: {err}")))?;
        if wallet.address.is_empty() || wallet.salt.is_empty() || wallet.hash.is_empty() {
            return Err(SignError::Crypto("wallet fields must be non-empty".to_string()));
        }
        Ok(wallet)
    }

    fn verify_wallet(&self, wallet: &Wallet, secret: &str) -> Result<bool, SignError> {
        Ok(wallet.hash == Self::digest("hash", secret))
    }

    fn tx_hashes(&self, draft: &DraftTransaction, secret: &str) -> Result<TxHashes, SignError> {
        Ok(TxHashes {
            secret_hash: Self::digest("sh", secret),
            tx_hash_x: Self::digest("tx", &draft.ix),
            tx_hash_y: Self::digest("ty", &draft.iy),
            tx_hash_z: Self::digest("tz", &draft.ox),
            tx_hash_w: Self::digest("tw", &draft.oy),
        })
    }

    fn encode_signed_tx(
        &self,
        vk: &str,
        proof: &str,
        draft: &DraftTransaction,
    ) -> Result<String, SignError> {
        Ok(format!(
            "tx:{}:{}:{}:{}:{}:{}",
            draft.ix, draft.iy, draft.ox, draft.oy, vk, proof
        ))
    }
}
