// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Brings the proof engine from cold to ready
//!
//! A bootstrap attempt checks the SRS store, materializes the guest's
//! virtual disk, starts the guest, and polls until it reports ready.
//! Concurrent callers share one in-flight attempt; a failed attempt is
//! handed to its waiters and forgotten, so the next caller starts fresh.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use srs_store::{SrsBlob, SrsStore, REQUIRED_SRS_NAMES};
use wasmfs_core::{GuestSyscalls, SyscallShim, VirtualFs};

use crate::error::{BootstrapError, ProofError};
use crate::guest::{GuestEnv, GuestModule, ProofInputs};

/// Layout and timing of the bootstrap sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Guest home directory, also the value of `HOME` in the guest env.
    pub home_dir: String,
    /// Cache root, exported to the guest as `XDG_CACHE_HOME`.
    pub cache_dir: String,
    /// Directory the engine scans for its SRS parameter files.
    pub engine_dir: String,
    pub ready_poll_interval: Duration,
    pub ready_timeout: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            home_dir: "/tmp".to_string(),
            cache_dir: "/tmp/.cache".to_string(),
            engine_dir: "/tmp/.cache/zkprover".to_string(),
            ready_poll_interval: Duration::from_millis(100),
            ready_timeout: Duration::from_secs(15),
        }
    }
}

impl BootstrapConfig {
    /// Virtual path a store blob lands at: the engine directory plus the
    /// upper-cased blob name.
    pub fn srs_path(&self, name: &str) -> String {
        format!("{}/{}", self.engine_dir, name.to_uppercase())
    }

    fn env_overrides(&self) -> GuestEnv {
        GuestEnv::from([
            ("HOME".to_string(), self.home_dir.clone()),
            ("XDG_CACHE_HOME".to_string(), self.cache_dir.clone()),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    Idle,
    CheckingBlobs,
    Materializing,
    Starting,
    AwaitingReady,
    Ready,
    Failed,
}

type AttemptOutcome = Option<Result<(), BootstrapError>>;

struct HostState {
    attempt: Option<watch::Receiver<AttemptOutcome>>,
}

/// Owns one guest engine, its virtual disk, and the bootstrap state.
pub struct ProverHost {
    config: BootstrapConfig,
    store: Arc<dyn SrsStore>,
    guest: Arc<dyn GuestModule>,
    fs: Arc<VirtualFs>,
    syscalls: Arc<dyn GuestSyscalls>,
    phase_tx: watch::Sender<BootstrapPhase>,
    state: Mutex<HostState>,
}

impl ProverHost {
    pub fn new(
        config: BootstrapConfig,
        store: Arc<dyn SrsStore>,
        guest: Arc<dyn GuestModule>,
    ) -> Arc<Self> {
        let fs = Arc::new(VirtualFs::new());
        let syscalls: Arc<dyn GuestSyscalls> = Arc::new(SyscallShim::new(Arc::clone(&fs)));
        let (phase_tx, _) = watch::channel(BootstrapPhase::Idle);
        Arc::new(Self {
            config,
            store,
            guest,
            fs,
            syscalls,
            phase_tx,
            state: Mutex::new(HostState { attempt: None }),
        })
    }

    pub fn phase(&self) -> BootstrapPhase {
        *self.phase_tx.borrow()
    }

    /// Watch phase transitions as they happen.
    pub fn subscribe(&self) -> watch::Receiver<BootstrapPhase> {
        self.phase_tx.subscribe()
    }

    pub fn fs(&self) -> &Arc<VirtualFs> {
        &self.fs
    }

    /// The capability the guest's import table is wired to. One per host,
    /// shared by every bootstrap attempt.
    pub fn syscalls(&self) -> Arc<dyn GuestSyscalls> {
        Arc::clone(&self.syscalls)
    }

    /// Bring the engine up. Returns immediately once a previous attempt
    /// has succeeded; otherwise joins the in-flight attempt or starts one.
    pub async fn initialize(self: &Arc<Self>) -> Result<(), BootstrapError> {
        if self.phase() == BootstrapPhase::Ready {
            return Ok(());
        }

        let mut outcome_rx = {
            let mut state = self.state.lock().unwrap();
            match &state.attempt {
                Some(rx) => rx.clone(),
                None => {
                    let (tx, rx) = watch::channel(None);
                    state.attempt = Some(rx.clone());
                    let host = Arc::clone(self);
                    tokio::spawn(async move { host.run_attempt(tx).await });
                    rx
                }
            }
        };

        loop {
            {
                let outcome = outcome_rx.borrow_and_update();
                if let Some(result) = outcome.as_ref() {
                    return result.clone();
                }
            }
            if outcome_rx.changed().await.is_err() {
                return Err(BootstrapError::Start("bootstrap attempt aborted".to_string()));
            }
        }
    }

    /// Call the engine's proof export, bootstrapping first when needed.
    pub async fn generate_proof(
        self: &Arc<Self>,
        inputs: &ProofInputs,
    ) -> Result<String, ProofError> {
        self.initialize().await?;
        Ok(self.guest.generate_proof(inputs).await?)
    }

    pub async fn generate_verification_key(
        self: &Arc<Self>,
        salt: &str,
        hash: &str,
    ) -> Result<String, ProofError> {
        self.initialize().await?;
        Ok(self.guest.generate_verification_key(salt, hash).await?)
    }

    async fn run_attempt(self: Arc<Self>, outcome_tx: watch::Sender<AttemptOutcome>) {
        let result = self.bootstrap().await;
        match &result {
            Ok(()) => {
                info!(operation = "bootstrap", "proof engine is ready");
                self.set_phase(BootstrapPhase::Ready);
            }
            Err(err) => {
                warn!(operation = "bootstrap", error = %err, "bootstrap attempt failed");
                self.set_phase(BootstrapPhase::Failed);
            }
        }
        // Free the slot before publishing, so the next caller retries a
        // failure instead of joining a finished attempt.
        self.state.lock().unwrap().attempt = None;
        let _ = outcome_tx.send(Some(result));
    }

    async fn bootstrap(&self) -> Result<(), BootstrapError> {
        self.set_phase(BootstrapPhase::CheckingBlobs);
        let blobs = self.fetch_required_blobs().await?;

        self.set_phase(BootstrapPhase::Materializing);
        self.materialize(&blobs);

        self.set_phase(BootstrapPhase::Starting);
        self.guest
            .start(self.syscalls(), self.guest_env())
            .await
            .map_err(|err| BootstrapError::Start(err.to_string()))?;

        self.set_phase(BootstrapPhase::AwaitingReady);
        self.await_ready().await
    }

    /// Both blobs must be on hand before any virtual file is created, so a
    /// half-provisioned store never produces a half-materialized disk.
    async fn fetch_required_blobs(&self) -> Result<Vec<SrsBlob>, BootstrapError> {
        let mut blobs = Vec::new();
        let mut missing = Vec::new();
        for name in REQUIRED_SRS_NAMES {
            match self.store.get(name).await? {
                Some(blob) => blobs.push(blob),
                None => missing.push(name.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(BootstrapError::PrerequisiteMissing(missing));
        }
        Ok(blobs)
    }

    fn materialize(&self, blobs: &[SrsBlob]) {
        for dir in [
            &self.config.home_dir,
            &self.config.cache_dir,
            &self.config.engine_dir,
        ] {
            self.fs.create_directory(dir);
        }
        for blob in blobs {
            let path = self.config.srs_path(&blob.name);
            info!(
                operation = "bootstrap_materialize",
                path = %path,
                size = %blob.size(),
                "placing SRS blob"
            );
            self.fs.create_or_replace_file(&path, blob.content.clone());
        }
    }

    fn guest_env(&self) -> GuestEnv {
        let mut env = self.guest.default_env();
        env.extend(self.config.env_overrides());
        env
    }

    async fn await_ready(&self) -> Result<(), BootstrapError> {
        let poll = async {
            let mut interval = tokio::time::interval(self.config.ready_poll_interval);
            loop {
                interval.tick().await;
                match self.guest.is_ready().await {
                    Ok(true) => return Ok(()),
                    Ok(false) => {}
                    Err(err) => {
                        return Err(BootstrapError::Start(format!(
                            "readiness probe failed: {err}"
                        )))
                    }
                }
            }
        };
        match tokio::time::timeout(self.config.ready_timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(BootstrapError::ReadyTimeout(self.config.ready_timeout)),
        }
    }

    fn set_phase(&self, phase: BootstrapPhase) {
        debug!(operation = "bootstrap_phase", phase = ?phase, "phase change");
        self.phase_tx.send_replace(phase);
    }
}
