// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use prover_host::testing::{ReadyBehavior, ScriptedGuest, ScriptedStore, ScriptedWallet};
use prover_host::{
    BootstrapConfig, BootstrapError, BootstrapPhase, DraftTransaction, GuestModule, ProofError,
    ProofInputs, ProverHost, SignError, TransactionSigner, WalletCrypto,
};
use srs_store::{MemorySrsStore, SrsBlob, SrsStore, SRS_CK_NAME, SRS_LK_NAME};

async fn seeded_store() -> MemorySrsStore {
    let store = MemorySrsStore::new();
    store
        .put(SrsBlob::new(SRS_CK_NAME, Bytes::from(vec![0xAA; 100])))
        .await
        .unwrap();
    store
        .put(SrsBlob::new(SRS_LK_NAME, Bytes::from(vec![0xBB; 200])))
        .await
        .unwrap();
    store
}

fn host_with(store: MemorySrsStore, guest: Arc<ScriptedGuest>) -> Arc<ProverHost> {
    ProverHost::new(BootstrapConfig::default(), Arc::new(store), guest)
}

fn example_inputs() -> ProofInputs {
    ProofInputs {
        salt: "0x01".to_string(),
        hash: "0x02".to_string(),
        secret_hash: "0x03".to_string(),
        tx_hash_x: "0x04".to_string(),
        tx_hash_y: "0x05".to_string(),
        tx_hash_z: "0x06".to_string(),
        tx_hash_w: "0x07".to_string(),
    }
}

fn example_draft() -> DraftTransaction {
    DraftTransaction {
        ix: "0x10".to_string(),
        iy: "0x11".to_string(),
        ox: "0x20".to_string(),
        oy: "0x21".to_string(),
    }
}

fn phase_rank(phase: BootstrapPhase) -> u8 {
    match phase {
        BootstrapPhase::Idle => 0,
        BootstrapPhase::CheckingBlobs => 1,
        BootstrapPhase::Materializing => 2,
        BootstrapPhase::Starting => 3,
        BootstrapPhase::AwaitingReady => 4,
        BootstrapPhase::Ready => 5,
        BootstrapPhase::Failed => 6,
    }
}

#[tokio::test]
async fn bootstrap_materializes_the_guest_disk() {
    let guest = Arc::new(ScriptedGuest::new());
    let host = host_with(seeded_store().await, Arc::clone(&guest));

    host.initialize().await.unwrap();
    assert_eq!(host.phase(), BootstrapPhase::Ready);

    let fs = host.fs();
    for dir in ["/tmp", "/tmp/.cache", "/tmp/.cache/zkprover"] {
        assert!(fs.stat(dir).unwrap().is_directory(), "missing dir {dir}");
    }
    let ck = fs.stat("/tmp/.cache/zkprover/SRS.CK.BIN").unwrap();
    assert!(ck.is_file());
    assert_eq!(ck.size, 100);
    assert_eq!(fs.stat("/tmp/.cache/zkprover/SRS.LK.9.BIN").unwrap().size, 200);
    assert_eq!(fs.inode_count(), 5);
    assert_eq!(guest.start_count(), 1);

    let proof = host.generate_proof(&example_inputs()).await.unwrap();
    assert!(proof.starts_with("0x"));
}

#[tokio::test]
async fn missing_blobs_fail_before_any_disk_mutation() {
    let store = MemorySrsStore::new();
    store
        .put(SrsBlob::new(SRS_CK_NAME, Bytes::from_static(b"ck only")))
        .await
        .unwrap();
    let guest = Arc::new(ScriptedGuest::new());
    let host = host_with(store, Arc::clone(&guest));

    let err = host.initialize().await.unwrap_err();
    assert_eq!(
        err,
        BootstrapError::PrerequisiteMissing(vec![SRS_LK_NAME.to_string()])
    );
    assert_eq!(host.phase(), BootstrapPhase::Failed);
    assert_eq!(host.fs().inode_count(), 0);
    assert_eq!(guest.start_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_attempt() {
    let guest = Arc::new(ScriptedGuest::with_ready(ReadyBehavior::After(
        Duration::from_millis(250),
    )));
    let host = host_with(seeded_store().await, Arc::clone(&guest));

    let (a, b, vk) = tokio::join!(
        host.initialize(),
        host.initialize(),
        host.generate_verification_key("0x01", "0x02")
    );
    a.unwrap();
    b.unwrap();
    assert_eq!(vk.unwrap(), ScriptedGuest::canned_vk("0x01", "0x02"));
    assert_eq!(guest.start_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_attempts_are_not_cached() {
    let guest = Arc::new(ScriptedGuest::with_ready(ReadyBehavior::Never));
    let host = host_with(seeded_store().await, Arc::clone(&guest));

    let before = Instant::now();
    let err = host.initialize().await.unwrap_err();
    assert_eq!(err, BootstrapError::ReadyTimeout(Duration::from_secs(15)));
    assert!(before.elapsed() >= Duration::from_secs(15));
    assert_eq!(host.phase(), BootstrapPhase::Failed);

    guest.set_ready_behavior(ReadyBehavior::Immediate);
    host.initialize().await.unwrap();
    assert_eq!(host.phase(), BootstrapPhase::Ready);
    assert_eq!(guest.start_count(), 2);
}

#[tokio::test]
async fn a_store_failure_surfaces_and_the_next_attempt_recovers() {
    let guest = Arc::new(ScriptedGuest::new());
    let store = Arc::new(ScriptedStore::wrapping(seeded_store().await));
    store.fail_next_gets(1);
    let host = ProverHost::new(
        BootstrapConfig::default(),
        Arc::clone(&store) as Arc<dyn SrsStore>,
        Arc::clone(&guest) as Arc<dyn GuestModule>,
    );

    let err = host.initialize().await.unwrap_err();
    assert!(matches!(err, BootstrapError::Store(message) if message.contains("went away")));
    assert_eq!(host.phase(), BootstrapPhase::Failed);
    assert_eq!(host.fs().inode_count(), 0);
    assert_eq!(guest.start_count(), 0);

    host.initialize().await.unwrap();
    assert_eq!(host.phase(), BootstrapPhase::Ready);
    assert_eq!(guest.start_count(), 1);
    assert_eq!(store.get_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn readiness_is_polled_on_the_configured_cadence() {
    let guest = Arc::new(ScriptedGuest::with_ready(ReadyBehavior::After(
        Duration::from_millis(250),
    )));
    let host = host_with(seeded_store().await, Arc::clone(&guest));

    let before = Instant::now();
    host.initialize().await.unwrap();
    let elapsed = before.elapsed();
    assert!(elapsed >= Duration::from_millis(250), "ready too early: {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(400), "ready too late: {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn a_subscriber_sees_phases_advance_in_order() {
    let guest = Arc::new(ScriptedGuest::with_ready(ReadyBehavior::After(
        Duration::from_millis(250),
    )));
    let store =
        ScriptedStore::wrapping(seeded_store().await).with_latency(Duration::from_millis(10));
    let host = ProverHost::new(
        BootstrapConfig::default(),
        Arc::new(store),
        Arc::clone(&guest) as Arc<dyn GuestModule>,
    );

    let mut phases = host.subscribe();
    let start_phase = *phases.borrow_and_update();
    let observer = tokio::spawn(async move {
        let mut seen = vec![start_phase];
        while *seen.last().unwrap() != BootstrapPhase::Ready {
            phases.changed().await.expect("phase publisher dropped");
            seen.push(*phases.borrow_and_update());
        }
        seen
    });

    host.initialize().await.unwrap();
    let seen = observer.await.unwrap();

    assert_eq!(seen.first(), Some(&BootstrapPhase::Idle));
    assert_eq!(seen.last(), Some(&BootstrapPhase::Ready));
    for pair in seen.windows(2) {
        assert!(
            phase_rank(pair[1]) > phase_rank(pair[0]),
            "phases moved backwards: {seen:?}"
        );
    }
    for milestone in [BootstrapPhase::CheckingBlobs, BootstrapPhase::AwaitingReady] {
        assert!(seen.contains(&milestone), "never saw {milestone:?} in {seen:?}");
    }
}

#[tokio::test]
async fn host_env_overrides_win_over_guest_defaults() {
    let guest = Arc::new(ScriptedGuest::new());
    let host = host_with(seeded_store().await, Arc::clone(&guest));
    host.initialize().await.unwrap();

    let starts = guest.starts();
    assert_eq!(starts.len(), 1);
    let env = &starts[0].env;
    assert_eq!(env.get("HOME").map(String::as_str), Some("/tmp"));
    assert_eq!(env.get("XDG_CACHE_HOME").map(String::as_str), Some("/tmp/.cache"));
    assert_eq!(env.get("ZKPROVER_LOG").map(String::as_str), Some("info"));
}

#[tokio::test(start_paused = true)]
async fn the_syscall_capability_is_shared_across_attempts() {
    let guest = Arc::new(ScriptedGuest::with_ready(ReadyBehavior::Never));
    let host = host_with(seeded_store().await, Arc::clone(&guest));

    host.initialize().await.unwrap_err();
    guest.set_ready_behavior(ReadyBehavior::Immediate);
    host.initialize().await.unwrap();

    let starts = guest.starts();
    assert_eq!(starts.len(), 2);
    assert!(Arc::ptr_eq(&starts[0].syscalls, &starts[1].syscalls));
    assert!(Arc::ptr_eq(&starts[0].syscalls, &host.syscalls()));
}

#[tokio::test]
async fn a_start_failure_surfaces_as_a_bootstrap_error() {
    let guest = Arc::new(ScriptedGuest::failing_start("module trapped during init"));
    let host = host_with(seeded_store().await, Arc::clone(&guest));

    let err = host.initialize().await.unwrap_err();
    assert!(matches!(err, BootstrapError::Start(message) if message.contains("module trapped")));
    assert_eq!(host.phase(), BootstrapPhase::Failed);
    assert_eq!(guest.start_count(), 0);
}

#[tokio::test]
async fn a_guest_can_walk_its_disk_through_the_capability() {
    let guest = Arc::new(ScriptedGuest::new());
    let host = host_with(seeded_store().await, Arc::clone(&guest));
    host.initialize().await.unwrap();

    let syscalls = host.syscalls();
    assert!(syscalls.stat("/tmp/.cache/zkprover").unwrap().is_directory());

    let fd = syscalls.open("/tmp/.cache/zkprover/SRS.CK.BIN", 0, 0).unwrap();
    assert_eq!(syscalls.fstat(fd).unwrap().size, 100);

    let mut assembled = Vec::new();
    let mut chunk = [0u8; 64];
    let chunk_len = chunk.len();
    loop {
        let n = syscalls.read(fd, &mut chunk, 0, chunk_len, None).unwrap();
        if n == 0 {
            break;
        }
        assembled.extend_from_slice(&chunk[..n]);
    }
    assert_eq!(assembled, vec![0xAA; 100]);

    syscalls.close(fd).unwrap();
    let err = syscalls.read(fd, &mut chunk, 0, 1, None).unwrap_err();
    assert_eq!(err.code, "EBADF");
}

#[tokio::test]
async fn a_failed_proof_leaves_the_engine_ready() {
    let guest = Arc::new(ScriptedGuest::failing_proofs("constraint system unsatisfied"));
    let host = host_with(seeded_store().await, Arc::clone(&guest));

    let err = host.generate_proof(&example_inputs()).await.unwrap_err();
    assert!(matches!(err, ProofError::Guest(_)));
    assert_eq!(host.phase(), BootstrapPhase::Ready);

    host.generate_proof(&example_inputs()).await.unwrap_err();
    assert_eq!(guest.start_count(), 1);
}

#[tokio::test]
async fn signing_proves_the_wallet_commitment_and_digests() {
    let guest = Arc::new(ScriptedGuest::new());
    let host = host_with(seeded_store().await, Arc::clone(&guest));
    let crypto = Arc::new(ScriptedWallet::new());
    let signer = TransactionSigner::new(Arc::clone(&host), crypto.clone());

    let wallet = crypto.create_wallet("hunter2").unwrap();
    let draft = example_draft();
    let signed = signer.sign(&wallet, "hunter2", &draft).await.unwrap();

    let calls = guest.proof_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].salt, wallet.salt);
    assert_eq!(calls[0].hash, wallet.hash);
    assert_eq!(calls[0], {
        let hashes = crypto.tx_hashes(&draft, "hunter2").unwrap();
        ProofInputs {
            salt: wallet.salt.clone(),
            hash: wallet.hash.clone(),
            secret_hash: hashes.secret_hash,
            tx_hash_x: hashes.tx_hash_x,
            tx_hash_y: hashes.tx_hash_y,
            tx_hash_z: hashes.tx_hash_z,
            tx_hash_w: hashes.tx_hash_w,
        }
    });

    let expected_vk = ScriptedGuest::canned_vk(&wallet.salt, &wallet.hash);
    let expected_proof = ScriptedGuest::canned_proof(&calls[0]);
    assert_eq!(
        signed,
        format!("tx:0x10:0x11:0x20:0x21:{expected_vk}:{expected_proof}")
    );
    assert_eq!(host.phase(), BootstrapPhase::Ready);
}

#[tokio::test]
async fn a_rejected_secret_never_wakes_the_engine() {
    let guest = Arc::new(ScriptedGuest::new());
    let host = host_with(seeded_store().await, Arc::clone(&guest));
    let crypto = Arc::new(ScriptedWallet::new());
    let signer = TransactionSigner::new(Arc::clone(&host), crypto.clone());

    let wallet = crypto.create_wallet("hunter2").unwrap();
    let err = signer
        .sign(&wallet, "wrong", &example_draft())
        .await
        .unwrap_err();
    assert!(matches!(err, SignError::InvalidSecret(_)));
    assert_eq!(guest.start_count(), 0);
    assert_eq!(host.phase(), BootstrapPhase::Idle);
}
