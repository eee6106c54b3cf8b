//! End-to-end scenarios for the transfer worker, driving
//! `afd_core::ftp::fake::FakeFtpServer` plus a temp-dir staging directory
//! (§8 "End-to-end scenarios", scenarios 1-6).

use std::time::{Duration, Instant};

use regex::Regex;
use tempfile::tempdir;

use afd_core::dedup::DuplicateGuard;
use afd_core::ftp::fake::FakeFtpServer;
use afd_core::ftp::{FtpClientError, TransferType};
use afd_core::logs::{DeleteLogEmitter, OutputLogEmitter};
use afd_core::rate::{Keepalive, TransferRateLimiter};
use afd_core::ssp::{HostStatusEntry, HostStatusTable, LockRegion, SystemClock};
use afd_core::worker::ctx::{HostSettings, WorkerCtx};
use afd_core::worker::manifest::{BatchManifest, ManifestEntry};
use afd_core::worker::pipeline::{FileTransfer, StepOutcome};
use afd_core::worker::rename::LockingMode;
use afd_core::worker::{connect_and_login, quit, run_batch, ConnectParams};

fn default_settings() -> HostSettings {
    HostSettings {
        host_alias: "peer".into(),
        block_size: 4096,
        trl_per_process: None,
        transfer_timeout: Duration::from_secs(60),
        keep_alive_timeout: Duration::from_secs(30),
        stat_keepalive: false,
        timeout_transfer: false,
        fast_cd: false,
        target_dir: "incoming".into(),
        lock_file_name: None,
        archive_time_secs: 0,
        archive_dir: None,
        dup_check_timeout: Duration::ZERO,
        rename_file_busy: false,
        keep_time_stamp: false,
        check_size: false,
        debug: false,
        tls_auth: afd_core::ftp::TlsAuthMode::No,
        exec_ftp: None,
    }
}

fn make_ctx(dir: &std::path::Path, allowed_transfers: u32, job_id: u32, settings: HostSettings) -> WorkerCtx<FakeFtpServer> {
    let host = HostStatusEntry::new("peer", allowed_transfers);
    let host_status = HostStatusTable::open(&dir.join("lock.dat"), vec![host]).unwrap();
    WorkerCtx {
        host_status,
        host_pos: 0,
        slot_index: 0,
        job_id,
        settings,
        client: FakeFtpServer::new(),
        dedup: DuplicateGuard::new(),
        rate_limiter: TransferRateLimiter::new(None),
        keepalive: Keepalive::new(Duration::from_secs(60), Instant::now()),
        clock: SystemClock,
        output_log: None,
        delete_log: None,
        retries: 0,
        no_archive: true,
        resend: false,
        toggle_host: false,
    }
}

fn connect_params() -> ConnectParams {
    ConnectParams {
        host: "127.0.0.1".into(),
        port: 2121,
        implicit_tls: false,
        strict_verify: false,
        auth_tls: false,
        user: "anonymous".into(),
        pass: "guest@".into(),
        transfer_type: TransferType::Image,
        utf8: false,
        target_dir: "incoming".into(),
        create_target_dir: false,
    }
}

/// Scenario 1: a two-file batch delivers in plain mode under an anonymous
/// login, the staging directory empties out, and the remote listing shows
/// both names.
#[tokio::test]
async fn scenario_1_two_file_batch_delivers_and_clears_staging_dir() {
    // Setup
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
    std::fs::write(dir.path().join("b.txt"), b"").unwrap();
    let mut ctx = make_ctx(dir.path(), 2, 7, default_settings());

    // Execute
    connect_and_login(&mut ctx, &connect_params(), LockingMode::None).await.unwrap();
    let mut manifest = BatchManifest::new(dir.path().to_path_buf());
    manifest.entries.push(ManifestEntry { file_name: "a.txt".into(), file_size: 5, mtime: None });
    manifest.entries.push(ManifestEntry { file_name: "b.txt".into(), file_size: 0, mtime: None });
    let outcome = run_batch(&mut ctx, manifest, LockingMode::None).await.unwrap();
    quit(&mut ctx).await;

    // Verify. The literal scenario wording in spec.md's end-to-end list
    // ("5 Bytes in 2 files send #...") and its own general log-line format
    // in §7 ("<bytes> in <files> files send ... #<job-id>") disagree on the
    // word "Bytes"; `WorkerOutcome::summary_line` implements the §7 format,
    // so this test checks against that (already covered job-id decimal
    // digits are a subset of the `[0-9a-f]+` the scenario specifies).
    let re = Regex::new(r"^5 in 2 files send #7$").unwrap();
    assert!(re.is_match(&outcome.summary_line()), "unexpected summary line: {}", outcome.summary_line());
    assert_eq!(outcome.files_delivered, 2);
    assert_eq!(outcome.bytes_delivered, 5);

    assert!(ctx.client.file_exists("a.txt"));
    assert!(ctx.client.file_exists("b.txt"));
    assert!(!dir.path().join("a.txt").exists());
    assert!(!dir.path().join("b.txt").exists());
}

/// Scenario 2: a rate-limited transfer of a 1 MiB file at 256 KiB/s takes at
/// least 4 seconds and the delivered byte count is exactly 1 MiB.
#[tokio::test]
async fn scenario_2_rate_limited_transfer_takes_expected_elapsed_time() {
    // Setup
    const ONE_MIB: usize = 1024 * 1024;
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("big.bin"), vec![0xABu8; ONE_MIB]).unwrap();
    let mut settings = default_settings();
    settings.block_size = 64 * 1024;
    settings.trl_per_process = Some(256 * 1024);
    let mut ctx = make_ctx(dir.path(), 1, 1, settings);
    ctx.rate_limiter = TransferRateLimiter::new(Some(256 * 1024));

    // Execute
    connect_and_login(&mut ctx, &connect_params(), LockingMode::None).await.unwrap();
    let mut manifest = BatchManifest::new(dir.path().to_path_buf());
    manifest.entries.push(ManifestEntry { file_name: "big.bin".into(), file_size: ONE_MIB as u64, mtime: None });

    let started = Instant::now();
    let outcome = run_batch(&mut ctx, manifest, LockingMode::None).await.unwrap();
    let elapsed = started.elapsed();
    quit(&mut ctx).await;

    // Verify
    assert_eq!(outcome.bytes_delivered, ONE_MIB as u64);
    assert!(elapsed >= Duration::from_millis(3800), "transfer finished too fast: {elapsed:?}");
    assert_eq!(ctx.client.file_bytes("big.bin").unwrap().len(), ONE_MIB);
}

/// Scenario 3: a `550 Cannot STOR. No permission.` on the first `data_open`
/// with `rename_file_busy` enabled retries under a trailing-underscore name,
/// then moves the delivered file back to its original name on success.
#[tokio::test]
async fn scenario_3_rename_file_busy_retries_and_moves_back() {
    // Setup
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("x"), b"payload").unwrap();
    let mut settings = default_settings();
    settings.rename_file_busy = true;
    let mut ctx = make_ctx(dir.path(), 1, 3, settings);
    ctx.client.fail_next_data_open(FtpClientError::new(550, "Cannot STOR. No permission.", false));

    // Execute
    connect_and_login(&mut ctx, &connect_params(), LockingMode::None).await.unwrap();
    let entry = ManifestEntry { file_name: "x".into(), file_size: 7, mtime: None };
    let local_path = dir.path().join("x");
    let mut transfer = FileTransfer::new(&mut ctx, entry, local_path, LockingMode::None);
    let outcome = transfer.run().await.unwrap();

    // Verify
    assert_eq!(outcome, StepOutcome::Delivered { bytes_sent: 7 });
    assert!(transfer.ctx.client.file_exists("x"));
    assert!(!transfer.ctx.client.file_exists("x_"));
    assert_eq!(transfer.ctx.client.file_bytes("x").unwrap(), b"payload");
}

/// Scenario 4: an append-offset probe reporting `remote_size=1024` against a
/// 4096-byte local file transmits only the remaining 3072 bytes and leaves
/// the peer's copy at the full 4096 bytes.
#[tokio::test]
async fn scenario_4_append_probe_sends_only_remaining_bytes() {
    // Setup
    let dir = tempdir().unwrap();
    let mut full = vec![0u8; 4096];
    for (i, b) in full.iter_mut().enumerate() {
        *b = (i % 256) as u8;
    }
    std::fs::write(dir.path().join("y"), &full).unwrap();
    let mut ctx = make_ctx(dir.path(), 1, 4, default_settings());
    ctx.retries = 1; // step4_append_probe only probes when retries > 0
    ctx.client.seed_file("y", &full[..1024]);

    // Execute
    connect_and_login(&mut ctx, &connect_params(), LockingMode::None).await.unwrap();
    let entry = ManifestEntry { file_name: "y".into(), file_size: 4096, mtime: None };
    let local_path = dir.path().join("y");
    let mut transfer = FileTransfer::new(&mut ctx, entry, local_path, LockingMode::None);
    let outcome = transfer.run().await.unwrap();

    // Verify. `bytes_sent` on the outcome is the file's final size (4096),
    // but the slot progress counter must only advance by the 3072 bytes
    // actually placed on the wire this call, not the cumulative total —
    // otherwise a resumed transfer would double-count the already-delivered
    // prefix in the host's running byte counters.
    assert_eq!(outcome, StepOutcome::Delivered { bytes_sent: 4096 });
    let remote = transfer.ctx.client.file_bytes("y").unwrap();
    assert_eq!(remote.len(), 4096);
    assert_eq!(remote, full);
    drop(transfer);
    assert_eq!(ctx.host_status.host(0).unwrap().slots[0].bytes_sent, 3072);
}

/// Scenario 5: a second worker's FIU check observes the first worker's
/// in-flight claim on the same file name, suppresses its own transfer after
/// emitting the other-process-delete output record and the
/// `FILE_CURRENTLY_TRANSMITTED` delete record, and unlinks the local copy
/// exactly once.
#[tokio::test]
async fn scenario_5_second_worker_suppresses_duplicate_in_flight() {
    // Setup
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("same.dat"), b"payload").unwrap();
    let output_log_path = dir.path().join("output.log");
    let delete_log_path = dir.path().join("delete.log");
    std::fs::write(&output_log_path, []).unwrap();
    std::fs::write(&delete_log_path, []).unwrap();

    let mut ctx = make_ctx(dir.path(), 2, 9, default_settings());
    ctx.output_log = Some(OutputLogEmitter::new(afd_core::control::LogFifoSink::open(&output_log_path).unwrap()));
    ctx.delete_log = Some(DeleteLogEmitter::new(afd_core::control::LogFifoSink::open(&delete_log_path).unwrap()));

    // First worker's slot (index 0) is mid-transfer on "same.dat"; this
    // worker occupies slot 1.
    {
        let _guard = ctx.host_status.lock(0, LockRegion::Fiu).unwrap();
        let host = ctx.host_status.host_mut(0).unwrap();
        host.slots[0].job_id = ctx.job_id;
        host.slots[0].unique_name = [2, 0, 0];
        host.slots[0].file_size_in_use = 7;
        host.slots[0].file_name_in_use = "same.dat".to_string();
    }
    ctx.slot_index = 1;

    // Execute
    let entry = ManifestEntry { file_name: "same.dat".into(), file_size: 7, mtime: None };
    let local_path = dir.path().join("same.dat");
    let mut transfer = FileTransfer::new(&mut ctx, entry, local_path.clone(), LockingMode::None);
    let outcome = transfer.run().await.unwrap();

    // Verify
    assert_eq!(outcome, StepOutcome::SuppressedDuplicate);
    assert!(!local_path.exists(), "local copy should be unlinked exactly once");
    drop(transfer);

    let output_bytes = std::fs::read(&output_log_path).unwrap();
    assert!(!output_bytes.is_empty(), "expected one OT_OTHER_PROC_DELETE output record");
    let delete_bytes = std::fs::read(&delete_log_path).unwrap();
    let delete_record = afd_core::logs::DeleteLogRecord::decode(&delete_bytes[..delete_bytes.len() - 1]).unwrap();
    assert!(delete_record.reason.contains("FILE_CURRENTLY_TRANSMITTED"));
}

/// Scenario 6: with `timeout_transfer` enabled and the server throttling to
/// zero throughput after 1 KiB, the worker exits on the benign
/// `STILL_FILES_TO_SEND` path once `transfer_timeout` elapses, and the
/// host's connection counter is decremented back to zero on `quit`.
#[tokio::test]
async fn scenario_6_stalled_transfer_exits_still_files_to_send() {
    // Setup
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("z"), vec![0u8; 4096]).unwrap();
    let mut settings = default_settings();
    settings.timeout_transfer = true;
    settings.transfer_timeout = Duration::from_millis(200);
    settings.block_size = 256;
    let mut ctx = make_ctx(dir.path(), 1, 11, settings);
    ctx.client.throttle_after(1024, Duration::from_millis(400));

    // Execute
    connect_and_login(&mut ctx, &connect_params(), LockingMode::None).await.unwrap();
    assert_eq!(ctx.host_status.host(0).unwrap().active_transfers, 1);

    let mut manifest = BatchManifest::new(dir.path().to_path_buf());
    manifest.entries.push(ManifestEntry { file_name: "z".into(), file_size: 4096, mtime: None });
    let outcome = run_batch(&mut ctx, manifest, LockingMode::None).await.unwrap();
    quit(&mut ctx).await;

    // Verify
    assert!(outcome.still_files_to_send);
    assert_eq!(ctx.host_status.host(0).unwrap().active_transfers, 0);
    let guard = ctx.host_status.lock(0, LockRegion::Con);
    assert!(guard.is_ok(), "no stale lock should remain after exit");
}
