//! CLI entry point for the AFD sender worker (§4.3 INIT through EXIT).
//!
//! Wires the CLI surface (`afd_core::cli::Args`) to a message file parse, a
//! `WorkerCtx` built around a real `SuppaftpClient`, and the state machine in
//! `afd_core::worker`, then maps the outcome to one of the taxonomy exit
//! codes the supervisor reads back from `wait(2)`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};

use afd_core::cli::Args;
use afd_core::control::{LogFifoSink, WakeFifo};
use afd_core::dedup::DuplicateGuard;
use afd_core::ftp::suppaftp_client::SuppaftpClient;
use afd_core::ftp::{TlsAuthMode, TransferType};
use afd_core::logs::{DeleteLogEmitter, OutputLogEmitter};
use afd_core::message::JobMessage;
use afd_core::rate::{Keepalive, TransferRateLimiter};
use afd_core::ssp::{HostStatusEntry, HostStatusTable, SystemClock};
use afd_core::taxonomy::TaxonomyError;
use afd_core::worker::ctx::{HostSettings, WorkerCtx};
use afd_core::worker::manifest::{BatchManifest, ManifestEntry};
use afd_core::worker::rename::LockingMode;
use afd_core::worker::signals::{install_crash_handlers, wait_for_shutdown};
use afd_core::worker::{connect_and_login, quit, run_batch, ConnectParams};

/// Non-taxonomy exit code for a message file this worker cannot act on at
/// all (missing, unparsable, unsupported scheme). The supervisor removes the
/// message on sight of this code rather than retrying it (§6).
const MESSAGE_REJECTED_EXIT: i32 = 70;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // SAFETY: called once, before any other thread or the async runtime has
    // started doing real work (§4.3 INIT: "install signal handlers").
    unsafe {
        install_crash_handlers();
    }

    let args = Args::parse();
    init_tracing(args.retries > 0);
    debug!(?args, "afd_sender starting");

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "worker exited on a local failure");
            MESSAGE_REJECTED_EXIT
        }
    };
    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Runs one worker invocation end to end and returns the process exit code
/// (§4.8: either a `TaxonomyError::exit_code()` or [`MESSAGE_REJECTED_EXIT`]).
async fn run(args: Args) -> Result<i32> {
    let msg_path = args.work_dir.join(&args.msg_name);
    let msg_text = match std::fs::read_to_string(&msg_path) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %msg_path.display(), error = %e, "message file unreadable, removing job");
            return Ok(MESSAGE_REJECTED_EXIT);
        }
    };
    let message = match JobMessage::parse(&msg_text) {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %msg_path.display(), error = %e, "message file rejected, removing job");
            return Ok(MESSAGE_REJECTED_EXIT);
        }
    };

    let settings = build_host_settings(&message, &args);
    let connect_params = build_connect_params(&message, &settings)?;
    let locking = locking_mode_from(&message);

    let host_status = open_host_status(&args, &settings)?;
    let output_log = env_log_path("AFD_OUTPUT_LOG_FIFO").and_then(|p| open_output_log(&p));
    let delete_log = env_log_path("AFD_DELETE_LOG_FIFO").and_then(|p| open_delete_log(&p));
    let trl_per_process = settings.trl_per_process;

    let mut ctx = WorkerCtx {
        host_status,
        // The table this invocation opens (see `open_host_status`) holds
        // exactly one entry, regardless of `host_status_id` — that value
        // only selects which lock file on disk backs it. Position 0 is
        // therefore always the right index into `ctx.host_status`.
        host_pos: 0,
        slot_index: args.host_status_pos as usize,
        job_id: args.job_no,
        settings,
        client: SuppaftpClient::new(),
        dedup: DuplicateGuard::new(),
        rate_limiter: TransferRateLimiter::new(trl_per_process),
        keepalive: Keepalive::new(connect_params.placeholder_timeout, std::time::Instant::now()),
        clock: SystemClock,
        output_log,
        delete_log,
        retries: args.retries,
        no_archive: args.no_archive,
        resend: args.resend,
        toggle_host: args.toggle,
    };

    let manifest = build_manifest(&args.work_dir, &args.msg_name, args.age_limit.or(message.age_limit))
        .context("failed to scan the staging directory")?;

    let batch = async {
        connect_and_login(&mut ctx, &connect_params.params, locking).await?;
        let outcome = run_batch(&mut ctx, manifest, locking).await?;
        quit(&mut ctx).await;
        Ok::<_, TaxonomyError>(outcome)
    };

    tokio::select! {
        result = batch => {
            match result {
                Ok(outcome) => {
                    info!(summary = %outcome.summary_line(), "batch finished");
                    if outcome.still_files_to_send {
                        Ok(TaxonomyError::StillFilesToSend.exit_code() as i32)
                    } else {
                        Ok(TaxonomyError::Success.exit_code() as i32)
                    }
                }
                Err(e) => {
                    error!(error = %e, exit_code = e.exit_code(), "batch aborted");
                    Ok(e.exit_code() as i32)
                }
            }
        }
        reason = wait_for_shutdown() => {
            let reason = reason.context("signal handler registration failed")?;
            let mid_handoff = ctx
                .host_status
                .host(ctx.host_pos)
                .and_then(|h| h.slots.get(ctx.slot_index))
                .map(|s| s.is_mid_handoff())
                .unwrap_or(false);
            info!(?reason, mid_handoff, "shutting down on signal");
            if mid_handoff {
                Ok(TaxonomyError::Success.exit_code() as i32)
            } else {
                Ok(TaxonomyError::GotKilled.exit_code() as i32)
            }
        }
    }
}

/// Bundles the fields [`ConnectParams`] needs plus the keepalive seed the
/// original settings don't carry on their own (kept here rather than adding
/// a throwaway field to `ConnectParams` itself).
struct ResolvedConnect {
    params: ConnectParams,
    placeholder_timeout: Duration,
}

fn build_host_settings(message: &JobMessage, args: &Args) -> HostSettings {
    let opt_u32 = |key: &str, default: u32| message.option(key).and_then(|v| v.parse().ok()).unwrap_or(default);
    let opt_u64 = |key: &str| message.option(key).and_then(|v| v.parse::<u64>().ok());
    let opt_bool = |key: &str| message.option(key).map(|v| v == "yes" || v == "true").unwrap_or(false);
    let opt_secs = |key: &str, default: u64| message.option(key).and_then(|v| v.parse().ok()).unwrap_or(default);

    HostSettings {
        host_alias: message.destination.host.clone(),
        block_size: opt_u32("block-size", 4096),
        trl_per_process: opt_u64("transfer-rate-limit"),
        transfer_timeout: Duration::from_secs(opt_secs("transfer-timeout", 60)),
        keep_alive_timeout: Duration::from_secs(opt_secs("keep-alive-timeout", 30)),
        stat_keepalive: message.option("keepalive") == Some("stat"),
        timeout_transfer: opt_bool("timeout-transfer"),
        fast_cd: opt_bool("fast-cd"),
        target_dir: message.destination.path.clone(),
        lock_file_name: message.option("lock-file").map(str::to_string),
        archive_time_secs: if args.no_archive { 0 } else { opt_secs("archive-time", 0) },
        archive_dir: message.option("archive-dir").map(PathBuf::from),
        dup_check_timeout: Duration::from_secs(opt_secs("dup-check-timeout", 0)),
        rename_file_busy: opt_bool("rename-file-busy"),
        keep_time_stamp: opt_bool("keep-time-stamp"),
        check_size: opt_bool("check-size"),
        debug: opt_bool("debug"),
        tls_auth: match message.option("auth-tls") {
            Some("both") => TlsAuthMode::Both,
            Some("yes") => TlsAuthMode::Yes,
            _ => TlsAuthMode::No,
        },
        exec_ftp: message.option("exec-ftp").map(str::to_string),
    }
}

fn build_connect_params(message: &JobMessage, settings: &HostSettings) -> Result<ResolvedConnect> {
    let implicit_tls = message.destination.scheme == "ftps";
    let auth_tls = settings.tls_auth != TlsAuthMode::No;
    let transfer_type = match message.option("type") {
        Some("A") | Some("ascii") => TransferType::Ascii,
        _ => TransferType::Image,
    };

    let params = ConnectParams {
        host: message.destination.host.clone(),
        port: message.destination.port.unwrap_or(if implicit_tls { 990 } else { 21 }),
        implicit_tls,
        strict_verify: message.option("strict-verify") == Some("yes"),
        auth_tls,
        user: message.destination.user.clone().unwrap_or_else(|| "anonymous".to_string()),
        pass: message.destination.password.clone().unwrap_or_default(),
        transfer_type,
        utf8: message.option("utf8") == Some("yes"),
        target_dir: settings.target_dir.clone(),
        create_target_dir: message.option("create-dir") == Some("yes"),
    };
    Ok(ResolvedConnect { params, placeholder_timeout: settings.transfer_timeout })
}

fn locking_mode_from(message: &JobMessage) -> LockingMode {
    match message.option("locking") {
        Some("dot") => LockingMode::Dot,
        Some("dot_vms") => LockingMode::DotVms,
        Some("postfix") => LockingMode::Postfix,
        Some("unique") => LockingMode::UniqueLocking,
        Some("sequence") => LockingMode::SequenceLocking,
        Some("lockfile") => LockingMode::LockFile,
        _ => LockingMode::None,
    }
}

/// Scans `work_dir` for a batch (§3 "staged directory"), splitting files
/// aged past `age_limit` into `pending_delete` rather than the send list.
fn build_manifest(work_dir: &Path, msg_name: &str, age_limit: Option<u32>) -> Result<BatchManifest> {
    let mut manifest = BatchManifest::new(work_dir.to_path_buf());
    let now = std::time::SystemTime::now();

    for entry in std::fs::read_dir(work_dir).context("reading staging directory")? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name == msg_name {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        let aged_out = match (age_limit, metadata.modified()) {
            (Some(limit), Ok(mtime)) => {
                now.duration_since(mtime).map(|age| age > Duration::from_secs(u64::from(limit))).unwrap_or(false)
            }
            _ => false,
        };

        if aged_out {
            manifest.pending_delete.push(file_name);
        } else {
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64);
            manifest.entries.push(ManifestEntry { file_name, file_size: metadata.len(), mtime });
        }
    }

    manifest.entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(manifest)
}

/// Builds the in-memory Host Status table this invocation's slot lives in.
///
/// This standalone CLI has no cross-process supervisor populating a shared
/// mmap Host Status file ahead of time, so it opens (or creates) the
/// byte-range lock file at a path derived from `host_status_id` and seeds a
/// single-entry table sized so `host_status_pos` is a valid slot index. A
/// true multi-worker deployment would instead attach to a Host Status file
/// the dispatcher already populated; see `DESIGN.md` for that decision.
fn open_host_status(args: &Args, settings: &HostSettings) -> Result<HostStatusTable> {
    let ssp_dir = std::env::var("AFD_SSP_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| args.work_dir.parent().unwrap_or(&args.work_dir).join(".afd-ssp"));
    std::fs::create_dir_all(&ssp_dir).context("creating SSP directory")?;
    let lock_path = ssp_dir.join(format!("host-{}.lock", args.host_status_id));

    let slot_count = args.host_status_pos + 1;
    let mut host = HostStatusEntry::new(settings.host_alias.clone(), slot_count);
    host.block_size = settings.block_size;
    host.trl_per_process = settings.trl_per_process;
    host.debug = settings.debug;

    let mut table = HostStatusTable::open(&lock_path, vec![host]).context("opening Host Status table")?;
    if let Some(slot) = table.host_mut(0).and_then(|h| h.slots.get_mut(args.host_status_pos as usize)) {
        slot.job_id = args.job_no;
    }

    if let Ok(wake_path) = std::env::var("AFD_WAKE_FIFO") {
        match WakeFifo::open(Path::new(&wake_path)) {
            Ok(fifo) => table = table.with_wake_fifo(fifo),
            Err(e) => warn!(path = %wake_path, error = %e, "wake FIFO unavailable, continuing without it"),
        }
    }

    Ok(table)
}

fn env_log_path(var: &str) -> Option<PathBuf> {
    std::env::var(var).ok().map(PathBuf::from)
}

fn open_output_log(path: &Path) -> Option<OutputLogEmitter> {
    match LogFifoSink::open(path) {
        Ok(sink) => Some(OutputLogEmitter::new(sink)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "output log FIFO unavailable, continuing without it");
            None
        }
    }
}

fn open_delete_log(path: &Path) -> Option<DeleteLogEmitter> {
    match LogFifoSink::open(path) {
        Ok(sink) => Some(DeleteLogEmitter::new(sink)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "delete log FIFO unavailable, continuing without it");
            None
        }
    }
}
