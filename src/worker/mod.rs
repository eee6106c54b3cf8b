//! Worker state machine (§4.3): `INIT → CONNECTED → AUTH_TLS? → LOGIN → TUNE
//! → CD → LOCKFILE? → READY → {PER_FILE}* → CLEANUP → BURST_LOOP? → QUIT →
//! EXIT`. The per-file pipeline itself lives in [`pipeline`]; this module
//! owns everything around it.

pub mod burst;
pub mod ctx;
pub mod manifest;
pub mod pipeline;
pub mod rename;
pub mod signals;

use tracing::{info, instrument, warn};

use crate::ftp::{DataDirection, FtpClient, TlsAuthMode, TransferType};
use crate::ssp::LockRegion;
use crate::taxonomy::{eval_timeout, TaxonomyError, TimeoutFlag};

use ctx::WorkerCtx;
use manifest::BatchManifest;
use pipeline::{FileTransfer, StepOutcome};
use rename::LockingMode;

fn timeout_flag_of(err: &crate::ftp::FtpClientError) -> TimeoutFlag {
    err.timeout_flag()
}

/// Everything needed to bring up the control connection (§4.3 CONNECTED
/// through CD).
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub implicit_tls: bool,
    pub strict_verify: bool,
    pub auth_tls: bool,
    pub user: String,
    pub pass: String,
    pub transfer_type: TransferType,
    pub utf8: bool,
    pub target_dir: String,
    pub create_target_dir: bool,
}

/// Batch-level summary, feeding the single info-log line a worker emits on
/// exit (§7 "User-visible behavior": `"<bytes> in <files> files send (+
/// [APPEND x N] [BURST x M]) #<job-id>"`, `"[Zero size] "` prefix when every
/// file in the batch was zero-length).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub files_delivered: u32,
    pub bytes_delivered: u64,
    pub files_appended: u32,
    pub burst_iterations: u32,
    pub job_id: u32,
    pub zero_size: bool,
    /// Set when the batch ended on a benign `STILL_FILES_TO_SEND` exit
    /// (§4.3.1 steps 5/9) rather than delivering every manifest entry; the
    /// CLI uses this to pick the exit code the supervisor re-queues on.
    pub still_files_to_send: bool,
}

impl WorkerOutcome {
    #[must_use]
    pub fn summary_line(&self) -> String {
        let mut line = String::new();
        if self.zero_size {
            line.push_str("[Zero size] ");
        }
        line.push_str(&format!("{} in {} files send", self.bytes_delivered, self.files_delivered));
        if self.files_appended > 0 {
            line.push_str(&format!(" [APPEND x {}]", self.files_appended));
        }
        if self.burst_iterations > 0 {
            line.push_str(&format!(" [BURST x {}]", self.burst_iterations));
        }
        line.push_str(&format!(" #{}", self.job_id));
        line
    }
}

/// `CONNECTED → AUTH_TLS? → LOGIN → TUNE → CD → LOCKFILE?` (§4.3). Call once
/// per control connection; a burst loop that keeps the same connection skips
/// this and calls [`run_batch`] again directly. `locking` selects whether
/// the batch-level lock marker (§4.3 LOCKFILE) is created.
#[instrument(skip(ctx, params), fields(host = %params.host))]
pub async fn connect_and_login<C: FtpClient>(
    ctx: &mut WorkerCtx<C>,
    params: &ConnectParams,
    locking: LockingMode,
) -> Result<(), TaxonomyError> {
    ctx.client
        .connect(&params.host, params.port, params.implicit_tls, params.strict_verify)
        .await
        .map_err(|e| eval_timeout(TaxonomyError::ConnectError, timeout_flag_of(&e)))?;

    if params.auth_tls {
        ctx.client
            .auth_tls(params.strict_verify)
            .await
            .map_err(|e| eval_timeout(TaxonomyError::AuthError, timeout_flag_of(&e)))?;
    }

    ctx.client
        .user(&params.user)
        .await
        .map_err(|e| eval_timeout(TaxonomyError::UserError, timeout_flag_of(&e)))?;
    ctx.client
        .pass(&params.pass)
        .await
        .map_err(|e| eval_timeout(TaxonomyError::PasswordError, timeout_flag_of(&e)))?;

    ctx.client
        .transfer_type(params.transfer_type)
        .await
        .map_err(|e| eval_timeout(TaxonomyError::TypeError, timeout_flag_of(&e)))?;
    if params.utf8 {
        let _ = ctx.client.utf8_on().await;
    }

    ctx.client
        .cd(&params.target_dir, params.create_target_dir)
        .await
        .map_err(|e| eval_timeout(TaxonomyError::ChdirError, timeout_flag_of(&e)))?;

    if locking == LockingMode::LockFile {
        if let Some(lock_file) = ctx.settings.lock_file_name.clone() {
            if ctx.settings.tls_auth == TlsAuthMode::Both {
                ctx.client
                    .auth_data()
                    .await
                    .map_err(|e| eval_timeout(TaxonomyError::AuthError, timeout_flag_of(&e)))?;
            }
            ctx.client
                .data_open(&lock_file, 0, DataDirection::Write, false)
                .await
                .map_err(|e| eval_timeout(TaxonomyError::WriteLockError, timeout_flag_of(&e)))?;
            ctx.client
                .close_data()
                .await
                .map_err(|e| eval_timeout(TaxonomyError::WriteLockError, timeout_flag_of(&e)))?;
        }
    }

    {
        let pos = ctx.host_pos;
        let _guard = ctx.host_status.lock(pos, LockRegion::Con).map_err(|_| TaxonomyError::AllocError)?;
        if let Some(host) = ctx.host_status.host_mut(pos) {
            host.active_transfers = host.active_transfers.saturating_add(1);
        }
    }

    ctx.keepalive.mark_activity(std::time::Instant::now());
    Ok(())
}

/// `READY → {PER_FILE}* → CLEANUP` (§4.3) for one batch manifest. Processes
/// the pending-delete list first (files that aged out before the transfer
/// started), then delivers every remaining file through the per-file
/// pipeline. The first recoverable error aborts the remaining files in the
/// batch (so the supervisor can re-queue them) rather than skipping just the
/// failing file.
#[instrument(skip(ctx, manifest), fields(job_id = ctx.job_id, files = manifest.files_to_send()))]
pub async fn run_batch<C: FtpClient>(
    ctx: &mut WorkerCtx<C>,
    manifest: BatchManifest,
    locking: LockingMode,
) -> Result<WorkerOutcome, TaxonomyError> {
    let zero_size = manifest.is_zero_size();
    let mut outcome = WorkerOutcome { job_id: ctx.job_id, zero_size, ..Default::default() };

    for name in &manifest.pending_delete {
        let local_path = manifest.staging_dir.join(name);
        let _ = ctx.client.dele(name).await;
        let _ = std::fs::remove_file(&local_path);
    }

    let staging_dir = manifest.staging_dir.clone();
    for entry in manifest.entries {
        let local_path = staging_dir.join(&entry.file_name);
        let had_append_candidate = ctx.retries > 0;
        let mut transfer = FileTransfer::new(ctx, entry, local_path, locking);
        match transfer.run().await {
            Ok(StepOutcome::Delivered { bytes_sent }) => {
                outcome.files_delivered += 1;
                outcome.bytes_delivered += bytes_sent;
                if had_append_candidate {
                    outcome.files_appended += 1;
                }
            }
            Ok(StepOutcome::SuppressedDuplicate) => {}
            Err(TaxonomyError::StillFilesToSend) => {
                outcome.still_files_to_send = true;
                return Ok(outcome);
            }
            Err(e) if e.is_benign() => return Ok(outcome),
            Err(e) => return Err(e),
        }
    }

    info!(job_id = ctx.job_id, summary = %outcome.summary_line(), "batch complete");
    Ok(outcome)
}

/// `QUIT → EXIT` (§4.3): best-effort, its failure never changes the exit
/// code the batch already determined.
pub async fn quit<C: FtpClient>(ctx: &mut WorkerCtx<C>) {
    if let Err(e) = ctx.client.quit().await {
        warn!(error = %e, "QUIT failed on shutdown, exiting anyway");
    }

    let pos = ctx.host_pos;
    if let Ok(_guard) = ctx.host_status.lock(pos, LockRegion::Con) {
        if let Some(host) = ctx.host_status.host_mut(pos) {
            host.active_transfers = host.active_transfers.saturating_sub(1);
        }
    }
}
