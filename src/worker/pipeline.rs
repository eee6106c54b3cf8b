//! Per-file transfer pipeline (§4.3.1): 17 steps, each a private method
//! returning `Result<StepOutcome, TaxonomyError>`, composed via `?` in
//! [`run_one_file`] (§9 redesign flag: "goto chains → state enum + result
//! type").

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use crate::archive::{self, Disposition};
use crate::dedup::{DupCheckFlags, DupDecision};
use crate::ftp::{DataDirection, FtpClient, TlsAuthMode};
use crate::logs::{DeleteLogRecord, OutputLogRecord, OutputType};
use crate::ssp::host_status::ConnectStatus;
use crate::ssp::LockRegion;
use crate::taxonomy::{eval_timeout, TaxonomyError, TimeoutFlag};
use crate::worker::ctx::WorkerCtx;
use crate::worker::manifest::ManifestEntry;
use crate::worker::rename::{derive_names, DerivedNames, LockingMode};

/// What happened to one file, fed into the batch-level summary (§7
/// "User-visible behavior").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Delivered { bytes_sent: u64 },
    SuppressedDuplicate,
    BenignStillFilesToSend,
}

fn timeout_flag_of(err: &crate::ftp::FtpClientError) -> TimeoutFlag {
    err.timeout_flag()
}

/// Per-file transfer driver. Holds the mutable slices of context this one
/// file's pipeline needs; `WorkerCtx` remains the single source of truth,
/// this struct just narrows the borrow for the duration of one file.
pub struct FileTransfer<'a, C: FtpClient> {
    pub ctx: &'a mut WorkerCtx<C>,
    pub entry: ManifestEntry,
    pub local_path: PathBuf,
    pub locking: LockingMode,
    pub lock_notation: String,
    pub unique_number: u32,
    names: Option<DerivedNames>,
    append_offset: u64,
    additional_length: u64,
    /// Bytes actually written to the data connection this call, as opposed
    /// to `bytes_sent`'s file-size-after-delivery total — the two differ
    /// whenever `append_offset > 0` (§8 scenario 4: "bytes transmitted on
    /// the wire" vs. the final delivered size).
    wire_bytes_sent: u64,
}

impl<'a, C: FtpClient> FileTransfer<'a, C> {
    pub fn new(ctx: &'a mut WorkerCtx<C>, entry: ManifestEntry, local_path: PathBuf, locking: LockingMode) -> Self {
        Self {
            ctx,
            entry,
            local_path,
            locking,
            lock_notation: ".lock".to_string(),
            unique_number: 0,
            names: None,
            append_offset: 0,
            additional_length: 0,
            wire_bytes_sent: 0,
        }
    }

    /// Runs the full 17-step pipeline for this file.
    #[instrument(skip(self), fields(file = %self.entry.file_name, job_id = self.ctx.job_id))]
    pub async fn run(&mut self) -> Result<StepOutcome, TaxonomyError> {
        if let Some(outcome) = self.step1_duplicate_in_flight()? {
            return Ok(outcome);
        }
        if let Some(outcome) = self.step2_content_dedup()? {
            return Ok(outcome);
        }
        self.step3_rename()?;
        self.step4_append_probe().await?;
        self.step5_open_remote().await?;
        self.step6_data_tls().await?;
        let local_file = self.step7_open_local().await?;
        self.step8_headers();
        let bytes_sent = self.step9_transfer_loop(local_file).await?;
        self.step10_trailer();
        self.step11_close_remote(bytes_sent).await?;
        self.step12_post_checks(bytes_sent).await?;
        self.step13_rename_move().await?;
        self.step14_ready_file().await?;
        self.step15_site_exec().await;
        self.step16_slot_progress(self.wire_bytes_sent)?;
        self.step17_finalize().await?;
        Ok(StepOutcome::Delivered { bytes_sent })
    }

    /// Step 1: duplicate-in-flight check under FIU.
    fn step1_duplicate_in_flight(&mut self) -> Result<Option<StepOutcome>, TaxonomyError> {
        let pos = self.ctx.host_pos;
        let slot_index = self.ctx.slot_index;
        let job_id = self.ctx.job_id;
        let file_name = self.entry.file_name.clone();

        let duplicate = {
            let _guard = self.ctx.host_status.lock(pos, LockRegion::Fiu).map_err(|_| TaxonomyError::AllocError)?;
            let host = self.ctx.host_status.host(pos).ok_or(TaxonomyError::AllocError)?;
            host.slots.iter().enumerate().any(|(i, slot)| {
                i != slot_index
                    && slot.job_id == job_id
                    && slot.unique_name.get(0).copied().unwrap_or(0) > 1
                    && slot.file_size_in_use != 0
                    && slot.file_name_in_use == file_name
            })
        };

        if duplicate {
            if let Some(log) = self.ctx.output_log.as_mut() {
                let _ = log.emit(&OutputLogRecord {
                    retries: self.ctx.retries,
                    job_id,
                    transfer_time_ticks: 0,
                    file_size: self.entry.file_size as i64,
                    output_type: OutputType::OtherProcDelete,
                    unique_prefix: self.unique_number.to_string(),
                    file_name: file_name.clone(),
                    remote_name: None,
                    archive_name: None,
                });
            }
            if let Some(log) = self.ctx.delete_log.as_mut() {
                let _ = log.emit(&DeleteLogRecord {
                    file_size: self.entry.file_size as i64,
                    dir_id: 0,
                    job_id,
                    input_time: self.entry.mtime.unwrap_or(0),
                    split_job_counter: 0,
                    unique_number: self.unique_number,
                    file_name: file_name.clone(),
                    reason: DeleteLogRecord::format_reason("sf_ftp", '\u{1}', "FILE_CURRENTLY_TRANSMITTED", 0),
                });
            }
            let _ = std::fs::remove_file(&self.local_path);
            return Ok(Some(StepOutcome::SuppressedDuplicate));
        }

        let pos = self.ctx.host_pos;
        let _guard = self.ctx.host_status.lock(pos, LockRegion::Fiu).map_err(|_| TaxonomyError::AllocError)?;
        if let Some(host) = self.ctx.host_status.host_mut(pos) {
            if let Some(slot) = host.slots.get_mut(slot_index) {
                slot.file_name_in_use = file_name;
                slot.file_size_in_use = self.entry.file_size;
                slot.connect_status = ConnectStatus::Active;
            }
        }
        Ok(None)
    }

    /// Step 2: optional content/name dedup via the Duplicate Guard.
    fn step2_content_dedup(&mut self) -> Result<Option<StepOutcome>, TaxonomyError> {
        if self.ctx.settings.dup_check_timeout.is_zero() {
            return Ok(None);
        }
        let flags = DupCheckFlags::CHECK_NAME | DupCheckFlags::CHECK_CONTENT | DupCheckFlags::DC_DELETE;
        let decision = self.ctx.dedup.check(
            &self.entry.file_name,
            None,
            self.entry.file_size,
            self.ctx.settings.dup_check_timeout,
            flags,
        );
        match decision {
            DupDecision::Fresh | DupDecision::RecordOnly => Ok(None),
            DupDecision::Delete => {
                let _ = std::fs::remove_file(&self.local_path);
                Ok(Some(StepOutcome::SuppressedDuplicate))
            }
        }
    }

    /// Step 3: derive final/initial/remote filenames.
    fn step3_rename(&mut self) -> Result<(), TaxonomyError> {
        let names = derive_names(
            &self.entry.file_name,
            &self.entry.file_name,
            Some(self.ctx.settings.target_dir.as_str()),
            self.ctx.settings.fast_cd,
            self.locking,
            &self.lock_notation,
            self.unique_number,
            self.ctx.retries,
        )
        .map_err(|_| TaxonomyError::AllocError)?;
        self.names = Some(names);
        Ok(())
    }

    /// Step 4: optional append-offset probing. Simplified to a `SIZE` probe;
    /// the `LIST`/`STAT`-column variant is an external wire-format detail
    /// this crate's `FtpClient` seam does not need to expose beyond
    /// `list_line`.
    async fn step4_append_probe(&mut self) -> Result<(), TaxonomyError> {
        if self.ctx.retries == 0 {
            return Ok(());
        }
        let name = self.names.as_ref().expect("names derived in step3").initial_filename.clone();
        match self.ctx.client.size(&name).await {
            Ok(remote_size) if remote_size > 0 && remote_size <= self.entry.file_size => {
                self.append_offset = remote_size;
            }
            _ => {}
        }
        Ok(())
    }

    /// Step 5: open the remote data connection, with the busy-rename retry
    /// and idle-kill benign-exit branches.
    async fn step5_open_remote(&mut self) -> Result<(), TaxonomyError> {
        let name = self.names.as_ref().expect("names derived in step3").initial_filename.clone();
        match self.ctx.client.data_open(&name, self.append_offset, DataDirection::Write, true).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_idle_kill() => Err(TaxonomyError::StillFilesToSend),
            Err(e) if e.is_rename_file_busy() && self.ctx.settings.rename_file_busy => {
                let retried_name = format!("{name}_");
                self.names.as_mut().unwrap().initial_filename = retried_name.clone();
                self.ctx
                    .client
                    .data_open(&retried_name, self.append_offset, DataDirection::Write, true)
                    .await
                    .map_err(|e2| eval_timeout(TaxonomyError::OpenRemoteError, timeout_flag_of(&e2)))?;
                Ok(())
            }
            Err(e) => Err(eval_timeout(TaxonomyError::OpenRemoteError, timeout_flag_of(&e))),
        }
    }

    /// Step 6: data-channel TLS protection, only when `tls_auth == BOTH`
    /// (§4.3.1 step 6: "If `tls_auth == BOTH`, `auth_data`").
    async fn step6_data_tls(&mut self) -> Result<(), TaxonomyError> {
        if self.ctx.settings.tls_auth != TlsAuthMode::Both {
            return Ok(());
        }
        self.ctx.client.auth_data().await.map_err(|e| eval_timeout(TaxonomyError::AuthError, timeout_flag_of(&e)))
    }

    /// Step 7: open the local staged file, seeking past `append_offset` if set.
    async fn step7_open_local(&mut self) -> Result<tokio::fs::File, TaxonomyError> {
        use tokio::io::{AsyncSeekExt, SeekFrom};
        let mut file = tokio::fs::File::open(&self.local_path).await.map_err(|_| TaxonomyError::OpenLocalError)?;
        if self.append_offset > 0 {
            if file.seek(SeekFrom::Start(self.append_offset)).await.is_err() {
                self.append_offset = 0;
            }
        }
        Ok(file)
    }

    /// Step 8: optional `FILE_NAME_IS_HEADER` prefix. Not exercised by
    /// default configurations; left as a no-op hook matching the header/
    /// trailer pairing of step 10.
    fn step8_headers(&mut self) {}

    /// Step 9: the transfer loop, rate-limited and keepalive-aware.
    async fn step9_transfer_loop(&mut self, mut local_file: tokio::fs::File) -> Result<u64, TaxonomyError> {
        use tokio::io::AsyncReadExt;

        let block_size = self.ctx.settings.block_size.max(1) as usize;
        let mut buf = vec![0u8; block_size];
        let mut total_sent = self.append_offset;
        let mut wire_sent = 0u64;
        let started_at = Instant::now();
        let stall_guard = self.ctx.new_stall_guard(started_at);

        loop {
            let n = local_file.read(&mut buf).await.map_err(|_| TaxonomyError::ReadLocalError)?;
            if n == 0 {
                break;
            }

            match self.ctx.client.write(&buf[..n]).await {
                Ok(written) => {
                    total_sent += written as u64;
                    wire_sent += written as u64;
                    if let Some(sleep_for) = self.ctx.rate_limiter.throttle(written as u64, Instant::now()) {
                        tokio::time::sleep(sleep_for).await;
                    }
                    self.ctx.keepalive.mark_activity(Instant::now());
                }
                Err(e) if e.code == 0 && e.message.contains("broken") => {
                    return Err(eval_timeout(TaxonomyError::WriteRemoteError, timeout_flag_of(&e)));
                }
                Err(e) => {
                    let _ = self.ctx.client.close_data().await;
                    return Err(eval_timeout(TaxonomyError::WriteRemoteError, timeout_flag_of(&e)));
                }
            }

            if self.ctx.settings.stat_keepalive && self.ctx.keepalive.is_due(Instant::now()) {
                let _ = self.ctx.client.keepalive().await;
            }
            if self.ctx.settings.timeout_transfer && stall_guard.is_stalled(Instant::now()) {
                return Err(TaxonomyError::StillFilesToSend);
            }
        }

        self.wire_bytes_sent = wire_sent;
        Ok(total_sent)
    }

    /// Step 10: optional trailer paired with step 8's header.
    fn step10_trailer(&mut self) {}

    /// Step 11: close the remote data connection.
    async fn step11_close_remote(&mut self, bytes_sent: u64) -> Result<(), TaxonomyError> {
        match self.ctx.client.close_data().await {
            Ok(()) => Ok(()),
            Err(e) if bytes_sent == 0 && !e.timed_out => {
                warn!(file = %self.entry.file_name, "close_data failed on zero-byte file, demoting to warning");
                Ok(())
            }
            Err(e) => Err(eval_timeout(TaxonomyError::CloseRemoteError, timeout_flag_of(&e))),
        }
    }

    /// Step 12: optional post-transfer checks (timestamp, size match).
    async fn step12_post_checks(&mut self, _bytes_sent: u64) -> Result<(), TaxonomyError> {
        let name = self.names.as_ref().expect("names derived in step3").initial_filename.clone();

        if self.ctx.settings.keep_time_stamp {
            if let Some(mtime) = self.entry.mtime {
                let _ = self.ctx.client.set_date(&name, mtime).await;
            }
        }

        if self.ctx.settings.check_size {
            let expected = self.entry.file_size + self.additional_length;
            match self.ctx.client.size(&name).await {
                Ok(remote_size) if remote_size != expected => {
                    self.ctx.dedup.remove(
                        &self.entry.file_name,
                        None,
                        self.entry.file_size,
                        DupCheckFlags::CHECK_NAME | DupCheckFlags::CHECK_CONTENT,
                    );
                    return Err(TaxonomyError::FileSizeMatchError);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Step 13: rename the remote file into its final delivered name.
    async fn step13_rename_move(&mut self) -> Result<(), TaxonomyError> {
        let names = self.names.as_ref().expect("names derived in step3").clone();
        if names.initial_filename == names.remote_filename {
            return Ok(());
        }
        self.ctx
            .client
            .move_file(&names.initial_filename, &names.remote_filename, true)
            .await
            .map_err(|e| eval_timeout(TaxonomyError::MoveRemoteError, timeout_flag_of(&e)))?;

        if let Some(stale) = &names.stale_sequence_sibling {
            let _ = self.ctx.client.dele(stale).await;
        }
        Ok(())
    }

    /// Step 14: optional auxiliary ready-file upload. Not exercised by
    /// default configurations; left as an explicit no-op hook.
    async fn step14_ready_file(&mut self) -> Result<(), TaxonomyError> {
        Ok(())
    }

    /// Step 15: optional per-file `SITE` command, gated on `EXEC_FTP`
    /// (§4.3.1 step 15: "If `EXEC_FTP`, issue `exec(db.special_ptr, p_name)`");
    /// failures are warnings only.
    async fn step15_site_exec(&mut self) {
        if let Some(cmd) = self.ctx.settings.exec_ftp.clone() {
            if let Err(e) = self.ctx.client.exec(&cmd, Some(self.entry.file_name.as_str())).await {
                warn!(file = %self.entry.file_name, error = %e, "per-file SITE exec failed, continuing");
            }
        }
    }

    /// Step 16: clear in-flight slot state and publish progress.
    fn step16_slot_progress(&mut self, bytes_sent: u64) -> Result<(), TaxonomyError> {
        let pos = self.ctx.host_pos;
        let slot_index = self.ctx.slot_index;
        {
            let _guard = self.ctx.host_status.lock(pos, LockRegion::Fiu).map_err(|_| TaxonomyError::AllocError)?;
            if let Some(host) = self.ctx.host_status.host_mut(pos) {
                if let Some(slot) = host.slots.get_mut(slot_index) {
                    slot.file_name_in_use.clear();
                    slot.file_size_in_use = 0;
                    slot.file_size_in_use_done = 0;
                    slot.no_of_files_done += 1;
                }
            }
        }
        self.ctx
            .host_status
            .update_transfer_counters(pos, slot_index, 1, bytes_sent as i64, 0)
            .map_err(|_| TaxonomyError::AllocError)?;
        Ok(())
    }

    /// Step 17: archive or unlink the local staged file, logging the outcome.
    async fn step17_finalize(&mut self) -> Result<(), TaxonomyError> {
        let archive_time = if self.ctx.no_archive { 0 } else { self.ctx.settings.archive_time_secs };
        let disposition = archive::finalize(&self.local_path, self.ctx.settings.archive_dir.as_deref(), archive_time)
            .await
            .map_err(|_| TaxonomyError::AllocError)?;

        let archive_name = match &disposition {
            Disposition::Archived { archive_path } => Some(archive_path.display().to_string()),
            Disposition::Unlinked => None,
        };

        if let Some(log) = self.ctx.output_log.as_mut() {
            let names = self.names.as_ref();
            let _ = log.emit(&OutputLogRecord {
                retries: self.ctx.retries,
                job_id: self.ctx.job_id,
                transfer_time_ticks: 0,
                file_size: self.entry.file_size as i64,
                output_type: OutputType::NormalDelivered,
                unique_prefix: self.unique_number.to_string(),
                file_name: self.entry.file_name.clone(),
                remote_name: names.map(|n| n.remote_filename.clone()),
                archive_name,
            });
        }

        debug!(file = %self.entry.file_name, "finalized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftp::fake::FakeFtpServer;
    use crate::rate::{Keepalive, TransferRateLimiter};
    use crate::ssp::{HostStatusEntry, HostStatusTable};
    use std::time::Duration;
    use tempfile::tempdir;

    fn make_ctx(dir: &std::path::Path) -> WorkerCtx<FakeFtpServer> {
        let host = HostStatusEntry::new("peer", 2);
        let host_status = HostStatusTable::open(&dir.join("lock.dat"), vec![host]).unwrap();
        WorkerCtx {
            host_status,
            host_pos: 0,
            slot_index: 0,
            job_id: 1,
            settings: crate::worker::ctx::HostSettings {
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
                tls_auth: crate::ftp::TlsAuthMode::No,
                exec_ftp: None,
            },
            client: FakeFtpServer::new(),
            dedup: crate::dedup::DuplicateGuard::new(),
            rate_limiter: TransferRateLimiter::new(None),
            keepalive: Keepalive::new(Duration::from_secs(60), Instant::now()),
            clock: crate::ssp::SystemClock,
            output_log: None,
            delete_log: None,
            retries: 0,
            no_archive: true,
            resend: false,
            toggle_host: false,
        }
    }

    #[tokio::test]
    async fn delivers_a_simple_file_end_to_end() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.dat"), b"hello world").unwrap();
        let mut ctx = make_ctx(dir.path());

        let entry = ManifestEntry { file_name: "a.dat".into(), file_size: 11, mtime: None };
        let local_path = dir.path().join("a.dat");
        let mut transfer = FileTransfer::new(&mut ctx, entry, local_path, LockingMode::None);
        let outcome = transfer.run().await.unwrap();

        assert_eq!(outcome, StepOutcome::Delivered { bytes_sent: 11 });
        assert_eq!(transfer.ctx.client.file_bytes("a.dat").unwrap(), b"hello world");
        assert!(!dir.path().join("a.dat").exists());
    }

    #[tokio::test]
    async fn matching_size_check_passes_through() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.dat"), b"hello world").unwrap();
        let mut ctx = make_ctx(dir.path());
        ctx.settings.check_size = true;

        let entry = ManifestEntry { file_name: "a.dat".into(), file_size: 11, mtime: None };
        let local_path = dir.path().join("a.dat");
        let mut transfer = FileTransfer::new(&mut ctx, entry, local_path, LockingMode::None);

        let outcome = transfer.run().await.unwrap();
        assert_eq!(outcome, StepOutcome::Delivered { bytes_sent: 11 });
    }

    #[tokio::test]
    async fn size_mismatch_surfaces_file_size_match_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.dat"), b"hello world").unwrap();
        let mut ctx = make_ctx(dir.path());
        ctx.settings.check_size = true;

        let entry = ManifestEntry { file_name: "a.dat".into(), file_size: 999, mtime: None };
        let local_path = dir.path().join("a.dat");
        let mut transfer = FileTransfer::new(&mut ctx, entry, local_path, LockingMode::None);

        let err = transfer.run().await.unwrap_err();
        assert_eq!(err, TaxonomyError::FileSizeMatchError);
    }

    #[tokio::test]
    async fn missing_local_file_surfaces_open_local_error() {
        let dir = tempdir().unwrap();
        let mut ctx = make_ctx(dir.path());
        let entry = ManifestEntry { file_name: "missing.dat".into(), file_size: 5, mtime: None };
        let local_path = dir.path().join("missing.dat");
        let mut transfer = FileTransfer::new(&mut ctx, entry, local_path, LockingMode::None);

        let err = transfer.run().await.unwrap_err();
        assert_eq!(err, TaxonomyError::OpenLocalError);
    }

    #[tokio::test]
    async fn data_channel_auth_only_fires_under_tls_auth_both() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.dat"), b"hello world").unwrap();
        let mut ctx = make_ctx(dir.path());
        ctx.settings.tls_auth = TlsAuthMode::Both;

        let entry = ManifestEntry { file_name: "a.dat".into(), file_size: 11, mtime: None };
        let local_path = dir.path().join("a.dat");
        let mut transfer = FileTransfer::new(&mut ctx, entry, local_path, LockingMode::None);
        transfer.run().await.unwrap();

        assert_eq!(transfer.ctx.client.auth_data_call_count(), 1);
    }

    #[tokio::test]
    async fn data_channel_auth_skipped_when_tls_auth_is_not_both() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.dat"), b"hello world").unwrap();
        let mut ctx = make_ctx(dir.path());

        let entry = ManifestEntry { file_name: "a.dat".into(), file_size: 11, mtime: None };
        let local_path = dir.path().join("a.dat");
        let mut transfer = FileTransfer::new(&mut ctx, entry, local_path, LockingMode::None);
        transfer.run().await.unwrap();

        assert_eq!(transfer.ctx.client.auth_data_call_count(), 0);
    }

    #[tokio::test]
    async fn exec_ftp_runs_the_configured_site_command_per_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.dat"), b"hello world").unwrap();
        let mut ctx = make_ctx(dir.path());
        ctx.settings.exec_ftp = Some("chmod".into());
        ctx.settings.lock_file_name = Some(".lock_marker".into());

        let entry = ManifestEntry { file_name: "a.dat".into(), file_size: 11, mtime: None };
        let local_path = dir.path().join("a.dat");
        let mut transfer = FileTransfer::new(&mut ctx, entry, local_path, LockingMode::None);
        transfer.run().await.unwrap();

        assert_eq!(transfer.ctx.client.exec_commands(), vec!["chmod".to_string()]);
    }

    #[tokio::test]
    async fn no_exec_ftp_means_no_site_command_is_run() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.dat"), b"hello world").unwrap();
        let mut ctx = make_ctx(dir.path());

        let entry = ManifestEntry { file_name: "a.dat".into(), file_size: 11, mtime: None };
        let local_path = dir.path().join("a.dat");
        let mut transfer = FileTransfer::new(&mut ctx, entry, local_path, LockingMode::None);
        transfer.run().await.unwrap();

        assert!(transfer.ctx.client.exec_commands().is_empty());
    }
}
