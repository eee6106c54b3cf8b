//! Worker context: the single owner of per-invocation mutable state
//! (§9 redesign flag: "global mutable state → `WorkerCtx`").

use std::time::Duration;

use crate::dedup::DuplicateGuard;
use crate::ftp::{FtpClient, TlsAuthMode};
use crate::logs::{DeleteLogEmitter, OutputLogEmitter};
use crate::rate::{Keepalive, StallGuard, TransferRateLimiter};
use crate::ssp::{HostStatusTable, SystemClock};

/// Per-slot host connection settings read from the Host Status Entry at
/// worker start (§4.3 INIT).
#[derive(Debug, Clone)]
pub struct HostSettings {
    pub host_alias: String,
    pub block_size: u32,
    pub trl_per_process: Option<u64>,
    pub transfer_timeout: Duration,
    pub keep_alive_timeout: Duration,
    pub stat_keepalive: bool,
    pub timeout_transfer: bool,
    pub fast_cd: bool,
    pub target_dir: String,
    pub lock_file_name: Option<String>,
    pub archive_time_secs: u64,
    pub archive_dir: Option<std::path::PathBuf>,
    pub dup_check_timeout: Duration,
    pub rename_file_busy: bool,
    pub keep_time_stamp: bool,
    pub check_size: bool,
    pub debug: bool,
    /// `db.tls_auth` (§4.3 AUTH_TLS, §4.3.1 step 6, §4.3 LOCKFILE): gates
    /// `auth_data()` calls on `Both` specifically, distinct from the
    /// control-channel-only `Yes`.
    pub tls_auth: TlsAuthMode,
    /// `EXEC_FTP` / `db.special_ptr` (§4.3.1 step 15): the per-file `SITE`
    /// command to run after delivery, independent of the LOCKFILE marker
    /// name in `lock_file_name`.
    pub exec_ftp: Option<String>,
}

/// Everything one worker invocation needs, owned in one place rather than
/// threaded through as loose globals.
pub struct WorkerCtx<C: FtpClient> {
    pub host_status: HostStatusTable,
    pub host_pos: u32,
    pub slot_index: usize,
    pub job_id: u32,
    pub settings: HostSettings,
    pub client: C,
    pub dedup: DuplicateGuard,
    pub rate_limiter: TransferRateLimiter,
    pub keepalive: Keepalive,
    pub clock: SystemClock,
    pub output_log: Option<OutputLogEmitter>,
    pub delete_log: Option<DeleteLogEmitter>,
    pub retries: u32,
    pub no_archive: bool,
    pub resend: bool,
    pub toggle_host: bool,
}

impl<C: FtpClient> WorkerCtx<C> {
    #[must_use]
    pub fn new_stall_guard(&self, now: std::time::Instant) -> StallGuard {
        StallGuard::start(self.settings.transfer_timeout, now)
    }
}
