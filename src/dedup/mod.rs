//! Duplicate Guard (DG): content/name fingerprint with TTL, insert-once-per-file
//! idempotent delivery (§3 "Duplicate Guard Record", §4.4).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bitflags::bitflags;
use dashmap::DashMap;

bitflags! {
    /// Per-check behavior flags (§3, §4.4).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DupCheckFlags: u8 {
        const CHECK_CONTENT = 0x01;
        const CHECK_NAME    = 0x02;
        const DC_DELETE     = 0x04;
        const STORE_CRC     = 0x08;
    }
}

/// A content/name fingerprint, computed the way the caller's `flags` direct
/// (§4.4: `isdup(path, name, size, crc_id, ttl, flags, ...)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// FNV-1a over the selected inputs. Stand-in for the legacy CRC-32
    /// fingerprint; any collision-resistant hash satisfies the guard's
    /// contract, which only needs equality, not a specific algorithm.
    #[must_use]
    pub fn compute(name: &str, content: Option<&[u8]>, size: u64, flags: DupCheckFlags) -> Self {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        let mut feed = |bytes: &[u8]| {
            for &b in bytes {
                hash ^= u64::from(b);
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
        };
        if flags.contains(DupCheckFlags::CHECK_NAME) {
            feed(name.as_bytes());
        }
        if flags.contains(DupCheckFlags::CHECK_CONTENT) {
            feed(&size.to_le_bytes());
            if let Some(bytes) = content {
                feed(bytes);
            }
        }
        Self(hash)
    }
}

#[derive(Debug, Clone, Copy)]
struct Record {
    deadline: SystemTime,
}

/// What the caller should do with the file under consideration (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DupDecision {
    /// Not a duplicate; a record was inserted and the file should be sent.
    Fresh,
    /// A duplicate hit under `DC_DELETE`: unlink without sending.
    Delete,
    /// A duplicate hit under `STORE_CRC` only: record the hit, still send.
    RecordOnly,
}

/// Process-shared (in this crate: in-process) TTL-keyed duplicate map.
///
/// A true multi-process deployment would back this with an mmap table
/// alongside the other SSP tables (documented as an open swap in
/// `DESIGN.md`); the `dashmap`-backed map here gives the same insert-once,
/// lazily-evicted semantics for a single worker process and for tests.
#[derive(Default)]
pub struct DuplicateGuard {
    records: DashMap<Fingerprint, Record>,
}

impl DuplicateGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `isdup` (§4.4): computes the fingerprint, evicts it lazily if its
    /// deadline has passed, then either reports a fresh insert or a hit.
    /// `ttl` of zero disables the guard (always `Fresh`, per §4.3.1 step 2:
    /// "If `db.dup_check_timeout > 0`").
    pub fn check(
        &self,
        name: &str,
        content: Option<&[u8]>,
        size: u64,
        ttl: Duration,
        flags: DupCheckFlags,
    ) -> DupDecision {
        if ttl.is_zero() {
            return DupDecision::Fresh;
        }
        let fingerprint = Fingerprint::compute(name, content, size, flags);
        let now = SystemTime::now();

        if let Some(existing) = self.records.get(&fingerprint) {
            if existing.deadline <= now {
                drop(existing);
                self.records.remove(&fingerprint);
            } else {
                drop(existing);
                return if flags.contains(DupCheckFlags::DC_DELETE) { DupDecision::Delete } else { DupDecision::RecordOnly };
            }
        }

        self.records.insert(fingerprint, Record { deadline: now + ttl });
        DupDecision::Fresh
    }

    /// `rm_dupcheck_crc` (§4.4): removes a just-inserted record on a fatal
    /// downstream error, so a retry of the same file does not self-suppress.
    pub fn remove(&self, name: &str, content: Option<&[u8]>, size: u64, flags: DupCheckFlags) {
        let fingerprint = Fingerprint::compute(name, content, size, flags);
        self.records.remove(&fingerprint);
    }

    /// Periodic maintenance sweep mirroring the legacy compaction pass;
    /// removes every record whose deadline has passed regardless of touch.
    pub fn sweep_expired(&self) {
        let now = SystemTime::now();
        self.records.retain(|_, record| record.deadline > now);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[must_use]
pub fn unix_epoch_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
