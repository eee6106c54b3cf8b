//! Job Cache (`mdb`): job id → host position, protocol, tuning, and ageing
//! rank (§3 "Job Cache Entry").

use std::path::Path;

use super::table::{MmapTable, TableError};

/// Ageing rank is clamped to this range; parse failures default here too
/// (§3: "ageing rank (clamped to `[MIN_AGEING_VALUE, MAX_AGEING_VALUE]`,
/// default on parse failure)").
pub const MIN_AGEING_VALUE: u32 = 1;
pub const MAX_AGEING_VALUE: u32 = 10_080; // one week in minutes
pub const DEFAULT_AGEING_VALUE: u32 = MIN_AGEING_VALUE;

/// Transport protocol recorded against a job cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtocolType {
    Ftp = 0,
    Ftps = 1,
}

/// One job cache record. `#[repr(C)]` so it can be packed directly into an
/// [`MmapTable`]; the `job_id` doubles as the lookup key, scanned linearly
/// since the cache only ever grows to a few thousand live jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct JobCacheEntry {
    pub job_id: u32,
    pub host_pos: u32,
    pub protocol_type: ProtocolType,
    _pad0: [u8; 3],
    pub port: u16,
    _pad1: [u8; 2],
    pub age_limit: u32,
    pub ageing_rank: u32,
    pub message_mtime: i64,
    pub last_transfer_time: i64,
}

impl JobCacheEntry {
    #[must_use]
    pub fn new(job_id: u32, host_pos: u32, protocol_type: ProtocolType, port: u16, age_limit: u32) -> Self {
        Self {
            job_id,
            host_pos,
            protocol_type,
            _pad0: [0; 3],
            port,
            _pad1: [0; 2],
            age_limit,
            ageing_rank: DEFAULT_AGEING_VALUE,
            message_mtime: 0,
            last_transfer_time: 0,
        }
    }

    /// Clamps `raw` into `[MIN_AGEING_VALUE, MAX_AGEING_VALUE]`; a parse
    /// failure upstream should pass `None`, which yields the default.
    #[must_use]
    pub fn clamp_ageing(raw: Option<u32>) -> u32 {
        match raw {
            Some(v) => v.clamp(MIN_AGEING_VALUE, MAX_AGEING_VALUE),
            None => DEFAULT_AGEING_VALUE,
        }
    }
}

/// Append-only cache of [`JobCacheEntry`] records, grown in page-sized units
/// by the underlying [`MmapTable`] (§3: "grown in units of a fixed page
/// size... append-only while a worker is running; shrinking is performed
/// only during quiesced maintenance").
pub struct JobCache {
    table: MmapTable<JobCacheEntry>,
}

impl JobCache {
    pub fn open(path: &Path) -> Result<Self, TableError> {
        Ok(Self { table: MmapTable::open_or_create(path)? })
    }

    /// Appends a new entry, returning its index in the cache.
    pub fn insert(&mut self, entry: &JobCacheEntry) -> Result<u32, TableError> {
        self.table.push(entry)
    }

    /// Linear scan for the entry matching `job_id`. The cache is small
    /// enough in practice (a handful of thousand live jobs) that this beats
    /// maintaining a secondary index for a table that is append-only and
    /// read far less often than it is scanned once per job dispatch.
    pub fn find(&self, job_id: u32) -> Result<Option<JobCacheEntry>, TableError> {
        for i in 0..self.table.count() {
            let entry = self.table.read(i)?;
            if entry.job_id == job_id {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    #[must_use]
    pub fn len(&self) -> u32 {
        self.table.count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.count() == 0
    }
}
