//! Queue Buffer (`qb`): one entry per pending message (§3 "Queue Buffer
//! Entry"), compacted by leftward move under the owning host's TFC lock.

use std::path::Path;

use super::table::{MmapTable, TableError};

/// Sentinel PID meaning "no worker currently owns this entry" (§3: "PID of
/// worker or sentinel `PENDING`").
pub const PENDING: i32 = -1;

/// Fixed-width message name storage; message names are short job-message
/// tokens, not arbitrary paths.
const MESSAGE_NAME_LEN: usize = 64;

/// One pending-message record. `msg_name` all-zero means a retrieve
/// (inbound) job; non-empty means an outbound batch (§3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct QueueBufferEntry {
    msg_name: [u8; MESSAGE_NAME_LEN],
    pub message_number: u32,
    pub files_to_send: u32,
    pub file_size_to_send: u64,
    pub creation_time: i64,
    pub pid: i32,
    _pad: [u8; 4],
}

impl QueueBufferEntry {
    #[must_use]
    pub fn outbound(
        msg_name: &str,
        message_number: u32,
        files_to_send: u32,
        file_size_to_send: u64,
        creation_time: i64,
    ) -> Self {
        let mut buf = [0u8; MESSAGE_NAME_LEN];
        let bytes = msg_name.as_bytes();
        let len = bytes.len().min(MESSAGE_NAME_LEN);
        buf[..len].copy_from_slice(&bytes[..len]);
        Self {
            msg_name: buf,
            message_number,
            files_to_send,
            file_size_to_send,
            creation_time,
            pid: PENDING,
            _pad: [0; 4],
        }
    }

    #[must_use]
    pub fn retrieve(message_number: u32, creation_time: i64) -> Self {
        Self {
            msg_name: [0u8; MESSAGE_NAME_LEN],
            message_number,
            files_to_send: 0,
            file_size_to_send: 0,
            creation_time,
            pid: PENDING,
            _pad: [0; 4],
        }
    }

    #[must_use]
    pub fn message_name(&self) -> &str {
        let end = self.msg_name.iter().position(|&b| b == 0).unwrap_or(MESSAGE_NAME_LEN);
        std::str::from_utf8(&self.msg_name[..end]).unwrap_or("")
    }

    /// Whether this is an inbound retrieve job (§3: "when `msg_name == ''`
    /// the entry represents a retrieve job (inbound)").
    #[must_use]
    pub fn is_retrieve(&self) -> bool {
        self.message_name().is_empty()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pid == PENDING
    }

    pub fn claim(&mut self, pid: i32) {
        self.pid = pid;
    }

    pub fn release(&mut self) {
        self.pid = PENDING;
    }
}

/// Table of pending/claimed [`QueueBufferEntry`] records for one host.
///
/// Compaction removes claimed-and-finished slack by moving live entries
/// leftward; callers must hold the host's TFC region lock
/// (`HostStatusTable::lock(pos, LockRegion::Tfc)`) for the duration, per
/// §3's "compacted by leftward move under the host's TFC-lock."
pub struct QueueBuffer {
    table: MmapTable<QueueBufferEntry>,
}

impl QueueBuffer {
    pub fn open(path: &Path) -> Result<Self, TableError> {
        Ok(Self { table: MmapTable::open_or_create(path)? })
    }

    pub fn push(&mut self, entry: &QueueBufferEntry) -> Result<u32, TableError> {
        self.table.push(entry)
    }

    pub fn get(&self, index: u32) -> Result<QueueBufferEntry, TableError> {
        self.table.read(index)
    }

    pub fn set(&mut self, index: u32, entry: &QueueBufferEntry) -> Result<(), TableError> {
        self.table.write(index, entry)
    }

    #[must_use]
    pub fn len(&self) -> u32 {
        self.table.count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.count() == 0
    }

    /// Returns the live (non-removed) entries in left-to-right order. Entries
    /// are never physically removed by this table type (it only appends);
    /// callers that model "removal" clear an entry's `files_to_send` to 0
    /// and this helper skips those when compacting a view for the
    /// dispatcher.
    pub fn live_entries(&self) -> Result<Vec<QueueBufferEntry>, TableError> {
        let mut out = Vec::with_capacity(self.table.count() as usize);
        for i in 0..self.table.count() {
            let entry = self.table.read(i)?;
            if entry.files_to_send > 0 || entry.is_retrieve() {
                out.push(entry);
            }
        }
        Ok(out)
    }
}
