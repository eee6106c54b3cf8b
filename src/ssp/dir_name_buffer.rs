//! Directory Name Buffer (`dnb`): immutable-during-run `dir id → absolute
//! path` map, read-only for the worker (§3 "Directory Name Buffer").

use std::path::{Path, PathBuf};

use super::table::{MmapTable, TableError};

const PATH_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
struct DirNameRecord {
    dir_id: u32,
    path_len: u16,
    _pad: [u8; 2],
    path: [u8; PATH_LEN],
}

#[derive(Debug, thiserror::Error)]
pub enum DirNameBufferError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("path for dir id {0} exceeds {PATH_LEN} bytes")]
    PathTooLong(u32),
    #[error("path for dir id {0} is not valid UTF-8")]
    InvalidUtf8(u32),
}

/// Read-only (from the worker's perspective) dir id → path table. A
/// maintenance tool builds the backing file; the worker here only reads it,
/// per §3: "Read-only for the core."
pub struct DirNameBuffer {
    table: MmapTable<DirNameRecord>,
}

impl DirNameBuffer {
    pub fn open(path: &Path) -> Result<Self, DirNameBufferError> {
        Ok(Self { table: MmapTable::open_or_create(path)? })
    }

    /// Maintenance-only: appends a `(dir_id, path)` mapping. Not called by
    /// the transfer worker itself, only by whatever seeds the table file.
    pub fn insert(&mut self, dir_id: u32, path: &Path) -> Result<(), DirNameBufferError> {
        let display = path.to_string_lossy();
        let bytes = display.as_bytes();
        if bytes.len() > PATH_LEN {
            return Err(DirNameBufferError::PathTooLong(dir_id));
        }
        let mut buf = [0u8; PATH_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        self.table.push(&DirNameRecord { dir_id, path_len: bytes.len() as u16, _pad: [0; 2], path: buf })?;
        Ok(())
    }

    /// Linear lookup by dir id; dir id sets are small and looked up rarely
    /// relative to per-file transfer work.
    pub fn lookup(&self, dir_id: u32) -> Result<Option<PathBuf>, DirNameBufferError> {
        for i in 0..self.table.count() {
            let record = self.table.read(i)?;
            if record.dir_id == dir_id {
                let s = std::str::from_utf8(&record.path[..record.path_len as usize])
                    .map_err(|_| DirNameBufferError::InvalidUtf8(dir_id))?;
                return Ok(Some(PathBuf::from(s)));
            }
        }
        Ok(None)
    }
}
