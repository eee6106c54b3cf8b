//! Generic memory-mapped table with the `AFD_WORD_OFFSET` header contract
//! (§6 "Shared memory tables"): a 4-byte element count, a 1-byte version, and
//! 3 bytes of padding, followed by packed fixed-size element records.
//!
//! Growth is append-only and doubles the backing file up to a hard ceiling
//! (§3 "grown in units of a fixed page size, backed by a resizable mapping").
//! Shrinking a table is a maintenance-time operation outside this crate's
//! scope (§3 Job Cache invariant: "shrinking is performed only during
//! quiesced maintenance").

use std::fs::{File, OpenOptions};
use std::io;
use std::marker::PhantomData;
use std::mem::size_of;
use std::path::Path;

use memmap2::MmapMut;

/// Size of the fixed header prefixing every mmap table file.
pub const AFD_WORD_OFFSET: usize = 8;

/// Current on-disk table version written by this crate.
pub const TABLE_VERSION: u8 = 1;

/// Initial element capacity for a freshly created table.
const INITIAL_CAPACITY: u32 = 64;

/// Growth ceiling: tables never grow past this many elements in one mapping.
const MAX_CAPACITY: u32 = 1 << 20;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("I/O error on mmap table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("table header version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u8, expected: u8 },
    #[error("table is at capacity ceiling ({MAX_CAPACITY} elements)")]
    AtCapacityCeiling,
    #[error("index {index} out of bounds (count = {count})")]
    OutOfBounds { index: u32, count: u32 },
}

/// A memory-mapped, append-growable table of fixed-size `T` records.
///
/// `T` must be `#[repr(C)]`, `Copy`, and contain no pointers — it is read and
/// written directly as raw bytes in the mapping.
pub struct MmapTable<T: Copy + 'static> {
    file: File,
    mmap: MmapMut,
    capacity: u32,
    _marker: PhantomData<T>,
}

impl<T: Copy + 'static> MmapTable<T> {
    fn element_size() -> usize {
        size_of::<T>()
    }

    /// Opens an existing table file, or creates one with `INITIAL_CAPACITY`
    /// zeroed elements if it doesn't exist.
    pub fn open_or_create(path: &Path) -> Result<Self, TableError> {
        let existed = path.exists();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| TableError::Io { path: path.display().to_string(), source })?;

        if !existed {
            Self::initialize_file(&file, INITIAL_CAPACITY)
                .map_err(|source| TableError::Io { path: path.display().to_string(), source })?;
        }

        let mmap = unsafe {
            MmapMut::map_mut(&file).map_err(|source| TableError::Io {
                path: path.display().to_string(),
                source,
            })?
        };

        let version = mmap[4];
        if existed && version != TABLE_VERSION {
            return Err(TableError::VersionMismatch { found: version, expected: TABLE_VERSION });
        }

        let capacity = u32::from_le_bytes(mmap[8..12].try_into().unwrap_or([0; 4]));
        Ok(Self { file, mmap, capacity, _marker: PhantomData })
    }

    fn initialize_file(file: &File, capacity: u32) -> io::Result<()> {
        let body_len = AFD_WORD_OFFSET + 4 + capacity as usize * Self::element_size();
        file.set_len(body_len as u64)?;
        let mut mmap = unsafe { MmapMut::map_mut(file)? };
        mmap[0..4].copy_from_slice(&0u32.to_le_bytes()); // element count
        mmap[4] = TABLE_VERSION;
        mmap[5..8].copy_from_slice(&[0, 0, 0]); // padding
        mmap[8..12].copy_from_slice(&capacity.to_le_bytes()); // capacity (crate extension to the header)
        mmap.flush()?;
        Ok(())
    }

    /// Number of live elements currently published in the table.
    #[must_use]
    pub fn count(&self) -> u32 {
        u32::from_le_bytes(self.mmap[0..4].try_into().unwrap_or([0; 4]))
    }

    fn set_count(&mut self, count: u32) {
        self.mmap[0..4].copy_from_slice(&count.to_le_bytes());
    }

    fn element_offset(index: u32) -> usize {
        AFD_WORD_OFFSET + 4 + index as usize * Self::element_size()
    }

    /// Reads element `index` by value. Lock-free: callers that need a
    /// consistent view must hold the relevant region lock (§4.1); an
    /// unguarded read is an advisory, tear-tolerant summary (§5).
    pub fn read(&self, index: u32) -> Result<T, TableError> {
        if index >= self.count() {
            return Err(TableError::OutOfBounds { index, count: self.count() });
        }
        let offset = Self::element_offset(index);
        let bytes = &self.mmap[offset..offset + Self::element_size()];
        // SAFETY: T is Copy, repr(C), and the slice is exactly size_of::<T>() bytes
        // sourced from a table this crate wrote with the same layout.
        Ok(unsafe { std::ptr::read_unaligned(bytes.as_ptr().cast::<T>()) })
    }

    /// Writes `value` into element `index`. Caller must hold the write lock
    /// for the region covering `index` (§4.1, §5).
    pub fn write(&mut self, index: u32, value: &T) -> Result<(), TableError> {
        if index >= self.count() {
            return Err(TableError::OutOfBounds { index, count: self.count() });
        }
        let offset = Self::element_offset(index);
        let size = Self::element_size();
        // SAFETY: value is repr(C) Copy of exactly `size` bytes; offset..offset+size
        // was bounds-checked against self.count() above.
        let src = unsafe { std::slice::from_raw_parts((value as *const T).cast::<u8>(), size) };
        self.mmap[offset..offset + size].copy_from_slice(src);
        Ok(())
    }

    /// Appends a new element, doubling the backing mapping if the table is
    /// full, capped at `MAX_CAPACITY` (§3 Job Cache: "grown in units of a
    /// fixed page size... append-only while a worker is running").
    pub fn push(&mut self, value: &T) -> Result<u32, TableError> {
        let count = self.count();
        if count >= self.capacity {
            self.grow()?;
        }
        let index = count;
        let offset = Self::element_offset(index);
        let size = Self::element_size();
        let src = unsafe { std::slice::from_raw_parts((value as *const T).cast::<u8>(), size) };
        self.mmap[offset..offset + size].copy_from_slice(src);
        self.set_count(count + 1);
        Ok(index)
    }

    fn grow(&mut self) -> Result<(), TableError> {
        if self.capacity >= MAX_CAPACITY {
            return Err(TableError::AtCapacityCeiling);
        }
        let new_capacity = (self.capacity.saturating_mul(2)).min(MAX_CAPACITY);
        let new_len = AFD_WORD_OFFSET + 4 + new_capacity as usize * Self::element_size();
        self.mmap
            .flush()
            .map_err(|source| TableError::Io { path: "<mmap flush>".into(), source })?;
        self.file
            .set_len(new_len as u64)
            .map_err(|source| TableError::Io { path: "<mmap resize>".into(), source })?;
        self.mmap = unsafe {
            MmapMut::map_mut(&self.file)
                .map_err(|source| TableError::Io { path: "<mmap remap>".into(), source })?
        };
        self.mmap[8..12].copy_from_slice(&new_capacity.to_le_bytes());
        self.capacity = new_capacity;
        Ok(())
    }

    /// Raw fd, used by [`crate::ssp::lock`] to install byte-range locks.
    #[cfg(unix)]
    pub(crate) fn raw_fd(&self) -> std::os::fd::RawFd {
        use std::os::fd::AsRawFd;
        self.file.as_raw_fd()
    }
}
