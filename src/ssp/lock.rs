//! Byte-range advisory locks over Host Status field groups.
//!
//! §4.1 names five lock regions per host record: CON (connections), FIU
//! (file-in-use), TFC (total file counters), EC (error counter), HS (host
//! status flags). Each is a POSIX `fcntl(F_SETLK)` record lock scoped to the
//! byte range backing that field group for the given host position, taken
//! exclusively by the writer. Readers never lock (§5: "lock-free reads are
//! tear-tolerant summaries").
//!
//! The lock is released by a `LockGuard`'s `Drop` impl so that every exit
//! path — normal return, `?`-propagated error, or panic unwind — releases it
//! (§8 invariant: "After any exit path... no byte-range lock held by this
//! process remains").

use std::os::fd::RawFd;

use thiserror::Error;

/// The five lock regions defined over a Host Status record (§4.1, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockRegion {
    /// Connections (active-transfers counter).
    Con,
    /// File-in-use (per-slot file name/size in progress).
    Fiu,
    /// Total file counters (`total_file_counter`, `total_file_size`).
    Tfc,
    /// Error counter and bounded error history.
    Ec,
    /// Host status flags (paused-auto, error-offline, event windows, ...).
    Hs,
}

impl LockRegion {
    /// Byte-range width reserved for this region within a host record.
    /// Regions are laid out back to back; actual widths only need to be wide
    /// enough that two regions' ranges never overlap, since each host's
    /// regions are carved out of that host's own byte range in the file.
    fn width(self) -> u64 {
        match self {
            LockRegion::Con => 8,
            LockRegion::Fiu => 256,
            LockRegion::Tfc => 32,
            LockRegion::Ec => 64,
            LockRegion::Hs => 16,
        }
    }

    fn ordinal_offset(self) -> u64 {
        match self {
            LockRegion::Con => 0,
            LockRegion::Fiu => 8,
            LockRegion::Tfc => 8 + 256,
            LockRegion::Ec => 8 + 256 + 32,
            LockRegion::Hs => 8 + 256 + 32 + 64,
        }
    }
}

/// Stride reserved per host position across all five regions.
const HOST_RECORD_STRIDE: u64 = 8 + 256 + 32 + 64 + 16;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to acquire {region:?} lock on host position {host_pos}: {source}")]
    Acquire {
        region: LockRegion,
        host_pos: u32,
        #[source]
        source: std::io::Error,
    },
}

/// RAII guard over an exclusively held byte-range lock region.
///
/// Holding this guard is the only way to obtain a mutable view of the
/// region's fields (§9: "Byte-range locks in the source map cleanly to a
/// typed lock handle per field-group").
pub struct LockGuard {
    fd: RawFd,
    region: LockRegion,
    host_pos: u32,
    offset: u64,
    len: u64,
}

impl LockGuard {
    /// Acquires an exclusive lock on `region` for `host_pos` over file
    /// descriptor `fd`. Blocks (via `F_SETLKW`) until acquired — critical
    /// sections are bounded, per §4.1, so this never blocks indefinitely
    /// under correct use.
    #[cfg(unix)]
    pub fn acquire(fd: RawFd, host_pos: u32, region: LockRegion) -> Result<Self, LockError> {
        let offset = u64::from(host_pos) * HOST_RECORD_STRIDE + region.ordinal_offset();
        let len = region.width();

        let mut flock = libc::flock {
            l_type: libc::F_WRLCK as i16,
            l_whence: libc::SEEK_SET as i16,
            l_start: offset as libc::off_t,
            l_len: len as libc::off_t,
            l_pid: 0,
        };

        // SAFETY: fd is a valid, open file descriptor for the lifetime of this call;
        // flock is a correctly-initialized libc::flock value.
        let rc = unsafe { libc::fcntl(fd, libc::F_SETLKW, std::ptr::addr_of_mut!(flock)) };
        if rc != 0 {
            return Err(LockError::Acquire { region, host_pos, source: std::io::Error::last_os_error() });
        }

        Ok(Self { fd, region, host_pos, offset, len })
    }

    #[must_use]
    pub fn region(&self) -> LockRegion {
        self.region
    }

    #[must_use]
    pub fn host_pos(&self) -> u32 {
        self.host_pos
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            let mut flock = libc::flock {
                l_type: libc::F_UNLCK as i16,
                l_whence: libc::SEEK_SET as i16,
                l_start: self.offset as libc::off_t,
                l_len: self.len as libc::off_t,
                l_pid: 0,
            };
            // SAFETY: fd remains valid for the guard's lifetime; releasing a lock
            // we hold is always sound, including during panic unwind.
            unsafe {
                libc::fcntl(self.fd, libc::F_SETLK, std::ptr::addr_of_mut!(flock));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::os::fd::AsRawFd;
    use tempfile::tempdir;

    #[test]
    fn acquire_and_drop_releases() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lockfile");
        let file = OpenOptions::new().read(true).write(true).create(true).open(&path).unwrap();
        file.set_len(4096).unwrap();
        let fd = file.as_raw_fd();

        {
            let guard = LockGuard::acquire(fd, 0, LockRegion::Fiu).unwrap();
            assert_eq!(guard.region(), LockRegion::Fiu);
            assert_eq!(guard.host_pos(), 0);
        }
        // Lock released; re-acquiring the same region must succeed immediately.
        let guard2 = LockGuard::acquire(fd, 0, LockRegion::Fiu);
        assert!(guard2.is_ok());
    }

    #[test]
    fn distinct_regions_do_not_overlap() {
        let regions = [LockRegion::Con, LockRegion::Fiu, LockRegion::Tfc, LockRegion::Ec, LockRegion::Hs];
        let mut ranges: Vec<(u64, u64)> = regions
            .iter()
            .map(|r| (r.ordinal_offset(), r.ordinal_offset() + r.width()))
            .collect();
        ranges.sort_unstable();
        for w in ranges.windows(2) {
            assert!(w[0].1 <= w[1].0, "region ranges overlap: {:?}", w);
        }
    }

    #[test]
    fn distinct_host_positions_do_not_overlap() {
        let pos0_end = LockRegion::Hs.ordinal_offset() + LockRegion::Hs.width();
        let pos1_start = HOST_RECORD_STRIDE;
        assert!(pos0_end <= pos1_start);
    }
}
