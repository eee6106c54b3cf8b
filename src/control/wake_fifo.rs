//! Dispatcher wake FIFO: a single `0x00` byte wakes the dispatcher, no lock
//! required (§4.1, §5 "Wake-up of the dispatcher... is write-once to a
//! single FIFO byte and requires no lock").

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Write handle to the dispatcher wake FIFO.
///
/// Opened non-blocking so a worker that finds nobody reading never stalls on
/// `write(2)`; a dropped wake is harmless, the dispatcher polls regardless.
pub struct WakeFifo {
    file: File,
}

impl WakeFifo {
    /// Opens `path` for writing. On Unix this is opened `O_NONBLOCK`; on other
    /// platforms it falls back to a regular blocking open (there is no FIFO
    /// concept to honor there, tests substitute a plain file).
    pub fn open(path: &Path) -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let file = OpenOptions::new()
                .write(true)
                .custom_flags(libc::O_NONBLOCK)
                .open(path)?;
            Ok(Self { file })
        }
        #[cfg(not(unix))]
        {
            let file = OpenOptions::new().write(true).open(path)?;
            Ok(Self { file })
        }
    }

    /// Writes the single wake byte. A `WouldBlock` error (nobody reading) is
    /// swallowed: the wake is advisory, never load-bearing for correctness.
    pub fn wake(&self) -> std::io::Result<()> {
        match (&self.file).write_all(&[0u8]) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e),
        }
    }
}
