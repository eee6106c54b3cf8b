//! Receive/output/delete log FIFO sink: newline-terminated fixed-layout
//! records (§6). The byte layout of each record type lives in
//! [`crate::logs`]; this module only owns the append-and-flush mechanics
//! shared by all three log FIFOs.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogFifoError {
    #[error("failed to write log record: {0}")]
    Io(#[from] std::io::Error),
    #[error("short write: wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
}

/// Append-only sink for one log FIFO (receive, output, or delete).
pub struct LogFifoSink {
    file: File,
}

impl LogFifoSink {
    pub fn open(path: &Path) -> Result<Self, LogFifoError> {
        let file = OpenOptions::new().write(true).open(path)?;
        Ok(Self { file })
    }

    /// Writes `record` (already encoded by a type in [`crate::logs`])
    /// followed by a newline, as one atomic write. Short writes are surfaced
    /// as an error — non-fatal to the caller, who logs and continues
    /// (§6: "short writes are errors and logged but non-fatal").
    pub fn append(&mut self, record: &[u8]) -> Result<(), LogFifoError> {
        let mut framed = Vec::with_capacity(record.len() + 1);
        framed.extend_from_slice(record);
        framed.push(b'\n');
        let written = self.file.write(&framed)?;
        if written != framed.len() {
            return Err(LogFifoError::ShortWrite { written, expected: framed.len() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn append_frames_with_trailing_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log");
        std::fs::write(&path, []).unwrap();

        let mut sink = LogFifoSink::open(&path).unwrap();
        sink.append(b"hello").unwrap();
        sink.append(b"world").unwrap();
        drop(sink);

        let mut buf = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello\nworld\n");
    }
}
