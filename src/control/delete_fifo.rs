//! Delete FIFO: one record per deletion request, consumed by the
//! supervisor (§6 "FIFOs", Delete FIFO).
//!
//! Wire format, verbatim from spec.md:
//! - `'D' <message name>\0` — `DELETE_MESSAGE`
//! - `'F' <message name>/<file>\0\0` — `DELETE_SINGLE_FILE`
//! - `'R' "<msg_number> <pos>"\0` — `DELETE_RETRIEVE`

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeleteFifoError {
    #[error("failed to write delete record: {0}")]
    Io(#[from] std::io::Error),
}

/// One well-formed request to the delete FIFO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteRequest {
    DeleteMessage { message_name: String },
    DeleteSingleFile { message_name: String, file: String },
    DeleteRetrieve { msg_number: u32, pos: u32 },
}

impl DeleteRequest {
    fn encode(&self) -> Vec<u8> {
        match self {
            Self::DeleteMessage { message_name } => {
                let mut buf = vec![b'D'];
                buf.extend_from_slice(message_name.as_bytes());
                buf.push(0);
                buf
            }
            Self::DeleteSingleFile { message_name, file } => {
                let mut buf = vec![b'F'];
                buf.extend_from_slice(message_name.as_bytes());
                buf.push(b'/');
                buf.extend_from_slice(file.as_bytes());
                buf.push(0);
                buf.push(0);
                buf
            }
            Self::DeleteRetrieve { msg_number, pos } => {
                let mut buf = vec![b'R'];
                buf.extend_from_slice(format!("{msg_number} {pos}").as_bytes());
                buf.push(0);
                buf
            }
        }
    }
}

/// Append-only writer over the delete FIFO.
pub struct DeleteFifoWriter {
    file: File,
}

impl DeleteFifoWriter {
    pub fn open(path: &Path) -> Result<Self, DeleteFifoError> {
        let file = OpenOptions::new().write(true).open(path)?;
        Ok(Self { file })
    }

    /// Writes one record. A short write is surfaced as an error to the
    /// caller (§6: "short writes are errors and logged but non-fatal") — it
    /// is this function's caller's job to log and continue, not to retry.
    pub fn send(&mut self, request: &DeleteRequest) -> Result<(), DeleteFifoError> {
        let encoded = request.encode();
        let written = self.file.write(&encoded)?;
        if written != encoded.len() {
            return Err(DeleteFifoError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("short write: {written} of {} bytes", encoded.len()),
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    fn roundtrip(path: &Path, req: &DeleteRequest) -> Vec<u8> {
        let mut writer = DeleteFifoWriter::open(path).unwrap();
        writer.send(req).unwrap();
        drop(writer);
        let mut buf = Vec::new();
        File::open(path).unwrap().read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn delete_message_encoding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("delete");
        std::fs::write(&path, []).unwrap();
        let buf = roundtrip(&path, &DeleteRequest::DeleteMessage { message_name: "job17".into() });
        assert_eq!(buf, b"Djob17\0");
    }

    #[test]
    fn delete_single_file_encoding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("delete");
        std::fs::write(&path, []).unwrap();
        let buf = roundtrip(
            &path,
            &DeleteRequest::DeleteSingleFile { message_name: "job17".into(), file: "a.dat".into() },
        );
        assert_eq!(buf, b"Fjob17/a.dat\0\0");
    }

    #[test]
    fn delete_retrieve_encoding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("delete");
        std::fs::write(&path, []).unwrap();
        let buf = roundtrip(&path, &DeleteRequest::DeleteRetrieve { msg_number: 42, pos: 3 });
        assert_eq!(buf, b"R42 3\0");
    }
}
