//! Output Log Emitter (OLE): fixed-layout per-file records (§4.7, §6
//! "Structured log record layout"), paired with a human-readable `tracing`
//! event for operators tailing journald/stdout.

use thiserror::Error;
use tracing::info;

use crate::control::{LogFifoError, LogFifoSink};

/// Output-type tag distinguishing a normal delivery from an other-process
/// delete (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputType {
    NormalDelivered = b'N',
    OtherProcDelete = b'D',
}

impl OutputType {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'N' => Some(Self::NormalDelivered),
            b'D' => Some(Self::OtherProcDelete),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LogCodecError {
    #[error("record too short: {0} bytes")]
    TooShort(usize),
    #[error("unknown output type byte {0:#x}")]
    UnknownOutputType(u8),
    #[error("record field is not valid UTF-8")]
    InvalidUtf8,
}

/// One delivered/deleted-file record (§6): `retries(u32), job_id(u32),
/// transfer_time(i64 ticks), file_size(i64), archive_name_length(u16),
/// file_name_length(u16), unique_length(u16), output_type(u8), then
/// unique-prefix, file-name (optionally `sep` remote-name), archive-name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLogRecord {
    pub retries: u32,
    pub job_id: u32,
    pub transfer_time_ticks: i64,
    pub file_size: i64,
    pub output_type: OutputType,
    pub unique_prefix: String,
    pub file_name: String,
    pub remote_name: Option<String>,
    pub archive_name: Option<String>,
}

/// Separator between local file name and remote name when both are logged.
const NAME_SEP: char = '\u{1}';

impl OutputLogRecord {
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let file_name_field = match &self.remote_name {
            Some(remote) => format!("{}{NAME_SEP}{remote}", self.file_name),
            None => self.file_name.clone(),
        };
        let archive_name = self.archive_name.clone().unwrap_or_default();

        let mut buf = Vec::new();
        buf.extend_from_slice(&self.retries.to_le_bytes());
        buf.extend_from_slice(&self.job_id.to_le_bytes());
        buf.extend_from_slice(&self.transfer_time_ticks.to_le_bytes());
        buf.extend_from_slice(&self.file_size.to_le_bytes());
        buf.extend_from_slice(&(archive_name.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(file_name_field.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(self.unique_prefix.len() as u16).to_le_bytes());
        buf.push(self.output_type as u8);
        buf.extend_from_slice(self.unique_prefix.as_bytes());
        buf.extend_from_slice(file_name_field.as_bytes());
        buf.extend_from_slice(archive_name.as_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, LogCodecError> {
        const HEADER_LEN: usize = 4 + 4 + 8 + 8 + 2 + 2 + 2 + 1;
        if bytes.len() < HEADER_LEN {
            return Err(LogCodecError::TooShort(bytes.len()));
        }
        let retries = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let job_id = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let transfer_time_ticks = i64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let file_size = i64::from_le_bytes(bytes[16..24].try_into().unwrap());
        let archive_name_length = u16::from_le_bytes(bytes[24..26].try_into().unwrap()) as usize;
        let file_name_length = u16::from_le_bytes(bytes[26..28].try_into().unwrap()) as usize;
        let unique_length = u16::from_le_bytes(bytes[28..30].try_into().unwrap()) as usize;
        let output_type = OutputType::from_byte(bytes[30]).ok_or(LogCodecError::UnknownOutputType(bytes[30]))?;

        let mut cursor = HEADER_LEN;
        let total_needed = cursor + unique_length + file_name_length + archive_name_length;
        if bytes.len() < total_needed {
            return Err(LogCodecError::TooShort(bytes.len()));
        }

        let unique_prefix = std::str::from_utf8(&bytes[cursor..cursor + unique_length])
            .map_err(|_| LogCodecError::InvalidUtf8)?
            .to_string();
        cursor += unique_length;

        let file_name_field = std::str::from_utf8(&bytes[cursor..cursor + file_name_length])
            .map_err(|_| LogCodecError::InvalidUtf8)?;
        cursor += file_name_length;

        let archive_name = std::str::from_utf8(&bytes[cursor..cursor + archive_name_length])
            .map_err(|_| LogCodecError::InvalidUtf8)?
            .to_string();

        let (file_name, remote_name) = match file_name_field.split_once(NAME_SEP) {
            Some((local, remote)) => (local.to_string(), Some(remote.to_string())),
            None => (file_name_field.to_string(), None),
        };

        Ok(Self {
            retries,
            job_id,
            transfer_time_ticks,
            file_size,
            output_type,
            unique_prefix,
            file_name,
            remote_name,
            archive_name: if archive_name.is_empty() { None } else { Some(archive_name) },
        })
    }
}

/// Delete-log record (§6): `file_size(i64), dir_id(u32), job_id(u32),
/// input_time(i64), split_job_counter(u32), unique_number(u32),
/// file_name_length(u16), then file-name and a reason string
/// "<prog><SEP>(<file> <line>)"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteLogRecord {
    pub file_size: i64,
    pub dir_id: u32,
    pub job_id: u32,
    pub input_time: i64,
    pub split_job_counter: u32,
    pub unique_number: u32,
    pub file_name: String,
    pub reason: String,
}

impl DeleteLogRecord {
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.file_size.to_le_bytes());
        buf.extend_from_slice(&self.dir_id.to_le_bytes());
        buf.extend_from_slice(&self.job_id.to_le_bytes());
        buf.extend_from_slice(&self.input_time.to_le_bytes());
        buf.extend_from_slice(&self.split_job_counter.to_le_bytes());
        buf.extend_from_slice(&self.unique_number.to_le_bytes());
        buf.extend_from_slice(&(self.file_name.len() as u16).to_le_bytes());
        buf.extend_from_slice(self.file_name.as_bytes());
        buf.extend_from_slice(self.reason.as_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, LogCodecError> {
        const HEADER_LEN: usize = 8 + 4 + 4 + 8 + 4 + 4 + 2;
        if bytes.len() < HEADER_LEN {
            return Err(LogCodecError::TooShort(bytes.len()));
        }
        let file_size = i64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let dir_id = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        let job_id = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
        let input_time = i64::from_le_bytes(bytes[16..24].try_into().unwrap());
        let split_job_counter = u32::from_le_bytes(bytes[24..28].try_into().unwrap());
        let unique_number = u32::from_le_bytes(bytes[28..32].try_into().unwrap());
        let file_name_length = u16::from_le_bytes(bytes[32..34].try_into().unwrap()) as usize;

        let mut cursor = HEADER_LEN;
        if bytes.len() < cursor + file_name_length {
            return Err(LogCodecError::TooShort(bytes.len()));
        }
        let file_name = std::str::from_utf8(&bytes[cursor..cursor + file_name_length])
            .map_err(|_| LogCodecError::InvalidUtf8)?
            .to_string();
        cursor += file_name_length;
        let reason = std::str::from_utf8(&bytes[cursor..]).map_err(|_| LogCodecError::InvalidUtf8)?.to_string();

        Ok(Self { file_size, dir_id, job_id, input_time, split_job_counter, unique_number, file_name, reason })
    }

    /// Builds the `"<prog><SEP>(<file> <line>)"` reason string (§6).
    #[must_use]
    pub fn format_reason(prog: &str, sep: char, source_file: &str, line: u32) -> String {
        format!("{prog}{sep}({source_file} {line})")
    }
}

/// Pairs the binary record sink with a human-readable tracing event, the
/// way the teacher always logs a structured outcome alongside an operator-
/// facing line (§4.7: "the emitter additionally logs a `tracing::info!`...
/// for every record").
pub struct OutputLogEmitter {
    sink: LogFifoSink,
}

impl OutputLogEmitter {
    #[must_use]
    pub fn new(sink: LogFifoSink) -> Self {
        Self { sink }
    }

    pub fn emit(&mut self, record: &OutputLogRecord) -> Result<(), LogFifoError> {
        info!(
            job_id = record.job_id,
            file_name = %record.file_name,
            file_size = record.file_size,
            transfer_time_ticks = record.transfer_time_ticks,
            archive_name = record.archive_name.as_deref().unwrap_or(""),
            "file delivered"
        );
        self.sink.append(&record.encode())
    }
}

pub struct DeleteLogEmitter {
    sink: LogFifoSink,
}

impl DeleteLogEmitter {
    #[must_use]
    pub fn new(sink: LogFifoSink) -> Self {
        Self { sink }
    }

    pub fn emit(&mut self, record: &DeleteLogRecord) -> Result<(), LogFifoError> {
        tracing::warn!(
            job_id = record.job_id,
            file_name = %record.file_name,
            reason = %record.reason,
            "file deleted"
        );
        self.sink.append(&record.encode())
    }
}
