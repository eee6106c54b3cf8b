//! Shared enums and the error type crossing the [`super::FtpClient`] seam.

use thiserror::Error;

/// `TYPE A` (ASCII) vs `TYPE I` (image/binary) per §4.2/§4.3.1 step 3/9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Ascii,
    Image,
}

/// Direction of a data-channel open (§4.2 `data_open(..., direction, ...)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDirection {
    Read,
    Write,
}

/// `LIST` vs `STAT` retrieval mode for append-offset probing (§4.3.1 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpMode {
    List,
    Stat,
}

/// `db.tls_auth` (§4.3 AUTH_TLS / §4.3.1 step 6): whether and how the data
/// channel is protected once the control channel is authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsAuthMode {
    #[default]
    No,
    /// Explicit TLS on the control channel only.
    Yes,
    /// Explicit TLS on the control channel, and `auth_data` before every
    /// data-channel open (§4.3.1 step 6, §4.3 LOCKFILE).
    Both,
}

/// A positive FTP reply the worker doesn't need to inspect further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FtpReply;

/// A negative reply or I/O failure crossing the client seam (§4.2: "Each
/// returns either `SUCCESS` or a numeric protocol code (≥ 400 class) plus a
/// timeout flag").
#[derive(Debug, Clone, Error)]
#[error("FTP error {code}: {message}")]
pub struct FtpClientError {
    pub code: u16,
    pub message: String,
    pub timed_out: bool,
}

impl FtpClientError {
    #[must_use]
    pub fn new(code: u16, message: impl Into<String>, timed_out: bool) -> Self {
        Self { code, message: message.into(), timed_out }
    }

    /// Whether the reply text matches one of the server-initiated idle-kill
    /// markers the worker treats as a benign exit (§4.3.1 step 5: "codes
    /// >= 400 whose text contains 'Idle timeout' or 'closing control
    /// connection'").
    #[must_use]
    pub fn is_idle_kill(&self) -> bool {
        self.message.contains("Idle timeout") || self.message.contains("closing control connection")
    }

    /// Whether the reply text matches the rename-file-busy recovery marker
    /// (§4.3.1 step 5).
    #[must_use]
    pub fn is_rename_file_busy(&self) -> bool {
        self.message.contains("Cannot open or remove a file containing a running program.")
            || self.message.contains("Cannot STOR. No permission.")
    }

    /// Whether `code` is one of the burst-login `USER`-rejection codes that
    /// trigger a forced reconnect (§4.3 LOGIN: `{331, 500, 501, 503, 530}`).
    #[must_use]
    pub fn is_burst_user_rejection(&self) -> bool {
        matches!(self.code, 331 | 500 | 501 | 503 | 530)
    }
}
