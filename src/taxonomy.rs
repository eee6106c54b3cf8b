//! Error taxonomy and exit-code mapping for the transfer worker.
//!
//! Every `exit(...)` from the worker carries one of a closed set of codes
//! (§4.8). The supervisor widens its retry back-off for `*_timeout` variants
//! and never retries `local-fault` codes against the same staging directory.
//!
//! # Example
//!
//! ```
//! use afd_core::taxonomy::{TaxonomyError, TimeoutFlag, eval_timeout};
//!
//! let err = eval_timeout(TaxonomyError::OpenRemoteError, TimeoutFlag::On);
//! assert_eq!(err.exit_code(), TaxonomyError::OpenRemoteErrorTimeout.exit_code());
//! ```

use thiserror::Error;

/// Whether the FTP client signalled a timeout while performing the failing call.
///
/// `eval_timeout` is the only place that inspects this flag; the policy
/// (spec.md §9 ambiguity 1) is that the flag is considered fresh at each call
/// boundary and is never "cleared opportunistically" elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutFlag {
    On,
    Off,
}

/// Closed set of worker exit codes, grouped exactly as spec.md §4.8 groups them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TaxonomyError {
    // ---- connect ----
    #[error("failed to connect to remote host")]
    ConnectError,
    #[error("failed to connect to remote host (timed out)")]
    ConnectErrorTimeout,
    #[error("AUTH TLS negotiation failed")]
    AuthError,
    #[error("AUTH TLS negotiation failed (timed out)")]
    AuthErrorTimeout,
    #[error("USER command rejected")]
    UserError,
    #[error("USER command rejected (timed out)")]
    UserErrorTimeout,
    #[error("PASS command rejected")]
    PasswordError,
    #[error("PASS command rejected (timed out)")]
    PasswordErrorTimeout,

    // ---- control ----
    #[error("TYPE command failed")]
    TypeError,
    #[error("TYPE command failed (timed out)")]
    TypeErrorTimeout,
    #[error("CWD/MKD failed")]
    ChdirError,
    #[error("CWD/MKD failed (timed out)")]
    ChdirErrorTimeout,
    #[error("QUIT failed")]
    QuitError,
    #[error("QUIT failed (timed out)")]
    QuitErrorTimeout,

    // ---- data ----
    #[error("failed to open remote data connection")]
    OpenRemoteError,
    #[error("failed to open remote data connection (timed out)")]
    OpenRemoteErrorTimeout,
    #[error("failed to write to remote data connection")]
    WriteRemoteError,
    #[error("failed to write to remote data connection (timed out)")]
    WriteRemoteErrorTimeout,
    #[error("failed to close remote data connection")]
    CloseRemoteError,
    #[error("failed to close remote data connection (timed out)")]
    CloseRemoteErrorTimeout,
    #[error("failed to stat remote target")]
    StatTargetError,
    #[error("failed to stat remote target (timed out)")]
    StatTargetErrorTimeout,
    #[error("failed to rename/move remote file")]
    MoveRemoteError,
    #[error("failed to rename/move remote file (timed out)")]
    MoveRemoteErrorTimeout,
    #[error("failed to remove remote lock file")]
    RemoveLockfileError,
    #[error("failed to remove remote lock file (timed out)")]
    RemoveLockfileErrorTimeout,
    #[error("failed to write remote lock file")]
    WriteLockError,
    #[error("failed to write remote lock file (timed out)")]
    WriteLockErrorTimeout,
    #[error("delivered size did not match expected remote size")]
    FileSizeMatchError,

    // ---- local ----
    #[error("failed to open local staged file")]
    OpenLocalError,
    #[error("failed to read local staged file")]
    ReadLocalError,
    #[error("failed to allocate a required buffer")]
    AllocError,

    // ---- benign ----
    #[error("still files to send, re-queue the batch")]
    StillFilesToSend,
    #[error("success")]
    Success,
    #[error("transfer completed successfully")]
    TransferSuccess,

    // ---- lifecycle ----
    #[error("worker was killed")]
    GotKilled,
}

impl TaxonomyError {
    /// Unsigned byte exit code as consumed by the CLI's `std::process::exit`.
    ///
    /// Values are stable within this crate's lifetime; the supervisor's retry
    /// tables key off them, so variants are never renumbered, only appended.
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::StillFilesToSend => 1,
            Self::TransferSuccess => 2,
            Self::ConnectError => 10,
            Self::ConnectErrorTimeout => 11,
            Self::AuthError => 12,
            Self::AuthErrorTimeout => 13,
            Self::UserError => 14,
            Self::UserErrorTimeout => 15,
            Self::PasswordError => 16,
            Self::PasswordErrorTimeout => 17,
            Self::TypeError => 20,
            Self::TypeErrorTimeout => 21,
            Self::ChdirError => 22,
            Self::ChdirErrorTimeout => 23,
            Self::QuitError => 24,
            Self::QuitErrorTimeout => 25,
            Self::OpenRemoteError => 30,
            Self::OpenRemoteErrorTimeout => 31,
            Self::WriteRemoteError => 32,
            Self::WriteRemoteErrorTimeout => 33,
            Self::CloseRemoteError => 34,
            Self::CloseRemoteErrorTimeout => 35,
            Self::StatTargetError => 36,
            Self::StatTargetErrorTimeout => 37,
            Self::MoveRemoteError => 38,
            Self::MoveRemoteErrorTimeout => 39,
            Self::RemoveLockfileError => 40,
            Self::RemoveLockfileErrorTimeout => 41,
            Self::WriteLockError => 42,
            Self::WriteLockErrorTimeout => 43,
            Self::FileSizeMatchError => 44,
            Self::OpenLocalError => 50,
            Self::ReadLocalError => 51,
            Self::AllocError => 52,
            Self::GotKilled => 255,
        }
    }

    /// Whether this error belongs to the `recoverable-by-retry` class (§7).
    #[must_use]
    pub fn is_recoverable_by_retry(self) -> bool {
        matches!(
            self,
            Self::ConnectError
                | Self::ConnectErrorTimeout
                | Self::AuthError
                | Self::AuthErrorTimeout
                | Self::OpenRemoteError
                | Self::OpenRemoteErrorTimeout
                | Self::WriteRemoteError
                | Self::WriteRemoteErrorTimeout
                | Self::CloseRemoteError
                | Self::CloseRemoteErrorTimeout
                | Self::MoveRemoteError
                | Self::MoveRemoteErrorTimeout
        )
    }

    /// Whether this is a `local-fault` error: terminal for the batch, and the
    /// staging directory must be left in place for inspection (never unlinked).
    #[must_use]
    pub fn is_local_fault(self) -> bool {
        matches!(self, Self::OpenLocalError | Self::ReadLocalError | Self::AllocError)
    }

    /// Whether this exit is benign: the supervisor should re-pick up the batch
    /// immediately rather than back off.
    #[must_use]
    pub fn is_benign(self) -> bool {
        matches!(self, Self::StillFilesToSend | Self::Success | Self::TransferSuccess)
    }

    /// The `*_timeout` variant of a non-timeout-tagged code, if one exists.
    fn timeout_variant(self) -> Option<Self> {
        Some(match self {
            Self::ConnectError => Self::ConnectErrorTimeout,
            Self::AuthError => Self::AuthErrorTimeout,
            Self::UserError => Self::UserErrorTimeout,
            Self::PasswordError => Self::PasswordErrorTimeout,
            Self::TypeError => Self::TypeErrorTimeout,
            Self::ChdirError => Self::ChdirErrorTimeout,
            Self::QuitError => Self::QuitErrorTimeout,
            Self::OpenRemoteError => Self::OpenRemoteErrorTimeout,
            Self::WriteRemoteError => Self::WriteRemoteErrorTimeout,
            Self::CloseRemoteError => Self::CloseRemoteErrorTimeout,
            Self::StatTargetError => Self::StatTargetErrorTimeout,
            Self::MoveRemoteError => Self::MoveRemoteErrorTimeout,
            Self::RemoveLockfileError => Self::RemoveLockfileErrorTimeout,
            Self::WriteLockError => Self::WriteLockErrorTimeout,
            _ => return None,
        })
    }
}

/// Promotes `code` to its timeout-tagged variant when the FTP client set
/// `timeout_flag == On` during the failing call (§4.8).
///
/// Codes with no timeout-tagged sibling (benign, local-fault, lifecycle, and
/// already-tagged variants) pass through unchanged.
#[must_use]
pub fn eval_timeout(code: TaxonomyError, timeout_flag: TimeoutFlag) -> TaxonomyError {
    if timeout_flag == TimeoutFlag::Off {
        return code;
    }
    code.timeout_variant().unwrap_or(code)
}
