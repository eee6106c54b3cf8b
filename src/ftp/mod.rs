//! FTP Client Interface (FCI): the typed seam the transfer worker drives
//! (§4.2). Two implementors ship in this crate: [`fake::FakeFtpServer`], an
//! in-process fake implementing [`FtpClient`] directly against an in-memory
//! virtual filesystem (so integration tests drive every worker branch
//! deterministically, without opening real sockets), and
//! [`suppaftp_client::SuppaftpClient`] wrapping the real wire library.

pub mod fake;
pub mod suppaftp_client;
pub mod types;

pub use types::{DataDirection, FtpClientError, FtpMode, FtpReply, TlsAuthMode, TransferType};

use crate::taxonomy::TimeoutFlag;

/// Typed FTP/FTPS operations the worker consumes (§4.2). Every method
/// returns `Ok(())`/`Ok(T)` on a positive reply, or `Err(FtpClientError)`
/// carrying the numeric reply code and whether the underlying I/O signalled
/// a timeout, so the worker can run the result through
/// [`crate::taxonomy::eval_timeout`].
#[async_trait::async_trait]
pub trait FtpClient: Send {
    async fn connect(&mut self, host: &str, port: u16, implicit_tls: bool, strict_verify: bool) -> Result<(), FtpClientError>;
    async fn auth_tls(&mut self, strict: bool) -> Result<(), FtpClientError>;
    async fn user(&mut self, name: &str) -> Result<(), FtpClientError>;
    async fn pass(&mut self, password: &str) -> Result<(), FtpClientError>;
    async fn idle(&mut self, timeout_secs: u32) -> Result<(), FtpClientError>;
    async fn transfer_type(&mut self, kind: TransferType) -> Result<(), FtpClientError>;
    async fn utf8_on(&mut self) -> Result<(), FtpClientError>;
    async fn cd(&mut self, path: &str, create_if_missing: bool) -> Result<Option<String>, FtpClientError>;
    async fn exec(&mut self, site_cmd: &str, arg: Option<&str>) -> Result<(), FtpClientError>;
    async fn data_open(
        &mut self,
        name: &str,
        append_offset: u64,
        direction: DataDirection,
        create_dir: bool,
    ) -> Result<Option<String>, FtpClientError>;
    async fn auth_data(&mut self) -> Result<(), FtpClientError>;
    async fn write(&mut self, block: &[u8]) -> Result<usize, FtpClientError>;
    async fn close_data(&mut self) -> Result<(), FtpClientError>;
    async fn size(&mut self, name: &str) -> Result<u64, FtpClientError>;
    async fn list_line(&mut self, mode: FtpMode, name: &str) -> Result<String, FtpClientError>;
    async fn chmod(&mut self, name: &str, mode: &str) -> Result<(), FtpClientError>;
    async fn set_date(&mut self, name: &str, mtime: i64) -> Result<(), FtpClientError>;
    async fn move_file(&mut self, from: &str, to: &str, create_dir: bool) -> Result<(), FtpClientError>;
    async fn dele(&mut self, name: &str) -> Result<(), FtpClientError>;
    async fn keepalive(&mut self) -> Result<(), FtpClientError>;
    async fn quit(&mut self) -> Result<(), FtpClientError>;
}

impl FtpClientError {
    /// Whether this failure should flow through [`crate::taxonomy::eval_timeout`]
    /// with the timeout branch taken.
    #[must_use]
    pub fn timeout_flag(&self) -> TimeoutFlag {
        if self.timed_out {
            TimeoutFlag::On
        } else {
            TimeoutFlag::Off
        }
    }
}
