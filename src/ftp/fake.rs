//! In-process fake implementing [`FtpClient`] against an in-memory virtual
//! filesystem, covering enough of RFC 959's semantics (USER/PASS, TYPE, CWD,
//! STOR with append, SIZE, DELE, RNFR/RNTO, QUIT) to drive the worker state
//! machine through every branch named in §4.3 (§8 end-to-end scenarios).
//!
//! This is a test double, not a protocol implementation: it never opens a
//! socket. It exists so worker-level integration tests can assert on
//! delivered bytes, rejected logins, and injected faults without any network
//! dependency.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::types::{DataDirection, FtpClientError, FtpMode, TransferType};
use super::FtpClient;

#[derive(Debug, Clone, Default)]
struct VirtualFile {
    bytes: Vec<u8>,
    mtime: Option<i64>,
}

/// Shared virtual filesystem and fault-injection knobs behind a fake
/// control connection. `Clone`s of [`FakeFtpServer`] share the same state,
/// so a test can construct one server and connect several worker-role
/// clients against it to exercise cross-slot scenarios (e.g. duplicate
/// in-flight suppression, §8 scenario 5).
#[derive(Clone, Default)]
pub struct FakeFtpServer {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    cwd: String,
    files: HashMap<String, VirtualFile>,
    open_write: Option<(String, usize)>,
    valid_credentials: Option<(String, String)>,
    fail_next_write: Option<FtpClientError>,
    fail_next_data_open: Option<FtpClientError>,
    throttle_after_bytes: Option<u64>,
    throttle_stall: Option<Duration>,
    bytes_written_total: u64,
    auth_data_calls: u32,
    exec_commands: Vec<String>,
}

impl FakeFtpServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts successful login to exactly this `(user, pass)` pair.
    pub fn require_credentials(&self, user: impl Into<String>, pass: impl Into<String>) {
        self.inner.lock().unwrap().valid_credentials = Some((user.into(), pass.into()));
    }

    /// Seeds a file visible to `SIZE`/`LIST`/append probing before any
    /// transfer, simulating a partially-delivered remote file.
    pub fn seed_file(&self, name: &str, bytes: &[u8]) {
        self.inner.lock().unwrap().files.insert(name.to_string(), VirtualFile { bytes: bytes.to_vec(), mtime: None });
    }

    #[must_use]
    pub fn file_bytes(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().files.get(name).map(|f| f.bytes.clone())
    }

    #[must_use]
    pub fn file_exists(&self, name: &str) -> bool {
        self.inner.lock().unwrap().files.contains_key(name)
    }

    /// Number of `auth_data` (data-channel TLS protection) calls observed so
    /// far, for asserting the `tls_auth == BOTH` gate (§4.3.1 step 6).
    #[must_use]
    pub fn auth_data_call_count(&self) -> u32 {
        self.inner.lock().unwrap().auth_data_calls
    }

    /// `SITE` commands observed so far, in order (§4.3.1 step 15, §4.3
    /// LOCKFILE's own site-exec hook).
    #[must_use]
    pub fn exec_commands(&self) -> Vec<String> {
        self.inner.lock().unwrap().exec_commands.clone()
    }

    /// Causes the next `write` call to fail with `err`, simulating a broken
    /// pipe or transient wire fault mid-transfer.
    pub fn fail_next_write(&self, err: FtpClientError) {
        self.inner.lock().unwrap().fail_next_write = Some(err);
    }

    /// Causes the next `data_open` call to fail with `err`, simulating a
    /// server-side `STOR` rejection (e.g. rename-file-busy recovery, §8
    /// scenario 3).
    pub fn fail_next_data_open(&self, err: FtpClientError) {
        self.inner.lock().unwrap().fail_next_data_open = Some(err);
    }

    /// Simulates a server that stops accepting bytes after `bytes` total
    /// have been written on this connection: every `write` call past that
    /// point sleeps `stall_for` before returning, rather than ever failing
    /// outright (§8 scenario 6: "throttles to 0 bytes/s").
    pub fn throttle_after(&self, bytes: u64, stall_for: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.throttle_after_bytes = Some(bytes);
        inner.throttle_stall = Some(stall_for);
    }
}

#[async_trait]
impl FtpClient for FakeFtpServer {
    async fn connect(&mut self, _host: &str, _port: u16, _implicit_tls: bool, _strict_verify: bool) -> Result<(), FtpClientError> {
        Ok(())
    }

    async fn auth_tls(&mut self, _strict: bool) -> Result<(), FtpClientError> {
        Ok(())
    }

    async fn user(&mut self, name: &str) -> Result<(), FtpClientError> {
        let inner = self.inner.lock().unwrap();
        if let Some((expected_user, _)) = &inner.valid_credentials {
            if expected_user != name {
                return Err(FtpClientError::new(530, "Login incorrect.", false));
            }
        }
        Ok(())
    }

    async fn pass(&mut self, password: &str) -> Result<(), FtpClientError> {
        let inner = self.inner.lock().unwrap();
        if let Some((_, expected_pass)) = &inner.valid_credentials {
            if expected_pass != password {
                return Err(FtpClientError::new(530, "Login incorrect.", false));
            }
        }
        Ok(())
    }

    async fn idle(&mut self, _timeout_secs: u32) -> Result<(), FtpClientError> {
        Ok(())
    }

    async fn transfer_type(&mut self, _kind: TransferType) -> Result<(), FtpClientError> {
        Ok(())
    }

    async fn utf8_on(&mut self) -> Result<(), FtpClientError> {
        Ok(())
    }

    async fn cd(&mut self, path: &str, _create_if_missing: bool) -> Result<Option<String>, FtpClientError> {
        self.inner.lock().unwrap().cwd = path.to_string();
        Ok(None)
    }

    async fn exec(&mut self, site_cmd: &str, _arg: Option<&str>) -> Result<(), FtpClientError> {
        self.inner.lock().unwrap().exec_commands.push(site_cmd.to_string());
        Ok(())
    }

    async fn data_open(
        &mut self,
        name: &str,
        append_offset: u64,
        direction: DataDirection,
        _create_dir: bool,
    ) -> Result<Option<String>, FtpClientError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = inner.fail_next_data_open.take() {
            return Err(err);
        }
        if direction == DataDirection::Write {
            let entry = inner.files.entry(name.to_string()).or_default();
            if append_offset == 0 {
                entry.bytes.clear();
            } else {
                entry.bytes.truncate(append_offset as usize);
            }
            inner.open_write = Some((name.to_string(), append_offset as usize));
        }
        Ok(None)
    }

    async fn auth_data(&mut self) -> Result<(), FtpClientError> {
        self.inner.lock().unwrap().auth_data_calls += 1;
        Ok(())
    }

    async fn write(&mut self, block: &[u8]) -> Result<usize, FtpClientError> {
        let (should_stall, stall_for) = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(err) = inner.fail_next_write.take() {
                return Err(err);
            }
            let Some((name, _)) = inner.open_write.clone() else {
                return Err(FtpClientError::new(425, "Can't open data connection.", false));
            };
            inner.files.entry(name).or_default().bytes.extend_from_slice(block);
            inner.bytes_written_total += block.len() as u64;
            let should_stall = inner.throttle_after_bytes.is_some_and(|t| inner.bytes_written_total >= t);
            (should_stall, inner.throttle_stall)
        };
        if should_stall {
            if let Some(dur) = stall_for {
                tokio::time::sleep(dur).await;
            }
        }
        Ok(block.len())
    }

    async fn close_data(&mut self) -> Result<(), FtpClientError> {
        self.inner.lock().unwrap().open_write = None;
        Ok(())
    }

    async fn size(&mut self, name: &str) -> Result<u64, FtpClientError> {
        let inner = self.inner.lock().unwrap();
        inner
            .files
            .get(name)
            .map(|f| f.bytes.len() as u64)
            .ok_or_else(|| FtpClientError::new(550, format!("{name}: No such file or directory."), false))
    }

    async fn list_line(&mut self, _mode: FtpMode, name: &str) -> Result<String, FtpClientError> {
        let size = self.size(name).await?;
        Ok(format!("-rw-r--r-- 1 ftp ftp {size} Jan 01 00:00 {name}"))
    }

    async fn chmod(&mut self, _name: &str, _mode: &str) -> Result<(), FtpClientError> {
        Ok(())
    }

    async fn set_date(&mut self, name: &str, mtime: i64) -> Result<(), FtpClientError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.files.get_mut(name) {
            Some(f) => {
                f.mtime = Some(mtime);
                Ok(())
            }
            None => Err(FtpClientError::new(550, format!("{name}: No such file or directory."), false)),
        }
    }

    async fn move_file(&mut self, from: &str, to: &str, _create_dir: bool) -> Result<(), FtpClientError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.files.remove(from) {
            Some(f) => {
                inner.files.insert(to.to_string(), f);
                Ok(())
            }
            None => Err(FtpClientError::new(550, format!("{from}: No such file or directory."), false)),
        }
    }

    async fn dele(&mut self, name: &str) -> Result<(), FtpClientError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.files.remove(name) {
            Some(_) => Ok(()),
            None => Err(FtpClientError::new(550, format!("{name}: No such file or directory."), false)),
        }
    }

    async fn keepalive(&mut self) -> Result<(), FtpClientError> {
        Ok(())
    }

    async fn quit(&mut self) -> Result<(), FtpClientError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_size_reflects_bytes() {
        let mut server = FakeFtpServer::new();
        server.data_open("f.dat", 0, DataDirection::Write, false).await.unwrap();
        server.write(b"hello").await.unwrap();
        server.close_data().await.unwrap();
        assert_eq!(server.size("f.dat").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn append_offset_preserves_prefix() {
        let mut server = FakeFtpServer::new();
        server.data_open("f.dat", 0, DataDirection::Write, false).await.unwrap();
        server.write(b"0123456789").await.unwrap();
        server.close_data().await.unwrap();

        server.data_open("f.dat", 5, DataDirection::Write, false).await.unwrap();
        server.write(b"XXXXX").await.unwrap();
        server.close_data().await.unwrap();

        assert_eq!(server.file_bytes("f.dat").unwrap(), b"01234XXXXX");
    }

    #[tokio::test]
    async fn bad_credentials_reject_with_530() {
        let mut server = FakeFtpServer::new();
        server.require_credentials("alice", "secret");
        let err = server.user("mallory").await.unwrap_err();
        assert_eq!(err.code, 530);
    }

    #[tokio::test]
    async fn move_then_dele_of_original_fails() {
        let mut server = FakeFtpServer::new();
        server.data_open(".initial", 0, DataDirection::Write, false).await.unwrap();
        server.write(b"payload").await.unwrap();
        server.close_data().await.unwrap();

        server.move_file(".initial", "final.dat", false).await.unwrap();
        assert!(server.file_exists("final.dat"));
        assert!(!server.file_exists(".initial"));
        assert!(server.dele(".initial").await.is_err());
    }

    #[tokio::test]
    async fn injected_write_failure_surfaces_once() {
        let mut server = FakeFtpServer::new();
        server.data_open("f.dat", 0, DataDirection::Write, false).await.unwrap();
        server.fail_next_write(FtpClientError::new(426, "Connection closed; transfer aborted.", false));

        let err = server.write(b"x").await.unwrap_err();
        assert_eq!(err.code, 426);
        server.write(b"y").await.unwrap();
    }
}
