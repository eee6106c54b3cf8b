//! Archive / Unlink Finalizer (AUF): post-delivery disposition of the local
//! staged file (§4.6, §4.3.1 step 17).

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{error, warn};

/// Up to this many retries on `EBUSY` while unlinking, spaced `RETRY_SPACING`
/// apart (§4.3.1 step 17: "On `EBUSY`, retry unlink up to 20x with 100ms
/// spacing").
pub const MAX_UNLINK_RETRIES: u32 = 20;
pub const RETRY_SPACING: Duration = Duration::from_millis(100);

/// What happened to the local file (feeds the output-log record's
/// archive-name field, §4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Archived { archive_path: PathBuf },
    Unlinked,
}

#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error("failed to unlink {path}: {source}")]
    Unlink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Archives `local_path` into `archive_dir` if `archive_time > 0` and the
/// directory is usable, else unlinks it. Archiving is attempted exactly
/// once and is never retried on failure — on failure the file is unlinked
/// instead so the spool does not overflow (§4.6).
pub async fn finalize(
    local_path: &Path,
    archive_dir: Option<&Path>,
    archive_time_secs: u64,
) -> Result<Disposition, FinalizeError> {
    if archive_time_secs > 0 {
        if let Some(dir) = archive_dir {
            match try_archive(local_path, dir).await {
                Ok(archive_path) => return Ok(Disposition::Archived { archive_path }),
                Err(source) => {
                    warn!(path = %local_path.display(), error = %source, "archive failed, unlinking instead");
                }
            }
        }
    }

    unlink_with_retry(local_path).await?;
    Ok(Disposition::Unlinked)
}

async fn try_archive(local_path: &Path, archive_dir: &Path) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(archive_dir).await?;
    let file_name = local_path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "local path has no file name")
    })?;
    let dest = archive_dir.join(file_name);
    tokio::fs::rename(local_path, &dest).await?;
    Ok(dest)
}

/// Unlinks `path`, retrying on `EBUSY` up to [`MAX_UNLINK_RETRIES`] times
/// spaced [`RETRY_SPACING`] apart. All failures other than `ENOENT`/`EBUSY`
/// are logged at error level, per §7 "Local vs surfaced."
async fn unlink_with_retry(path: &Path) -> Result<(), FinalizeError> {
    for attempt in 0..=MAX_UNLINK_RETRIES {
        match tokio::fs::remove_file(path).await {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) if is_busy(&e) && attempt < MAX_UNLINK_RETRIES => {
                tokio::time::sleep(RETRY_SPACING).await;
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "unlink failed");
                return Err(FinalizeError::Unlink { path: path.to_path_buf(), source: e });
            }
        }
    }
    unreachable!("loop always returns on its last iteration")
}

fn is_busy(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(libc::EBUSY)
}
