//! Batch Manifest (§3): the ordered file list a worker invocation owns for
//! the life of one staged directory.

use std::path::PathBuf;

/// One file awaiting transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub file_name: String,
    pub file_size: u64,
    pub mtime: Option<i64>,
}

/// Ordered list of files staged under one worker invocation's directory
/// (§3: "Files arrive as a staged directory on the local filesystem named
/// by a unique token; the worker owns it for the duration of the batch").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchManifest {
    pub staging_dir: PathBuf,
    pub entries: Vec<ManifestEntry>,
    /// Files that aged out before the transfer started and must be deleted
    /// both locally and remotely rather than sent (§4.3 READY: "process the
    /// pending-delete list").
    pub pending_delete: Vec<String>,
}

impl BatchManifest {
    #[must_use]
    pub fn new(staging_dir: PathBuf) -> Self {
        Self { staging_dir, entries: Vec::new(), pending_delete: Vec::new() }
    }

    #[must_use]
    pub fn files_to_send(&self) -> u32 {
        self.entries.len() as u32
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.file_size).sum()
    }

    #[must_use]
    pub fn is_zero_size(&self) -> bool {
        self.total_bytes() == 0
    }

    pub fn local_path(&self, entry: &ManifestEntry) -> PathBuf {
        self.staging_dir.join(&entry.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_entry_sizes() {
        let mut manifest = BatchManifest::new("/spool/abc".into());
        manifest.entries.push(ManifestEntry { file_name: "a".into(), file_size: 10, mtime: None });
        manifest.entries.push(ManifestEntry { file_name: "b".into(), file_size: 20, mtime: None });
        assert_eq!(manifest.files_to_send(), 2);
        assert_eq!(manifest.total_bytes(), 30);
        assert!(!manifest.is_zero_size());
    }

    #[test]
    fn empty_manifest_is_zero_size() {
        let manifest = BatchManifest::new("/spool/abc".into());
        assert!(manifest.is_zero_size());
    }
}
