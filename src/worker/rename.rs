//! Filename derivation for the per-file pipeline's rename step (§4.3.1 step
//! 3): `final_filename`, `initial_filename`, and `remote_filename`.

/// Locking affix applied to the name the remote side sees during upload
/// (§4.3.1 step 3b/3c/3d).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockingMode {
    None,
    /// Prepend `.` (or a configured notation) to the name.
    Dot,
    /// Like `Dot`, but the remote name additionally gets a trailing `;`
    /// appended after the rename and stripped again before logging.
    DotVms,
    /// Append the lock notation as a suffix instead of a prefix.
    Postfix,
    /// Append `.<unique_number>`.
    UniqueLocking,
    /// Append `-<retries>`; retrying first `dele`s the previous
    /// `-<retries-1>` form.
    SequenceLocking,
    /// Batch-level lock: an empty marker file is opened/closed once per
    /// batch (§4.3 LOCKFILE) rather than any per-file name being altered.
    LockFile,
}

/// Sum of the legacy buffer sizes a derived name must fit within
/// (§4.3.1 step 3: "constrained to `MAX_RECIPIENT_LENGTH +
/// MAX_FILENAME_LENGTH`").
pub const MAX_RECIPIENT_LENGTH: usize = 256;
pub const MAX_FILENAME_LENGTH: usize = 256;
pub const MAX_DERIVED_NAME_LENGTH: usize = MAX_RECIPIENT_LENGTH + MAX_FILENAME_LENGTH;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenameError {
    #[error("derived name '{0}' exceeds the {MAX_DERIVED_NAME_LENGTH}-byte limit")]
    NameTooLong(String),
}

/// The three derived names for one file transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedNames {
    pub final_filename: String,
    pub initial_filename: String,
    pub remote_filename: String,
    /// Present only for `SequenceLocking` on a retry: the previous
    /// `-<retries-1>` form that must be `dele`d before upload (§4.3.1 step
    /// 3d).
    pub stale_sequence_sibling: Option<String>,
}

/// Computes `final_filename`/`initial_filename`/`remote_filename` per
/// §4.3.1 step 3. `renamed_name` is the result of any trans-rename rule,
/// content-name filter, or name-to-directory mapping already applied
/// upstream (step 3a); this function only applies the locking affix.
#[allow(clippy::too_many_arguments)]
pub fn derive_names(
    original_name: &str,
    renamed_name: &str,
    target_dir: Option<&str>,
    fast_cd: bool,
    locking: LockingMode,
    lock_notation: &str,
    unique_number: u32,
    retries: u32,
) -> Result<DerivedNames, RenameError> {
    let final_filename = match target_dir {
        Some(dir) if fast_cd => format!("{dir}/{original_name}"),
        _ => original_name.to_string(),
    };

    let mut stale_sequence_sibling = None;
    let mut working = renamed_name.to_string();

    match locking {
        LockingMode::None | LockingMode::LockFile => {}
        LockingMode::Dot => working = format!(".{working}"),
        LockingMode::DotVms => working = format!(".{working}"),
        LockingMode::Postfix => working = format!("{working}{lock_notation}"),
        LockingMode::UniqueLocking => working = format!("{working}.{unique_number}"),
        LockingMode::SequenceLocking => {
            if retries > 0 {
                stale_sequence_sibling = Some(format!("{working}-{}", retries - 1));
            }
            working = format!("{working}-{retries}");
        }
    }

    let initial_filename = working;
    let remote_filename = match locking {
        LockingMode::DotVms => format!("{};", strip_leading_dot(&initial_filename)),
        _ => strip_leading_dot(&initial_filename),
    };

    for candidate in [&final_filename, &initial_filename, &remote_filename] {
        if candidate.len() > MAX_DERIVED_NAME_LENGTH {
            return Err(RenameError::NameTooLong(candidate.clone()));
        }
    }

    Ok(DerivedNames { final_filename, initial_filename, remote_filename, stale_sequence_sibling })
}

fn strip_leading_dot(name: &str) -> String {
    name.strip_prefix('.').map(str::to_string).unwrap_or_else(|| name.to_string())
}

/// Strips a trailing `;` added by `DotVms` before the name is logged
/// (§4.3.1 step 13: "For `DOT_VMS`, strip trailing dot from `final`" —
/// applied here to the remote name as logged).
#[must_use]
pub fn strip_vms_suffix_for_logging(name: &str) -> String {
    name.strip_suffix(';').unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_locking_leaves_name_untouched() {
        let names = derive_names("a.dat", "a.dat", None, false, LockingMode::None, "", 0, 0).unwrap();
        assert_eq!(names.initial_filename, "a.dat");
        assert_eq!(names.remote_filename, "a.dat");
    }

    #[test]
    fn dot_locking_prefixes_and_strips_for_remote() {
        let names = derive_names("a.dat", "a.dat", None, false, LockingMode::Dot, "", 0, 0).unwrap();
        assert_eq!(names.initial_filename, ".a.dat");
        assert_eq!(names.remote_filename, "a.dat");
    }

    #[test]
    fn dot_vms_appends_semicolon_to_remote_name() {
        let names = derive_names("a.dat", "a.dat", None, false, LockingMode::DotVms, "", 0, 0).unwrap();
        assert_eq!(names.remote_filename, "a.dat;");
        assert_eq!(strip_vms_suffix_for_logging(&names.remote_filename), "a.dat");
    }

    #[test]
    fn unique_locking_appends_unique_number() {
        let names = derive_names("a.dat", "a.dat", None, false, LockingMode::UniqueLocking, "", 42, 0).unwrap();
        assert_eq!(names.initial_filename, "a.dat.42");
    }

    #[test]
    fn sequence_locking_tracks_stale_sibling_on_retry() {
        let names = derive_names("a.dat", "a.dat", None, false, LockingMode::SequenceLocking, "", 0, 2).unwrap();
        assert_eq!(names.initial_filename, "a.dat-2");
        assert_eq!(names.stale_sequence_sibling.as_deref(), Some("a.dat-1"));
    }

    #[test]
    fn sequence_locking_first_attempt_has_no_stale_sibling() {
        let names = derive_names("a.dat", "a.dat", None, false, LockingMode::SequenceLocking, "", 0, 0).unwrap();
        assert_eq!(names.stale_sequence_sibling, None);
    }

    #[test]
    fn fast_cd_prefixes_final_filename_with_target_dir() {
        let names = derive_names("a.dat", "a.dat", Some("incoming"), true, LockingMode::None, "", 0, 0).unwrap();
        assert_eq!(names.final_filename, "incoming/a.dat");
    }

    #[test]
    fn oversized_name_is_rejected() {
        let long_name = "x".repeat(MAX_DERIVED_NAME_LENGTH + 1);
        let result = derive_names(&long_name, &long_name, None, false, LockingMode::None, "", 0, 0);
        assert!(result.is_err());
    }
}
