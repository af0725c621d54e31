//! On-disk artifact states for one logical output file
//!
//! An output is written to `<final>.partial` and renamed into place only
//! after the producing tool reported success. A `.partial` file found at the
//! start of a run is always a leftover from a killed run and is discarded.

use crate::error::{FileError, FileResult};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Reserved suffix for in-progress outputs
pub const TEMP_SUFFIX: &str = ".partial";

/// Observed state of a logical output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Absent,
    WorkInProgress,
    Complete,
}

/// Temporary sibling path for `final_path`
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut name = OsString::from(final_path.as_os_str());
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Inspect the state of `final_path`
///
/// `Complete` wins over `WorkInProgress`: a final file is never rebuilt.
pub fn inspect(final_path: &Path) -> ArtifactState {
    if final_path.exists() {
        ArtifactState::Complete
    } else if temp_path(final_path).exists() {
        ArtifactState::WorkInProgress
    } else {
        ArtifactState::Absent
    }
}

/// Delete a stale temporary artifact for `final_path`
///
/// Returns the removed path, or `None` if there was nothing to remove.
pub fn remove_stale(final_path: &Path) -> FileResult<Option<PathBuf>> {
    let temp = temp_path(final_path);
    match fs::remove_file(&temp) {
        Ok(()) => Ok(Some(temp)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FileError::io("remove stale artifact", temp, e)),
    }
}

/// Result of trying to promote a temporary artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalized {
    /// Renamed into place
    Renamed,
    /// Tool claimed success but left nothing behind
    MissingTemp,
}

/// Atomically move `<final>.partial` to `final_path`
pub fn finalize(final_path: &Path) -> FileResult<Finalized> {
    let temp = temp_path(final_path);
    if !temp.is_file() {
        return Ok(Finalized::MissingTemp);
    }
    fs::rename(&temp, final_path).map_err(|e| FileError::io("rename", temp, e))?;
    Ok(Finalized::Renamed)
}

/// Remove a temp artifact after a failed tool run, ignoring absence
pub fn discard_temp(final_path: &Path) {
    let temp = temp_path(final_path);
    if let Err(e) = fs::remove_file(&temp) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %temp.display(), error = %e, "Failed to discard partial output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_temp_path_appends_suffix() {
        assert_eq!(
            temp_path(Path::new("/out/a/1.mp3")),
            PathBuf::from("/out/a/1.mp3.partial")
        );
    }

    #[test]
    fn test_state_transitions() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("1.mp3");

        assert_eq!(inspect(&out), ArtifactState::Absent);

        fs::write(temp_path(&out), b"half").unwrap();
        assert_eq!(inspect(&out), ArtifactState::WorkInProgress);

        assert_eq!(finalize(&out).unwrap(), Finalized::Renamed);
        assert_eq!(inspect(&out), ArtifactState::Complete);
        assert!(!temp_path(&out).exists());
    }

    #[test]
    fn test_remove_stale() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("1.mp3");

        assert_eq!(remove_stale(&out).unwrap(), None);

        fs::write(temp_path(&out), b"garbage").unwrap();
        assert_eq!(remove_stale(&out).unwrap(), Some(temp_path(&out)));
        assert_eq!(inspect(&out), ArtifactState::Absent);
    }

    #[test]
    fn test_finalize_without_temp() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("1.mp3");

        assert_eq!(finalize(&out).unwrap(), Finalized::MissingTemp);
        assert!(!out.exists());
    }
}
