//! Per-run working directory: creation, layout, best-effort removal.
//!
//! Every run gets a fresh directory under the configured output root, named
//! after the current UTC instant so concurrent invocations of the binary
//! never collide. The directory owns all intermediate artifacts — the saved
//! input PDF, the optional extracted PDF, and the rendered page images — and
//! is removed recursively when the run ends, whatever the outcome. Removal
//! errors are ignored: a leftover directory is a nuisance, not a failure.

use crate::error::PdfScribeError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The per-run temporary filesystem scope.
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    /// Create a fresh `<output_root>/<timestamp>` directory together with
    /// its `images/` subdirectory.
    pub fn create(output_root: &Path) -> Result<Self, PdfScribeError> {
        let root = output_root.join(timestamp_dirname(Utc::now()));
        std::fs::create_dir_all(root.join("images"))
            .map_err(|e| PdfScribeError::io(format!("creating {}", root.display()), e))?;
        debug!("Working directory: {}", root.display());
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Path of the persisted input PDF.
    pub fn input_pdf(&self) -> PathBuf {
        self.root.join("input.pdf")
    }

    /// Path of the range-extracted PDF (only materialised for sub-ranges).
    pub fn extracted_pdf(&self) -> PathBuf {
        self.root.join("extracted.pdf")
    }

    /// Directory the rasteriser writes page images into.
    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    /// Remove the directory tree, ignoring errors.
    pub fn cleanup(&self) {
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            debug!("Ignoring cleanup failure for {}: {}", self.root.display(), e);
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        // cleanup() already ran on the normal path; removing an absent
        // directory fails and the error is ignored.
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

/// ISO-8601 UTC timestamp with `-`, `:` and `.` stripped, so the directory
/// name is shell- and filesystem-safe on every platform.
fn timestamp_dirname(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_has_no_separators() {
        let t = Utc.with_ymd_and_hms(2024, 3, 7, 16, 5, 9).unwrap();
        let name = timestamp_dirname(t);
        assert_eq!(name, "20240307T160509000Z");
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn create_and_cleanup_round_trip() {
        let base = tempfile::tempdir().unwrap();
        let wd = WorkDir::create(base.path()).unwrap();
        assert!(wd.path().is_dir());
        assert!(wd.images_dir().is_dir());
        assert!(wd.path().starts_with(base.path()));

        let root = wd.path().to_path_buf();
        wd.cleanup();
        assert!(!root.exists());
    }

    #[test]
    fn drop_removes_leftovers() {
        let base = tempfile::tempdir().unwrap();
        let root = {
            let wd = WorkDir::create(base.path()).unwrap();
            std::fs::write(wd.input_pdf(), b"%PDF-1.4").unwrap();
            wd.path().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[test]
    fn artifact_paths_live_under_root() {
        let base = tempfile::tempdir().unwrap();
        let wd = WorkDir::create(base.path()).unwrap();
        assert!(wd.input_pdf().starts_with(wd.path()));
        assert!(wd.extracted_pdf().starts_with(wd.path()));
        assert!(wd.images_dir().starts_with(wd.path()));
    }
}
