//! Per-conversion scratch directories for rendered page images.
//!
//! Every conversion gets its own directory named after the job and file it
//! belongs to plus a random suffix, so two conversions running at once can
//! never overwrite each other's `page-0001.png`. The directory is removed
//! when the [`ScratchDir`] is dropped, whether the conversion succeeded,
//! failed or panicked.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// An isolated, self-deleting scratch directory.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create `<root>/scan2docx-<tag>-XXXXXX`.
    ///
    /// `root` defaults to the system temp directory and is created if
    /// missing. The tag is sanitised to `[A-Za-z0-9_-]`.
    pub fn create(root: Option<&Path>, tag: &str) -> Result<Self, ConvertError> {
        let root: PathBuf = root
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);

        std::fs::create_dir_all(&root).map_err(|e| ConvertError::ScratchDirFailed {
            path: root.clone(),
            source: e,
        })?;

        let prefix = format!("scan2docx-{}-", sanitise_tag(tag));
        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(&root)
            .map_err(|e| ConvertError::ScratchDirFailed {
                path: root.clone(),
                source: e,
            })?;

        debug!("Scratch directory: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Scratch tag for a file inside a tracked job.
pub fn job_file_tag(job_id: i64, file_id: i64) -> String {
    format!("job-{job_id}-file-{file_id}")
}

fn sanitise_tag(tag: &str) -> String {
    let cleaned: String = tag
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    if cleaned.is_empty() {
        "adhoc".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_named_after_tag() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(Some(root.path()), &job_file_tag(7, 3)).unwrap();
        let name = scratch.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("scan2docx-job-7-file-3-"), "got: {name}");
        assert!(scratch.path().starts_with(root.path()));
    }

    #[test]
    fn same_tag_twice_gives_distinct_dirs() {
        let root = tempfile::tempdir().unwrap();
        let a = ScratchDir::create(Some(root.path()), "same").unwrap();
        let b = ScratchDir::create(Some(root.path()), "same").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn dropped_dir_is_removed() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(Some(root.path()), "gone").unwrap();
        let path = scratch.path().to_path_buf();
        std::fs::write(path.join("page-0001.png"), b"png").unwrap();
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn missing_root_is_created() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a/b");
        let scratch = ScratchDir::create(Some(&nested), "x").unwrap();
        assert!(scratch.path().starts_with(&nested));
    }

    #[test]
    fn tags_are_sanitised() {
        assert_eq!(sanitise_tag("../../etc"), "______etc");
        assert_eq!(sanitise_tag(""), "adhoc");
        assert_eq!(sanitise_tag("job-1_file-2"), "job-1_file-2");
    }
}
