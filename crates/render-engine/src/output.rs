//! The export directory and descriptors of the files rendered into it.

use std::path::PathBuf;

use clipmix_common::error::ClipmixResult;
use serde::{Deserialize, Serialize};

/// A rendered variant as presented to downloaders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    pub filename: String,
    pub access_url: String,
}

/// Directory that receives rendered variants.
#[derive(Debug, Clone)]
pub struct ExportSpace {
    dir: PathBuf,
    url_prefix: String,
}

impl ExportSpace {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.into(),
        }
    }

    /// Create the directory if needed and delete everything inside it.
    ///
    /// Precondition: nobody is listing the directory concurrently. Entries
    /// that cannot be removed are logged and left behind. Returns the
    /// number of entries removed.
    pub fn prepare(&self) -> ClipmixResult<usize> {
        std::fs::create_dir_all(&self.dir)?;

        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    tracing::warn!(error = %e, dir = %self.dir.display(), "Unreadable export entry");
                    continue;
                }
            };
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "Failed to clear export entry")
                }
            }
        }

        tracing::info!(dir = %self.dir.display(), removed, "Export directory prepared");
        Ok(removed)
    }

    /// Where `filename` is written.
    pub fn output_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    pub fn descriptor(&self, filename: &str) -> OutputDescriptor {
        let prefix = if self.url_prefix.ends_with('/') {
            self.url_prefix.clone()
        } else {
            format!("{}/", self.url_prefix)
        };
        OutputDescriptor {
            filename: filename.to_string(),
            access_url: format!("{prefix}{filename}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_clears_files_and_directories() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("exports");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("old.mp4"), b"x").unwrap();
        std::fs::write(dir.join("nested").join("deep.mp4"), b"x").unwrap();

        let space = ExportSpace::new(&dir, "/download/");
        assert_eq!(space.prepare().unwrap(), 2);
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_prepare_creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("a").join("b");
        let space = ExportSpace::new(&dir, "/download/");
        assert_eq!(space.prepare().unwrap(), 0);
        assert!(dir.is_dir());
    }

    #[test]
    fn test_descriptor_joins_prefix() {
        let space = ExportSpace::new("/srv/exports", "/download");
        let d = space.descriptor("A_lead-skip_C.mp4");
        assert_eq!(d.filename, "A_lead-skip_C.mp4");
        assert_eq!(d.access_url, "/download/A_lead-skip_C.mp4");
        assert_eq!(
            space.output_path("A_lead-skip_C.mp4"),
            PathBuf::from("/srv/exports/A_lead-skip_C.mp4")
        );
    }
}
