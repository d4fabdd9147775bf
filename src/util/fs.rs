//! Filesystem helpers for report destinations

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Remove a file, treating "not found" as success
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// A destination file that is deleted on drop unless committed
///
/// Keeps a failed archive write from leaving a truncated report behind.
pub struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    /// Create `path`, replacing any existing file
    pub fn create(path: &Path) -> io::Result<(Self, File)> {
        remove_if_exists(path)?;
        let file = File::create(path)?;
        Ok((
            Self {
                path: path.to_path_buf(),
                committed: false,
            },
            file,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            debug!(path = %self.path.display(), "removing incomplete output");
            let _ = fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_remove_if_exists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x");
        assert!(!remove_if_exists(&path).unwrap());
        fs::write(&path, "x").unwrap();
        assert!(remove_if_exists(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_uncommitted_file_is_removed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.ods");
        {
            let (_guard, mut file) = PartialFile::create(&path).unwrap();
            file.write_all(b"partial").unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_committed_file_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.ods");
        fs::write(&path, "old contents").unwrap();

        let (guard, mut file) = PartialFile::create(&path).unwrap();
        file.write_all(b"new").unwrap();
        drop(file);
        guard.commit();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }
}
