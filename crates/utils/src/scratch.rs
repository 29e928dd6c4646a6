//! Request-scoped temporary files.
//!
//! Concurrent requests share one scratch directory, so every path carries a
//! millisecond timestamp and a random suffix. A [`ScratchFile`] removes its
//! path when dropped; removal failures are logged and never surface to the
//! request that owned the file.

use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ScratchError {
    #[error("failed to prepare scratch directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to write scratch file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to read scratch file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if it does not exist yet.
    pub async fn ensure(&self) -> Result<(), ScratchError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| ScratchError::CreateDir {
                path: self.root.clone(),
                source,
            })
    }

    /// Reserve a unique path. Nothing is created on disk until the caller
    /// (or a worker) writes to it.
    pub fn reserve(&self, prefix: &str, extension: &str) -> ScratchFile {
        let millis = chrono::Utc::now().timestamp_millis();
        let name = format!("{prefix}_{millis}_{}.{extension}", Uuid::new_v4().simple());
        ScratchFile {
            path: self.root.join(name),
        }
    }

    /// Reserve a unique path and write `bytes` to it.
    pub async fn write(
        &self,
        prefix: &str,
        extension: &str,
        bytes: &[u8],
    ) -> Result<ScratchFile, ScratchError> {
        self.ensure().await?;
        let file = self.reserve(prefix, extension);
        tokio::fs::write(&file.path, bytes)
            .await
            .map_err(|source| ScratchError::Write {
                path: file.path.clone(),
                source,
            })?;
        Ok(file)
    }
}

/// A scratch path owned by one request. Deleted on drop.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<Vec<u8>, ScratchError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| ScratchError::Read {
                path: self.path.clone(),
                source,
            })
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed scratch file {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove scratch file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path().join("uploads"));

        let file = scratch.write("upload", "png", b"abc").await.unwrap();
        let path = file.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(file.read().await.unwrap(), b"abc");

        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn test_reserved_paths_are_unique() {
        let scratch = ScratchDir::new("uploads");
        let a = scratch.reserve("basic_excel", "xlsx");
        let b = scratch.reserve("basic_excel", "xlsx");
        assert_ne!(a.path(), b.path());

        let name = a.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("basic_excel_"));
        assert!(name.ends_with(".xlsx"));
    }

    #[test]
    fn test_dropping_unwritten_reservation_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path());
        let file = scratch.reserve("never_written", "xlsx");
        assert!(!file.path().exists());
        drop(file);
    }
}
