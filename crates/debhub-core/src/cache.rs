//! Durable tag to blob store backing parsed control blocks across restarts.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use debhub_utils::{
    error::{FileSystemError, FileSystemResult},
    fs::{replace_file_atomic, safe_remove},
};
use tracing::trace;

/// Kind suffix for augmented control blocks.
pub const CONTROL_KIND: &str = "control";

#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `tag`. The tag is hex-encoded, so distinct tags never share a
    /// file and no tag can escape the cache root.
    pub fn entry_path(&self, tag: &str, kind: &str) -> PathBuf {
        self.root.join(format!("{}.{kind}", hex::encode(tag)))
    }

    /// Returns the stored bytes for `tag`, or `None` if there is no entry.
    pub fn get(&self, tag: &str, kind: &str) -> FileSystemResult<Option<Vec<u8>>> {
        let path = self.entry_path(tag, kind);
        match fs::read(&path) {
            Ok(data) => {
                trace!(path = %path.display(), "cache hit");
                Ok(Some(data))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => {
                Err(FileSystemError::File {
                    path,
                    action: "read",
                    source,
                })
            }
        }
    }

    /// Stores `data` under `tag`. Readers see either the previous entry or the complete new
    /// one; concurrent writers of the same tag race and the last rename wins.
    pub fn put(&self, tag: &str, kind: &str, data: &[u8]) -> FileSystemResult<()> {
        replace_file_atomic(self.entry_path(tag, kind), data)
    }

    /// Removes every entry.
    pub fn clear(&self) -> FileSystemResult<()> {
        safe_remove(&self.root)
    }
}
