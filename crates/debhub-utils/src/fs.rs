use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::error::{FileSystemError, FileSystemResult};

/// Creates a directory structure if it doesn't exist.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if the directory could not be created.
/// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if !path.exists() {
        fs::create_dir_all(path).map_err(|err| FileSystemError::Directory {
            path: path.to_path_buf(),
            action: "create",
            source: err,
        })?;
    } else if !path.is_dir() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    Ok(())
}

/// Removes the specified file or directory, doing nothing if it does not exist.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();

    if !path.exists() {
        return Ok(());
    }

    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|err| FileSystemError::File {
        path: path.to_path_buf(),
        action: "remove",
        source: err,
    })
}

/// Replaces the contents of `path` without ever exposing a partially written file.
///
/// The bytes go to a fresh temporary file next to the destination, which is closed and then
/// renamed over `path`. Readers observe either the previous entry or the complete new one.
/// Concurrent writers of the same path race and the last rename wins.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if the parent directory cannot be created.
/// * [`FileSystemError::File`] if the temporary file cannot be written or renamed.
///
/// # Example
///
/// ```no_run
/// use debhub_utils::fs::replace_file_atomic;
///
/// replace_file_atomic("/tmp/debhub-doc/entry.control", b"Package: foo\n").unwrap();
/// ```
pub fn replace_file_atomic<P: AsRef<Path>>(path: P, contents: &[u8]) -> FileSystemResult<()> {
    let path = path.as_ref();
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    ensure_dir_exists(&parent)?;

    let temp_err = |source| FileSystemError::File {
        path: path.to_path_buf(),
        action: "write temporary",
        source,
    };

    let mut temp = NamedTempFile::new_in(&parent).map_err(temp_err)?;
    temp.write_all(contents).map_err(temp_err)?;
    temp.as_file().sync_all().map_err(temp_err)?;

    temp.persist(path).map_err(|err| FileSystemError::File {
        path: path.to_path_buf(),
        action: "rename",
        source: err.error,
    })?;

    Ok(())
}
