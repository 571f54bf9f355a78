//! Blocking file access for sources.

use crate::error::{PrefsError, PrefsResult};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Read a whole file as bytes. Missing files map to `FileNotFound`.
pub fn read_bytes(path: &Path) -> PrefsResult<Vec<u8>> {
    let display = path.display().to_string();
    if !path.exists() {
        return Err(PrefsError::file_not_found(&display));
    }
    std::fs::read(path).map_err(|e| PrefsError::io(&display, e))
}

/// Write `bytes` to `path` atomically.
///
/// The content goes to a temporary file in the destination directory which
/// is then renamed over `path`, so readers never observe a partial file.
/// Missing parent directories are created.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> PrefsResult<()> {
    let display = path.display().to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().map_err(|e| PrefsError::io(&display, e))?,
    };
    std::fs::create_dir_all(&dir).map_err(|e| PrefsError::io(&display, e))?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| PrefsError::io(&display, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| PrefsError::io(&display, e))?;
    tmp.persist(path)
        .map_err(|e| PrefsError::io(&display, e.error))?;
    Ok(())
}
