//! Whole-file JSON documents with atomic replacement.
//!
//! Every persisted structure in the crawler (registry, metrics, dedup hashes,
//! output collections) is a single JSON document that is rewritten in full.
//! Writes go to a temp file in the same directory and are renamed over the
//! destination, so a crash never leaves a half-written document behind.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::types::StorageError;

/// Maximum document size accepted on load (64 MB).
const MAX_DOCUMENT_SIZE: u64 = 64 * 1024 * 1024;

/// Loads a JSON document, returning `T::default()` when the file is absent or blank.
///
/// # Errors
///
/// - [`StorageError::Io`] if the file exists but cannot be read
/// - [`StorageError::TooLarge`] if the file exceeds 64 MB
/// - [`StorageError::Json`] if the content is not valid JSON for `T`
pub fn load_document<T>(path: &Path) -> Result<T, StorageError>
where
    T: DeserializeOwned + Default,
{
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > MAX_DOCUMENT_SIZE => {
            return Err(StorageError::TooLarge {
                path: path.to_path_buf(),
                size: meta.len(),
            });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Document not found, starting empty");
            return Ok(T::default());
        }
        Err(e) => return Err(StorageError::io(path, e)),
        Ok(_) => {}
    }

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(StorageError::io(path, e)),
    };

    if content.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&content).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Serializes `value` as pretty JSON and atomically replaces `path`.
///
/// Parent directories are created as needed.
pub fn save_document<T>(path: &Path, value: &T) -> Result<(), StorageError>
where
    T: Serialize + ?Sized,
{
    let json = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    atomic_write(path, &json)
}

/// Renames an undecodable document to `<name>.corrupt-<UTC stamp>` in the
/// same directory and returns the new path.
///
/// The next save then writes a fresh file instead of replacing the old one.
pub fn quarantine_document(path: &Path, at: DateTime<Utc>) -> Result<PathBuf, StorageError> {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".corrupt-{}", at.format("%Y%m%dT%H%M%SZ")));
    let aside = path.with_file_name(name);

    std::fs::rename(path, &aside).map_err(|e| StorageError::io(path, e))?;
    Ok(aside)
}

/// Write-to-temp-then-rename so the destination is never left partial.
fn atomic_write(dst: &Path, content: &[u8]) -> Result<(), StorageError> {
    let temp_path = temp_path_for(dst);

    let mut temp_file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(|e| StorageError::io(&temp_path, e))?;

    let written = temp_file
        .write_all(content)
        .and_then(|()| temp_file.sync_all());
    drop(temp_file);

    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(StorageError::io(&temp_path, e));
    }

    // On Windows, rename fails if destination exists
    #[cfg(windows)]
    if dst.exists() {
        if let Err(e) = std::fs::remove_file(dst) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StorageError::io(dst, e));
        }
    }

    std::fs::rename(&temp_path, dst).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        StorageError::io(dst, e)
    })
}

fn temp_path_for(dst: &Path) -> PathBuf {
    use std::time::{SystemTime, UNIX_EPOCH};
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    dst.with_extension(format!("tmp.{:016x}.{}", suffix, std::process::id()))
}
