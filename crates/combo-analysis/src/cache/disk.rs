//! On-disk cache: one `{fingerprint}.json` file per entry.

use super::{CACHE_VERSION, CacheEntry, CacheError, CacheStore};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Directory-backed [`CacheStore`].
///
/// Each write goes to its own uniquely named temporary file in the cache
/// directory, which is then renamed into place. Readers never see a
/// half-written record, even when several writers store the same fingerprint.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Create the store, creating `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `fingerprint`.
    pub fn entry_path(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{fingerprint}.json"))
    }
}

impl CacheStore for DiskCache {
    fn get(&self, fingerprint: &str) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(fingerprint);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        // Check the version before committing to the full layout.
        let value: serde_json::Value = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring corrupt cache record {}: {}", path.display(), e);
                return Ok(None);
            }
        };
        let version = value.get("version").and_then(serde_json::Value::as_u64);
        if version != Some(u64::from(CACHE_VERSION)) {
            debug!(
                path = %path.display(),
                ?version,
                "Ignoring cache record with unknown version"
            );
            return Ok(None);
        }

        match serde_json::from_value::<CacheEntry>(value) {
            Ok(entry) if entry.fingerprint == fingerprint => Ok(Some(entry)),
            Ok(_) => {
                warn!("Cache record {} has a mismatched fingerprint", path.display());
                Ok(None)
            }
            Err(e) => {
                warn!("Ignoring malformed cache record {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let path = self.entry_path(&entry.fingerprint);
        let bytes = serde_json::to_vec(&entry)?;

        let io_error = |source| CacheError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_error)?;
        tmp.write_all(&bytes).map_err(io_error)?;
        tmp.persist(&path).map_err(|e| CacheError::Io {
            path: path.clone(),
            source: e.error,
        })?;
        debug!(path = %path.display(), "Stored cache record");
        Ok(())
    }

    fn name(&self) -> &str {
        "disk"
    }
}
