//! Report cache keyed by content fingerprint.
//!
//! A cache hit returns the stored [`AnalysisReport`] without running any
//! analyzer. Entries never expire; only a different fingerprint misses.
//! Stores must treat an unreadable, malformed or version-mismatched record
//! as a miss, never as a failure of the run.
//!
//! Two stores ship with the crate:
//!
//! - [`MemoryCache`] - process-local, shared between engines through `Arc`
//! - [`DiskCache`] - one JSON file per fingerprint under a directory

mod disk;
mod fingerprint;

pub use disk::DiskCache;
pub use fingerprint::{SAMPLE_ROWS, fingerprint};

use crate::types::AnalysisReport;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Version of the persisted record layout. Records with another version miss.
pub const CACHE_VERSION: u32 = 1;

/// Failure of a cache store. Logged and ignored by the engine.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One stored report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub version: u32,
    pub fingerprint: String,
    /// RFC 3339 timestamp of when the entry was written.
    pub created_at: String,
    pub report: AnalysisReport,
}

impl CacheEntry {
    pub fn new(fingerprint: impl Into<String>, report: AnalysisReport) -> Self {
        Self {
            version: CACHE_VERSION,
            fingerprint: fingerprint.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            report,
        }
    }
}

/// Storage backend for cached reports.
///
/// Implementations must be `Send + Sync`: one store may back several engines
/// on different threads.
pub trait CacheStore: Send + Sync {
    /// Look up an entry. `Ok(None)` on a miss, including unusable records.
    fn get(&self, fingerprint: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Store an entry, replacing any previous one with the same fingerprint.
    fn put(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Short name for logging.
    fn name(&self) -> &str;
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, fingerprint: &str) -> Result<Option<CacheEntry>, CacheError> {
        let entries = self.entries.read();
        Ok(entries
            .get(fingerprint)
            .filter(|entry| entry.version == CACHE_VERSION)
            .cloned())
    }

    fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries.write().insert(entry.fingerprint.clone(), entry);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
