//! Persistent key→bytes cache for registry documents.
//!
//! Two tiers: a concurrent in-memory map holding uncompressed values for
//! the current run, and a file-per-key store under the host temp directory
//! that survives across runs. Revalidation is by ETag compare at the
//! resolver layer; entries have no TTL.

mod disk;

pub use disk::DiskCache;

use std::io;
use thiserror::Error;

/// Directory name of the on-disk store, created under the host temp dir.
pub const CACHE_DIR_NAME: &str = ".npu-cache";

/// Errors from the persistent cache.
///
/// Callers treat every cache failure as a miss; these exist so the cache
/// itself can log what actually went wrong.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("cache entry is corrupt")]
    Corrupt,
}

/// Cache abstraction for registry documents.
///
/// Enables swapping the real disk-backed store for a no-op or in-memory
/// one in tests. Implementations must be safe for concurrent use across
/// distinct keys; same-key writes are last-write-wins.
pub trait Cache: Send + Sync {
    /// True when the key is present in either tier.
    fn has(&self, key: &str) -> bool;

    /// Reads a value, consulting the in-memory tier first.
    ///
    /// Returns `None` on a miss or on any read/decode failure.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Writes a value to both tiers.
    fn set(&self, key: &str, data: &[u8]) -> Result<(), CacheError>;

    /// Discards both tiers.
    fn clean(&self) -> Result<(), CacheError>;
}

/// Cache that never stores anything.
///
/// Every read is a miss and every write is accepted and dropped. Useful in
/// tests and for forcing fresh registry fetches.
#[derive(Debug, Default, Clone)]
pub struct NoopCache;

impl NoopCache {
    pub fn new() -> Self {
        Self
    }
}

impl Cache for NoopCache {
    fn has(&self, _key: &str) -> bool {
        false
    }

    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _data: &[u8]) -> Result<(), CacheError> {
        Ok(())
    }

    fn clean(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// The cache key holding the serialised candidate set for a package.
pub fn package_key(name: &str) -> String {
    name.to_string()
}

/// The adjacent key holding the ETag of the most recent successful fetch.
pub fn etag_key(name: &str) -> String {
    format!("{name}-etag")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_cache_always_misses() {
        let cache = NoopCache::new();
        assert!(!cache.has("react"));
        assert_eq!(cache.get("react"), None);

        cache.set("react", b"data").unwrap();
        assert_eq!(cache.get("react"), None);
        assert!(!cache.has("react"));
    }

    #[test]
    fn test_noop_cache_clean() {
        let cache = NoopCache::new();
        assert!(cache.clean().is_ok());
    }

    #[test]
    fn test_key_families() {
        assert_eq!(package_key("react"), "react");
        assert_eq!(etag_key("react"), "react-etag");
        assert_eq!(etag_key("@acme/widget"), "@acme/widget-etag");
    }

    #[test]
    fn test_cache_is_object_safe() {
        let cache: Box<dyn Cache> = Box::new(NoopCache::new());
        assert!(!cache.has("anything"));
    }
}
