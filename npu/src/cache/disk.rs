//! Disk-backed cache with an in-memory overlay and transparent
//! compression.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, warn};

use super::{Cache, CacheError, CACHE_DIR_NAME};

/// Marker byte for an uncompressed payload.
const MARKER_RAW: u8 = 0;
/// Marker byte for a gzip-compressed payload.
const MARKER_GZIP: u8 = 1;

/// Payloads below this size are never compressed.
const COMPRESSION_MIN_BYTES: usize = 256;

/// Persistent cache: file-per-key under the host temp directory plus a
/// concurrent in-memory mirror for the current run.
///
/// The in-memory tier always holds the uncompressed form. On-disk values
/// carry a single leading marker byte distinguishing raw from gzip;
/// compression is applied when the payload is large enough and shrinks by
/// at least one fifth.
pub struct DiskCache {
    dir: PathBuf,
    memory: DashMap<String, Vec<u8>>,
}

impl DiskCache {
    /// Opens (creating if needed) the cache under the host temp directory.
    pub fn open() -> Result<Self, CacheError> {
        Self::open_at(std::env::temp_dir().join(CACHE_DIR_NAME))
    }

    /// Opens a cache rooted at an explicit directory.
    pub fn open_at(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            memory: DashMap::new(),
        })
    }

    /// Root directory of the on-disk tier.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Package names may contain '/' (scopes) and other separators;
        // the on-disk encoding is private, so a lossy sanitisation is fine.
        let file: String = key
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' => '_',
                c => c,
            })
            .collect();
        self.dir.join(file)
    }

    fn encode(data: &[u8]) -> Vec<u8> {
        if data.len() >= COMPRESSION_MIN_BYTES {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            if encoder.write_all(data).is_ok() {
                if let Ok(compressed) = encoder.finish() {
                    // Only worth it when we save at least 20% of space.
                    if compressed.len() < data.len() * 4 / 5 {
                        let mut out = Vec::with_capacity(compressed.len() + 1);
                        out.push(MARKER_GZIP);
                        out.extend_from_slice(&compressed);
                        return out;
                    }
                }
            }
        }
        let mut out = Vec::with_capacity(data.len() + 1);
        out.push(MARKER_RAW);
        out.extend_from_slice(data);
        out
    }

    fn decode(stored: &[u8]) -> Result<Vec<u8>, CacheError> {
        match stored.split_first() {
            Some((&MARKER_RAW, rest)) => Ok(rest.to_vec()),
            Some((&MARKER_GZIP, rest)) => {
                let mut decoder = GzDecoder::new(rest);
                let mut out = Vec::new();
                decoder
                    .read_to_end(&mut out)
                    .map_err(|_| CacheError::Corrupt)?;
                Ok(out)
            }
            _ => Err(CacheError::Corrupt),
        }
    }
}

impl Cache for DiskCache {
    fn has(&self, key: &str) -> bool {
        self.memory.contains_key(key) || self.path_for(key).is_file()
    }

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(value) = self.memory.get(key) {
            return Some(value.clone());
        }

        let stored = fs::read(self.path_for(key)).ok()?;
        match Self::decode(&stored) {
            Ok(data) => {
                self.memory.insert(key.to_string(), data.clone());
                Some(data)
            }
            Err(_) => {
                // Corruption is a miss; drop the entry so the next write
                // replaces it wholesale.
                warn!(key, "discarding corrupt cache entry");
                let _ = fs::remove_file(self.path_for(key));
                None
            }
        }
    }

    fn set(&self, key: &str, data: &[u8]) -> Result<(), CacheError> {
        self.memory.insert(key.to_string(), data.to_vec());
        let encoded = Self::encode(data);
        fs::write(self.path_for(key), encoded)?;
        debug!(key, bytes = data.len(), "cache entry written");
        Ok(())
    }

    fn clean(&self) -> Result<(), CacheError> {
        self.memory.clear();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.path().is_file() {
                let _ = fs::remove_file(entry.path());
            }
        }
        Ok(())
    }
}
