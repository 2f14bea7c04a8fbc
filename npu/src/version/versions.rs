//! Ordered candidate version collections.

use semver::Version;
use serde::{Deserialize, Serialize};

use super::{parse_lenient, VersionError};

/// A single published version of a package, as reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    /// The version string exactly as published.
    pub raw: String,
    /// Parsed form used for ordering and constraint checks.
    pub version: Version,
    /// Unpacked size in bytes (registry metadata, display only).
    pub weight: u64,
    /// True when the registry marks this publication as deprecated.
    pub deprecated: bool,
}

impl VersionEntry {
    /// Builds an entry from a published version string. Returns `None` when
    /// the string is not a valid version (such entries are dropped rather
    /// than failing the whole document).
    pub fn new(raw: impl Into<String>, weight: u64, deprecated: bool) -> Option<Self> {
        let raw = raw.into();
        let version = parse_lenient(&raw)?;
        Some(Self {
            raw,
            version,
            weight,
            deprecated,
        })
    }
}

/// Serialised form of an entry; keeps the cache payload independent from
/// the in-memory representation.
#[derive(Debug, Serialize, Deserialize)]
struct StoredVersion {
    version: String,
    weight: u64,
    deprecated: bool,
}

/// An ordered set of candidate versions for one package.
///
/// Entries are held in descending semver precedence; iteration and
/// serialisation both preserve that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Versions {
    entries: Vec<VersionEntry>,
}

impl Versions {
    /// Builds a collection, sorting the entries in descending precedence.
    pub fn from_entries(mut entries: Vec<VersionEntry>) -> Self {
        entries.sort_by(|a, b| b.version.cmp(&a.version));
        Self { entries }
    }

    /// Candidates in descending precedence order.
    pub fn iter(&self) -> impl Iterator<Item = &VersionEntry> {
        self.entries.iter()
    }

    /// Looks up an entry by its canonical version string.
    pub fn get(&self, raw: &str) -> Option<&VersionEntry> {
        self.entries.iter().find(|e| e.raw == raw)
    }

    /// Finds the entry equal in precedence to `version`, if present.
    pub fn find(&self, version: &Version) -> Option<&VersionEntry> {
        self.entries.iter().find(|e| &e.version == version)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialises the collection for the persistent cache.
    pub fn to_cache_bytes(&self) -> Result<Vec<u8>, VersionError> {
        let stored: Vec<StoredVersion> = self
            .entries
            .iter()
            .map(|e| StoredVersion {
                version: e.raw.clone(),
                weight: e.weight,
                deprecated: e.deprecated,
            })
            .collect();
        Ok(serde_json::to_vec(&stored)?)
    }

    /// Restores a collection from cache bytes.
    ///
    /// Entries whose version string no longer parses are dropped; ordering
    /// is re-established on load.
    pub fn from_cache_bytes(bytes: &[u8]) -> Result<Self, VersionError> {
        let stored: Vec<StoredVersion> = serde_json::from_slice(bytes)?;
        let entries = stored
            .into_iter()
            .filter_map(|s| VersionEntry::new(s.version, s.weight, s.deprecated))
            .collect();
        Ok(Self::from_entries(entries))
    }
}

impl<'a> IntoIterator for &'a Versions {
    type Item = &'a VersionEntry;
    type IntoIter = std::slice::Iter<'a, VersionEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(raw: &str) -> VersionEntry {
        VersionEntry::new(raw, 1024, false).unwrap()
    }

    #[test]
    fn test_from_entries_sorts_descending() {
        let versions =
            Versions::from_entries(vec![entry("1.0.0"), entry("2.1.0"), entry("1.5.3")]);
        let order: Vec<&str> = versions.iter().map(|e| e.raw.as_str()).collect();
        assert_eq!(order, vec!["2.1.0", "1.5.3", "1.0.0"]);
    }

    #[test]
    fn test_prerelease_sorts_below_release() {
        let versions = Versions::from_entries(vec![entry("2.0.0-beta.1"), entry("2.0.0")]);
        let order: Vec<&str> = versions.iter().map(|e| e.raw.as_str()).collect();
        assert_eq!(order, vec!["2.0.0", "2.0.0-beta.1"]);
    }

    #[test]
    fn test_get_and_find() {
        let versions = Versions::from_entries(vec![entry("1.0.0"), entry("1.1.0")]);
        assert!(versions.get("1.1.0").is_some());
        assert!(versions.get("9.9.9").is_none());
        assert!(versions.find(&Version::new(1, 0, 0)).is_some());
    }

    #[test]
    fn test_invalid_entry_is_dropped() {
        assert!(VersionEntry::new("not-a-version", 0, false).is_none());
    }

    #[test]
    fn test_cache_round_trip_preserves_everything() {
        let versions = Versions::from_entries(vec![
            VersionEntry::new("2.0.0", 2048, false).unwrap(),
            VersionEntry::new("1.0.1", 1024, true).unwrap(),
            VersionEntry::new("1.0.0", 512, false).unwrap(),
        ]);

        let bytes = versions.to_cache_bytes().unwrap();
        let restored = Versions::from_cache_bytes(&bytes).unwrap();

        assert_eq!(restored, versions);
        let order: Vec<&str> = restored.iter().map(|e| e.raw.as_str()).collect();
        assert_eq!(order, vec!["2.0.0", "1.0.1", "1.0.0"]);
        assert!(restored.get("1.0.1").unwrap().deprecated);
        assert_eq!(restored.get("2.0.0").unwrap().weight, 2048);
    }

    #[test]
    fn test_empty_round_trip() {
        let versions = Versions::default();
        let bytes = versions.to_cache_bytes().unwrap();
        assert!(Versions::from_cache_bytes(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_bytes_error() {
        assert!(Versions::from_cache_bytes(b"definitely not json").is_err());
    }
}
