//! Manifest handling: loading, workspace walking, and rewriting.
//!
//! The manifest is the standard node `package.json`: scoped dependency
//! maps, a `workspaces` glob list, and an optional `packageManager` field.
//! Key order is preserved end-to-end so a rewrite only ever touches the
//! values it changed.

mod loader;
mod writer;

pub use loader::WorkspacePackage;
pub use writer::{changes_from_deps, update_manifest, ManifestChange};

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::version::RangeOperator;

/// Filename of a node package manifest.
pub const MANIFEST_FILE: &str = "package.json";

/// Errors from manifest handling.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read manifest at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot write manifest at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The parsed `packageManager` field: `[operator]name@version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSpec {
    /// Leading operator captured at load time, restored on write.
    pub operator: Option<RangeOperator>,
    pub name: String,
    pub version: String,
}

impl ManagerSpec {
    /// Parses a `packageManager` value. Returns `None` when the field does
    /// not match the expected shape.
    pub fn parse(value: &str) -> Option<Self> {
        let (operator, rest) = RangeOperator::strip(value);
        let (name, version) = rest.split_once('@')?;
        if name.is_empty()
            || version.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return None;
        }
        Some(Self {
            operator,
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    /// Renders the field value with a replacement version.
    pub fn render(&self, version: &str) -> String {
        match self.operator {
            Some(op) => format!("{}{}@{}", op, self.name, version),
            None => format!("{}@{}", self.name, version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_spec_parse_plain() {
        let spec = ManagerSpec::parse("pnpm@9.1.0").unwrap();
        assert_eq!(spec.operator, None);
        assert_eq!(spec.name, "pnpm");
        assert_eq!(spec.version, "9.1.0");
    }

    #[test]
    fn test_manager_spec_parse_with_operator() {
        let spec = ManagerSpec::parse("^yarn@4.0.2").unwrap();
        assert_eq!(spec.operator, Some(RangeOperator::Caret));
        assert_eq!(spec.render("4.1.0"), "^yarn@4.1.0");
    }

    #[test]
    fn test_manager_spec_rejects_malformed() {
        assert!(ManagerSpec::parse("pnpm").is_none());
        assert!(ManagerSpec::parse("@9.1.0").is_none());
        assert!(ManagerSpec::parse("pn pm@1.0.0").is_none());
        assert!(ManagerSpec::parse("pnpm@").is_none());
    }
}
