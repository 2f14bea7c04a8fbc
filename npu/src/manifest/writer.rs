//! Manifest rewriting.
//!
//! The writer re-reads the original manifest bytes, applies the accepted
//! change set to an order-preserving map, and serialises with two-space
//! indentation. Keys not named by a change keep their exact position.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{ManagerSpec, ManifestError, MANIFEST_FILE};
use crate::dependency::{Dependency, Scope};

/// One key-level edit to a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestChange {
    /// Package key inside the bucket (or the manager name for the
    /// `packageManager` field).
    pub name: String,
    /// Bucket the change applies to.
    pub scope: Scope,
    /// Rendered value to set; `None` removes the key (the unused-deps fix
    /// path).
    pub value: Option<String>,
}

/// Builds the change set for one workspace from its marked dependencies.
///
/// Dependencies without a selected next version are skipped; the
/// `packageManager` field renders as `[operator]name@version` with the
/// operator captured at load time.
pub fn changes_from_deps(deps: &[Dependency]) -> Vec<ManifestChange> {
    deps.iter()
        .filter_map(|dep| {
            let next = dep.next.as_ref()?;
            let value = match dep.scope {
                Scope::PackageManager => ManagerSpec {
                    operator: dep.current.operator(),
                    name: dep.name.clone(),
                    version: String::new(),
                }
                .render(&next.entry.raw),
                _ => next.render(),
            };
            Some(ManifestChange {
                name: dep.name.clone(),
                scope: dep.scope,
                value: Some(value),
            })
        })
        .collect()
}

/// Applies a change set to the manifest in `dir`.
///
/// With `dry_run` the resulting document is printed to stdout and the file
/// is untouched; otherwise it is written atomically (temp file + rename in
/// the same directory). Returns whether the file was written.
pub fn update_manifest(
    dir: &Path,
    changes: &[ManifestChange],
    dry_run: bool,
) -> Result<bool, ManifestError> {
    let path = dir.join(MANIFEST_FILE);
    let original = fs::read(&path).map_err(|source| ManifestError::Read {
        path: path.clone(),
        source,
    })?;
    let mut doc: Map<String, Value> =
        serde_json::from_slice(&original).map_err(|source| ManifestError::Parse {
            path: path.clone(),
            source,
        })?;

    for change in changes {
        apply_change(&mut doc, change);
    }

    let rendered =
        serde_json::to_string_pretty(&Value::Object(doc)).map_err(|source| {
            ManifestError::Parse {
                path: path.clone(),
                source,
            }
        })?;

    if dry_run {
        println!("{rendered}");
        return Ok(false);
    }

    write_atomic(&path, rendered.as_bytes())?;
    info!(manifest = %path.display(), changes = changes.len(), "manifest updated");
    Ok(true)
}

fn apply_change(doc: &mut Map<String, Value>, change: &ManifestChange) {
    match change.scope {
        Scope::PackageManager => {
            if let Some(ref value) = change.value {
                if doc.contains_key("packageManager") {
                    doc.insert("packageManager".to_string(), Value::String(value.clone()));
                }
            }
        }
        scope => {
            let Some(Value::Object(bucket)) = doc.get_mut(scope.manifest_key()) else {
                debug!(bucket = scope.manifest_key(), "bucket absent, change skipped");
                return;
            };
            match change.value {
                // Inserting over an existing key keeps its position.
                Some(ref value) => {
                    bucket.insert(change.name.clone(), Value::String(value.clone()));
                }
                None => {
                    bucket.shift_remove(&change.name);
                }
            }
        }
    }
}

/// Writes bytes atomically: temp file in the target directory, then
/// rename over the destination.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ManifestError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let map_err = |source| ManifestError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(map_err)?;
    temp.write_all(bytes).map_err(map_err)?;
    temp.persist(path)
        .map_err(|e| ManifestError::Write {
            path: path.to_path_buf(),
            source: e.error,
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::SelectedVersion;
    use crate::version::{RangeOperator, VersionEntry, VersionSpec};
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, content: &str) {
        fs::write(dir.join(MANIFEST_FILE), content).unwrap();
    }

    fn read_manifest(dir: &Path) -> String {
        fs::read_to_string(dir.join(MANIFEST_FILE)).unwrap()
    }

    fn set(name: &str, scope: Scope, value: &str) -> ManifestChange {
        ManifestChange {
            name: name.to_string(),
            scope,
            value: Some(value.to_string()),
        }
    }

    fn remove(name: &str, scope: Scope) -> ManifestChange {
        ManifestChange {
            name: name.to_string(),
            scope,
            value: None,
        }
    }

    #[test]
    fn test_update_preserves_key_order() {
        let temp = TempDir::new().unwrap();
        write_manifest(
            temp.path(),
            r#"{
  "name": "demo",
  "version": "1.0.0",
  "dependencies": {
    "zeta": "^1.0.0",
    "alpha": "^2.0.0",
    "mid": "^3.0.0"
  },
  "scripts": {
    "build": "tsc"
  }
}"#,
        );

        update_manifest(
            temp.path(),
            &[set("alpha", Scope::Production, "^2.1.0")],
            false,
        )
        .unwrap();

        let written = read_manifest(temp.path());
        // Top-level and bucket ordering intact, only the value changed.
        let name_pos = written.find("\"name\"").unwrap();
        let deps_pos = written.find("\"dependencies\"").unwrap();
        let scripts_pos = written.find("\"scripts\"").unwrap();
        assert!(name_pos < deps_pos && deps_pos < scripts_pos);

        let zeta_pos = written.find("\"zeta\"").unwrap();
        let alpha_pos = written.find("\"alpha\"").unwrap();
        let mid_pos = written.find("\"mid\"").unwrap();
        assert!(zeta_pos < alpha_pos && alpha_pos < mid_pos);
        assert!(written.contains("\"alpha\": \"^2.1.0\""));
        assert!(written.contains("\"zeta\": \"^1.0.0\""));
    }

    #[test]
    fn test_removal_keeps_sibling_order() {
        let temp = TempDir::new().unwrap();
        write_manifest(
            temp.path(),
            r#"{"dependencies": {"foo": "1.0.0", "bar": "1.0.0", "baz": "1.0.0"}}"#,
        );

        update_manifest(temp.path(), &[remove("bar", Scope::Production)], false).unwrap();

        let written = read_manifest(temp.path());
        assert!(!written.contains("\"bar\""));
        let foo_pos = written.find("\"foo\"").unwrap();
        let baz_pos = written.find("\"baz\"").unwrap();
        assert!(foo_pos < baz_pos);
    }

    #[test]
    fn test_package_manager_field_rewrite() {
        let temp = TempDir::new().unwrap();
        write_manifest(
            temp.path(),
            r#"{"name": "demo", "packageManager": "^pnpm@9.0.0"}"#,
        );

        update_manifest(
            temp.path(),
            &[set("pnpm", Scope::PackageManager, "^pnpm@9.2.0")],
            false,
        )
        .unwrap();

        assert!(read_manifest(temp.path()).contains("\"packageManager\": \"^pnpm@9.2.0\""));
    }

    #[test]
    fn test_dry_run_leaves_file_untouched() {
        let temp = TempDir::new().unwrap();
        let original = r#"{"dependencies": {"foo": "1.0.0"}}"#;
        write_manifest(temp.path(), original);

        let wrote = update_manifest(
            temp.path(),
            &[set("foo", Scope::Production, "2.0.0")],
            true,
        )
        .unwrap();

        assert!(!wrote);
        assert_eq!(read_manifest(temp.path()), original);
    }

    #[test]
    fn test_absent_bucket_is_skipped() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), r#"{"name": "demo"}"#);

        update_manifest(
            temp.path(),
            &[set("foo", Scope::Development, "1.0.0")],
            false,
        )
        .unwrap();

        // No bucket is invented for a change with nowhere to land.
        assert!(!read_manifest(temp.path()).contains("devDependencies"));
    }

    #[test]
    fn test_no_trailing_newline() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), r#"{"dependencies": {"foo": "1.0.0"}}"#);
        update_manifest(temp.path(), &[set("foo", Scope::Production, "1.1.0")], false).unwrap();
        assert!(!read_manifest(temp.path()).ends_with('\n'));
    }

    #[test]
    fn test_idempotent_rewrite() {
        let temp = TempDir::new().unwrap();
        write_manifest(
            temp.path(),
            r#"{"dependencies": {"foo": "^1.0.0", "bar": "~2.0.0"}}"#,
        );
        let changes = [set("foo", Scope::Production, "^1.1.0")];

        update_manifest(temp.path(), &changes, false).unwrap();
        let first = read_manifest(temp.path());

        update_manifest(temp.path(), &changes, false).unwrap();
        assert_eq!(read_manifest(temp.path()), first);
    }

    #[test]
    fn test_changes_from_deps_renders_operators() {
        let mut dep = Dependency::new(
            "react",
            ".",
            Scope::Production,
            VersionSpec::parse("^18.0.0").unwrap(),
        );
        dep.next = Some(SelectedVersion {
            entry: VersionEntry::new("18.3.1", 0, false).unwrap(),
            operator: Some(RangeOperator::Caret),
        });

        let changes = changes_from_deps(&[dep]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].value.as_deref(), Some("^18.3.1"));
    }

    #[test]
    fn test_changes_from_deps_manager_field() {
        let mut dep = Dependency::new(
            "pnpm",
            ".",
            Scope::PackageManager,
            VersionSpec::parse("~9.0.0").unwrap(),
        );
        dep.next = Some(SelectedVersion {
            entry: VersionEntry::new("9.2.0", 0, false).unwrap(),
            operator: None,
        });

        let changes = changes_from_deps(&[dep]);
        assert_eq!(changes[0].value.as_deref(), Some("~pnpm@9.2.0"));
    }

    #[test]
    fn test_changes_from_deps_skips_unresolved() {
        let dep = Dependency::new(
            "react",
            ".",
            Scope::Production,
            VersionSpec::parse("^18.0.0").unwrap(),
        );
        assert!(changes_from_deps(&[dep]).is_empty());
    }
}
