//! Unused-dependency analysis.
//!
//! A read-only pass over the project's source files: enumerate them with a
//! gitignore-aware walk, extract imported package names, and diff the
//! result against the manifest's declared dependencies. Optional and peer
//! dependencies are never reported unused in the production bucket.

mod imports;

pub use imports::{normalize_specifier, ImportScanner};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::dependency::Scope;
use crate::manifest::{update_manifest, ManifestChange, ManifestError, WorkspacePackage};

/// File extensions the analyser inspects.
const SOURCE_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "vue", "svelte", "mjs", "cjs", "json",
];

/// Errors from the analyser.
#[derive(Debug, Error)]
pub enum CheckDepsError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("cannot walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },
}

/// Result of an unused-dependency analysis.
#[derive(Debug, Default)]
pub struct CheckReport {
    /// Unused production dependencies.
    pub unused: Vec<String>,
    /// Unused development dependencies.
    pub unused_dev: Vec<String>,
    /// Used package → files referencing it.
    pub used: BTreeMap<String, Vec<PathBuf>>,
    /// Number of files inspected.
    pub files_scanned: usize,
}

impl CheckReport {
    pub fn has_unused(&self) -> bool {
        !self.unused.is_empty() || !self.unused_dev.is_empty()
    }
}

/// Analyses a workspace directory against its manifest.
pub fn analyze(dir: &Path) -> Result<CheckReport, CheckDepsError> {
    let package = WorkspacePackage::load_single(dir)?;
    let scanner = ImportScanner::new();

    let mut report = CheckReport::default();

    let walker = ignore::WalkBuilder::new(dir)
        .hidden(true)
        .require_git(false)
        .filter_entry(|entry| entry.file_name() != "node_modules")
        .build();
    for entry in walker {
        let entry = entry.map_err(|source| CheckDepsError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() || !has_source_extension(path) {
            continue;
        }

        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };
        report.files_scanned += 1;

        let specifiers = if path.extension().is_some_and(|e| e == "json") {
            scanner.scan_json(&content)
        } else {
            scanner.scan_source(&content)
        };

        for specifier in specifiers {
            if let Some(package_name) = normalize_specifier(&specifier) {
                let rel = path.strip_prefix(dir).unwrap_or(path).to_path_buf();
                let files = report.used.entry(package_name).or_default();
                if !files.contains(&rel) {
                    files.push(rel);
                }
            }
        }
    }

    let declared = declared_names(&package);
    let exempt: BTreeSet<&String> = declared
        .iter()
        .filter(|(_, scope)| matches!(scope, Scope::Peer | Scope::Optional))
        .map(|(name, _)| name)
        .collect();

    for (name, scope) in &declared {
        if report.used.contains_key(name) {
            continue;
        }
        match scope {
            Scope::Production if !exempt.contains(name) => report.unused.push(name.clone()),
            Scope::Development => report.unused_dev.push(name.clone()),
            _ => {}
        }
    }
    report.unused.sort();
    report.unused_dev.sort();

    debug!(
        files = report.files_scanned,
        used = report.used.len(),
        unused = report.unused.len(),
        unused_dev = report.unused_dev.len(),
        "analysis complete"
    );
    Ok(report)
}

/// Removes the report's unused dependencies from the manifest.
///
/// Uses the rewriter's key-removal path, so untouched keys keep their
/// position. Returns whether the manifest was written.
pub fn fix(dir: &Path, report: &CheckReport, dry_run: bool) -> Result<bool, CheckDepsError> {
    if !report.has_unused() {
        return Ok(false);
    }

    let mut changes = Vec::new();
    for name in &report.unused {
        changes.push(ManifestChange {
            name: name.clone(),
            scope: Scope::Production,
            value: None,
        });
    }
    for name in &report.unused_dev {
        changes.push(ManifestChange {
            name: name.clone(),
            scope: Scope::Development,
            value: None,
        });
    }

    let wrote = update_manifest(dir, &changes, dry_run)?;
    if wrote {
        info!(removed = changes.len(), "unused dependencies removed");
    }
    Ok(wrote)
}

/// Declared (name, scope) pairs. Production names shadowed by a peer or
/// optional declaration keep both entries so the exemption can apply.
fn declared_names(package: &WorkspacePackage) -> Vec<(String, Scope)> {
    let config = crate::config::Config {
        include_peer: true,
        ..Default::default()
    };
    package
        .collect_dependencies(&config)
        .into_iter()
        .filter(|d| d.scope != Scope::PackageManager)
        .map(|d| (d.name, d.scope))
        .collect()
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup(manifest: &str, files: &[(&str, &str)]) -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("package.json"), manifest).unwrap();
        for (name, content) in files {
            let path = temp.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        temp
    }

    #[test]
    fn test_unused_production_dependency_flagged() {
        let temp = setup(
            r#"{"dependencies": {"foo": "1.0.0", "bar": "1.0.0"}}"#,
            &[("index.js", "import foo from 'foo';\n")],
        );
        let report = analyze(temp.path()).unwrap();
        assert_eq!(report.unused, vec!["bar"]);
        assert!(report.used.contains_key("foo"));
    }

    #[test]
    fn test_require_and_dynamic_import_count_as_usage() {
        let temp = setup(
            r#"{"dependencies": {"a": "1.0.0", "b": "1.0.0", "c": "1.0.0"}}"#,
            &[
                ("cjs.cjs", "const a = require('a');\n"),
                ("dyn.js", "const b = await import('b');\n"),
            ],
        );
        let report = analyze(temp.path()).unwrap();
        assert_eq!(report.unused, vec!["c"]);
    }

    #[test]
    fn test_subpath_import_counts_for_package() {
        let temp = setup(
            r#"{"dependencies": {"lodash": "4.17.0", "@acme/ui": "1.0.0"}}"#,
            &[(
                "app.ts",
                "import get from 'lodash/get';\nimport { Button } from '@acme/ui/button';\n",
            )],
        );
        let report = analyze(temp.path()).unwrap();
        assert!(report.unused.is_empty());
    }

    #[test]
    fn test_peer_and_optional_never_unused() {
        let temp = setup(
            r#"{
                "dependencies": {"used": "1.0.0"},
                "peerDependencies": {"react": "18.0.0"},
                "optionalDependencies": {"fsevents": "2.0.0"}
            }"#,
            &[("index.js", "import used from 'used';\n")],
        );
        let report = analyze(temp.path()).unwrap();
        assert!(report.unused.is_empty());
    }

    #[test]
    fn test_unused_dev_dependency_flagged() {
        let temp = setup(
            r#"{"devDependencies": {"vitest": "1.0.0", "eslint": "8.0.0"}}"#,
            &[("test.ts", "import { test } from 'vitest';\n")],
        );
        let report = analyze(temp.path()).unwrap();
        assert_eq!(report.unused_dev, vec!["eslint"]);
    }

    #[test]
    fn test_gitignored_files_not_scanned() {
        let temp = setup(
            r#"{"dependencies": {"secret": "1.0.0"}}"#,
            &[
                (".gitignore", "generated/\n"),
                ("generated/uses.js", "import s from 'secret';\n"),
            ],
        );
        let report = analyze(temp.path()).unwrap();
        // The only usage is in an ignored directory.
        assert_eq!(report.unused, vec!["secret"]);
    }

    #[test]
    fn test_json_config_reference_counts_as_usage() {
        let temp = setup(
            r#"{"devDependencies": {"eslint-config-acme": "1.0.0"}}"#,
            &[(
                "config.json",
                r#"{"extends": "eslint-config-acme"}"#,
            )],
        );
        let report = analyze(temp.path()).unwrap();
        assert!(report.unused_dev.is_empty());
    }

    #[test]
    fn test_fix_removes_unused_keys_in_order() {
        let temp = setup(
            r#"{
  "name": "demo",
  "dependencies": {
    "foo": "1.0.0",
    "bar": "1.0.0"
  }
}"#,
            &[("index.js", "import foo from 'foo';\n")],
        );
        let report = analyze(temp.path()).unwrap();
        let wrote = fix(temp.path(), &report, false).unwrap();
        assert!(wrote);

        let written = fs::read_to_string(temp.path().join("package.json")).unwrap();
        assert!(written.contains("\"foo\": \"1.0.0\""));
        assert!(!written.contains("\"bar\""));
        // Key order otherwise intact.
        assert!(written.find("\"name\"").unwrap() < written.find("\"dependencies\"").unwrap());
    }

    #[test]
    fn test_fix_with_nothing_unused_is_noop() {
        let temp = setup(
            r#"{"dependencies": {"foo": "1.0.0"}}"#,
            &[("index.js", "import foo from 'foo';\n")],
        );
        let report = analyze(temp.path()).unwrap();
        assert!(!fix(temp.path(), &report, false).unwrap());
    }
}
