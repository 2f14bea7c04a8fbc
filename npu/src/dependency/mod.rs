//! Dependency records: the unit of work for the resolution engine.

use std::path::PathBuf;

use regex::Regex;
use semver::Version;

use crate::version::{RangeOperator, VersionEntry, VersionSpec, Versions};

/// The manifest bucket a dependency was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Production,
    Development,
    Peer,
    Optional,
    /// The top-level `packageManager` field.
    PackageManager,
}

impl Scope {
    /// The manifest key of this bucket.
    pub fn manifest_key(&self) -> &'static str {
        match self {
            Scope::Production => "dependencies",
            Scope::Development => "devDependencies",
            Scope::Peer => "peerDependencies",
            Scope::Optional => "optionalDependencies",
            Scope::PackageManager => "packageManager",
        }
    }

    /// Short label used in the TUI.
    pub fn label(&self) -> &'static str {
        match self {
            Scope::Production => "prod",
            Scope::Development => "dev",
            Scope::Peer => "peer",
            Scope::Optional => "optional",
            Scope::PackageManager => "packageManager",
        }
    }

    /// Display rank: production first, development second, the rest after.
    pub fn sort_rank(&self) -> u8 {
        match self {
            Scope::Production => 0,
            Scope::Development => 1,
            _ => 2,
        }
    }
}

/// The version chosen for a dependency by the selector (or the operator
/// through the version picker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedVersion {
    /// The chosen candidate.
    pub entry: VersionEntry,
    /// Operator to prefix on write, if any.
    pub operator: Option<RangeOperator>,
}

impl SelectedVersion {
    /// Renders the value written into the manifest bucket.
    pub fn render(&self) -> String {
        match self.operator {
            Some(op) => format!("{}{}", op, self.entry.raw),
            None => self.entry.raw.clone(),
        }
    }
}

/// A declared dependency of one workspace manifest.
#[derive(Debug, Clone)]
pub struct Dependency {
    /// Package name as declared.
    pub name: String,
    /// Directory of the owning workspace manifest.
    pub workspace: PathBuf,
    /// Bucket the dependency was declared in.
    pub scope: Scope,
    /// The declared version constraint; the raw string is never mutated
    /// during resolution.
    pub current: VersionSpec,
    /// Candidate set, populated by the engine.
    pub versions: Versions,
    /// The registry's `latest` dist-tag, when known.
    pub latest: Option<Version>,
    /// Selected next version; empty until resolution completes and a
    /// candidate survives the selector.
    pub next: Option<SelectedVersion>,
    /// Marked for update by the selector UI or non-interactive mode.
    pub should_update: bool,
}

impl Dependency {
    pub fn new(
        name: impl Into<String>,
        workspace: impl Into<PathBuf>,
        scope: Scope,
        current: VersionSpec,
    ) -> Self {
        Self {
            name: name.into(),
            workspace: workspace.into(),
            scope,
            current,
            versions: Versions::default(),
            latest: None,
            next: None,
            should_update: false,
        }
    }

    /// Weight of the currently installed version, when the registry still
    /// lists it. Used for the picker's delta annotation.
    pub fn current_weight(&self) -> Option<u64> {
        let current = self.current.version()?;
        self.versions.find(current).map(|e| e.weight)
    }
}

/// Sorts for display stability: scope rank, then package name, then
/// workspace path.
pub fn sort_for_display(deps: &mut [Dependency]) {
    deps.sort_by(|a, b| {
        a.scope
            .sort_rank()
            .cmp(&b.scope.sort_rank())
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.workspace.cmp(&b.workspace))
    });
}

/// Applies the `--filter` regex and the `--include`/`--exclude` name lists.
///
/// An unparseable filter leaves the set untouched, matching the permissive
/// behaviour operators expect from a narrowing flag.
pub fn apply_filters(
    deps: Vec<Dependency>,
    filter: Option<&str>,
    include: &[String],
    exclude: &[String],
) -> Vec<Dependency> {
    let regex = filter.and_then(|f| Regex::new(f).ok());

    deps.into_iter()
        .filter(|dep| {
            if let Some(ref re) = regex {
                if !re.is_match(&dep.name) {
                    return false;
                }
            }
            if !include.is_empty() && !include.iter().any(|n| n == &dep.name) {
                return false;
            }
            if exclude.iter().any(|n| n == &dep.name) {
                return false;
            }
            true
        })
        .collect()
}

/// Keeps only dependencies with a resolved next version.
pub fn with_updates(deps: Vec<Dependency>) -> Vec<Dependency> {
    deps.into_iter().filter(|d| d.next.is_some()).collect()
}

/// Keeps only dependencies the operator marked for update.
pub fn marked_for_update(deps: Vec<Dependency>) -> Vec<Dependency> {
    deps.into_iter().filter(|d| d.should_update).collect()
}

/// Groups dependencies by owning workspace for the manifest rewrite.
pub fn group_by_workspace(deps: Vec<Dependency>) -> Vec<(PathBuf, Vec<Dependency>)> {
    let mut groups: Vec<(PathBuf, Vec<Dependency>)> = Vec::new();
    for dep in deps {
        match groups.iter_mut().find(|(ws, _)| ws == &dep.workspace) {
            Some((_, bucket)) => bucket.push(dep),
            None => groups.push((dep.workspace.clone(), vec![dep])),
        }
    }
    groups
}
