//! Manifest loading and workspace discovery.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{ManagerSpec, ManifestError, MANIFEST_FILE};
use crate::config::Config;
use crate::dependency::{Dependency, Scope};
use crate::pm::PackageManager;
use crate::version::VersionSpec;

/// A loaded workspace manifest: its directory, its parsed document, and
/// any child workspaces discovered below it.
///
/// Children are strict path extensions of their parent, so the workspace
/// tree is a forest and recursion cannot cycle.
#[derive(Debug)]
pub struct WorkspacePackage {
    /// Directory containing the manifest.
    pub dir: PathBuf,
    /// Order-preserving parsed document.
    doc: Map<String, Value>,
    /// Parsed `packageManager` field, when present and well-formed.
    pub manager: Option<ManagerSpec>,
    /// The manifest's `workspaces` glob list.
    pub workspace_globs: Vec<String>,
    /// Child workspaces, populated by [`WorkspacePackage::load_root`].
    pub children: Vec<WorkspacePackage>,
}

impl WorkspacePackage {
    /// Loads the root manifest and, per the configuration, its child
    /// workspaces.
    ///
    /// A missing or malformed root manifest is fatal; children that fail
    /// to load are logged and skipped.
    pub fn load_root(config: &Config, pm: &PackageManager) -> Result<Self, ManifestError> {
        let mut root = Self::load_single(&config.base_dir)?;

        if config.workspaces {
            root.load_workspace_children(pm);
        } else if let Some(depth) = config.depth {
            root.load_children_by_depth(depth);
        }

        Ok(root)
    }

    /// Loads one manifest without walking children.
    pub fn load_single(dir: &Path) -> Result<Self, ManifestError> {
        let path = dir.join(MANIFEST_FILE);
        let bytes = fs::read(&path).map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;
        let doc: Map<String, Value> =
            serde_json::from_slice(&bytes).map_err(|source| ManifestError::Parse {
                path: path.clone(),
                source,
            })?;

        let manager = doc
            .get("packageManager")
            .and_then(Value::as_str)
            .and_then(ManagerSpec::parse);

        let workspace_globs = doc
            .get("workspaces")
            .and_then(Value::as_array)
            .map(|globs| {
                globs
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            dir: dir.to_path_buf(),
            doc,
            manager,
            workspace_globs,
            children: Vec::new(),
        })
    }

    /// Discovers children through workspace globs (manifest `workspaces`
    /// plus any package-manager workspace file), recursively.
    fn load_workspace_children(&mut self, pm: &PackageManager) {
        let globs = pm.workspace_globs(&self.dir, &self.workspace_globs);

        for pattern in globs {
            let full_pattern = self.dir.join(&pattern);
            let matches = match glob::glob(&full_pattern.to_string_lossy()) {
                Ok(paths) => paths,
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "invalid workspace glob");
                    continue;
                }
            };

            for entry in matches.flatten() {
                if !entry.is_dir() || !entry.join(MANIFEST_FILE).is_file() {
                    continue;
                }
                if self.owns(&entry) {
                    continue;
                }
                match Self::load_single(&entry) {
                    Ok(mut child) => {
                        debug!(workspace = %entry.display(), "loaded child workspace");
                        child.load_workspace_children(pm);
                        self.children.push(child);
                    }
                    Err(e) => warn!(workspace = %entry.display(), error = %e, "skipping workspace"),
                }
            }
        }
    }

    /// Discovers children by walking up to `depth` directory levels,
    /// honouring gitignore rules.
    fn load_children_by_depth(&mut self, depth: u8) {
        let walker = ignore::WalkBuilder::new(&self.dir)
            .max_depth(Some(depth as usize))
            .hidden(true)
            .build();

        for entry in walker.flatten() {
            let path = entry.path();
            if !path.is_dir() || path == self.dir {
                continue;
            }
            if !path.join(MANIFEST_FILE).is_file() || self.owns(path) {
                continue;
            }
            match Self::load_single(path) {
                Ok(child) => self.children.push(child),
                Err(e) => warn!(workspace = %path.display(), error = %e, "skipping workspace"),
            }
        }
    }

    /// True when `dir` is already this workspace or one of its children.
    fn owns(&self, dir: &Path) -> bool {
        self.dir == dir || self.children.iter().any(|c| c.owns(dir))
    }

    /// This workspace and all descendants, root first.
    pub fn all_workspaces(&self) -> Vec<&WorkspacePackage> {
        let mut all = vec![self];
        for child in &self.children {
            all.extend(child.all_workspaces());
        }
        all
    }

    /// Extracts the dependency records for the whole workspace tree,
    /// honouring the scope flags.
    ///
    /// Entries whose version string is not a semver constraint (git URLs,
    /// `file:` references, `workspace:` links) are skipped.
    pub fn collect_dependencies(&self, config: &Config) -> Vec<Dependency> {
        let mut deps = Vec::new();
        for workspace in self.all_workspaces() {
            workspace.collect_own_dependencies(config, &mut deps);
        }
        deps
    }

    fn collect_own_dependencies(&self, config: &Config, out: &mut Vec<Dependency>) {
        if let Some(ref manager) = self.manager {
            let raw = match manager.operator {
                Some(op) => format!("{}{}", op, manager.version),
                None => manager.version.clone(),
            };
            if let Ok(current) = VersionSpec::parse(&raw) {
                out.push(Dependency::new(
                    manager.name.clone(),
                    self.dir.clone(),
                    Scope::PackageManager,
                    current,
                ));
            }
        }

        self.collect_bucket(Scope::Production, out);
        self.collect_bucket(Scope::Optional, out);
        if !config.production {
            self.collect_bucket(Scope::Development, out);
            if config.include_peer {
                self.collect_bucket(Scope::Peer, out);
            }
        }
    }

    fn collect_bucket(&self, scope: Scope, out: &mut Vec<Dependency>) {
        let Some(Value::Object(bucket)) = self.doc.get(scope.manifest_key()) else {
            return;
        };
        for (name, value) in bucket {
            let Some(raw) = value.as_str() else { continue };
            match VersionSpec::parse(raw) {
                Ok(current) => out.push(Dependency::new(
                    name.clone(),
                    self.dir.clone(),
                    scope,
                    current,
                )),
                Err(_) => {
                    debug!(package = %name, version = %raw, "skipping non-semver constraint")
                }
            }
        }
    }
}
