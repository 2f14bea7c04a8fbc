//! Package-manager detection and invocation.
//!
//! npu never installs anything itself; after a manifest write it hands off
//! to the project's package manager. Identity is resolved from an explicit
//! hint, the manifest's `packageManager` field, or lockfile presence.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::dependency::{Dependency, Scope};
use crate::version::VersionSpec;

/// Errors from package-manager interaction.
#[derive(Debug, Error)]
pub enum PackageManagerError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Failed { program: String, status: String },
    #[error("cannot decode package manager output: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("global listing is not supported for {0}")]
    UnsupportedGlobal(String),
}

/// Identity of a node package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManagerKind {
    Npm,
    Yarn,
    Pnpm,
    Bun,
}

impl PackageManagerKind {
    /// Detection order; npm last so it wins only as the fallback.
    const ALL: [PackageManagerKind; 4] = [
        PackageManagerKind::Bun,
        PackageManagerKind::Yarn,
        PackageManagerKind::Pnpm,
        PackageManagerKind::Npm,
    ];

    /// Executable name.
    pub fn command(&self) -> &'static str {
        match self {
            PackageManagerKind::Npm => "npm",
            PackageManagerKind::Yarn => "yarn",
            PackageManagerKind::Pnpm => "pnpm",
            PackageManagerKind::Bun => "bun",
        }
    }

    /// Lockfiles that identify this manager.
    pub fn lockfiles(&self) -> &'static [&'static str] {
        match self {
            PackageManagerKind::Npm => &["package-lock.json"],
            PackageManagerKind::Yarn => &["yarn.lock"],
            PackageManagerKind::Pnpm => &["pnpm-lock.yaml"],
            PackageManagerKind::Bun => &["bun.lockb", "bun.lock"],
        }
    }

    fn from_hint(hint: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|pm| hint.contains(pm.command()))
    }
}

/// A resolved package-manager identity.
#[derive(Debug, Clone)]
pub struct PackageManager {
    kind: PackageManagerKind,
}

impl PackageManager {
    pub fn new(kind: PackageManagerKind) -> Self {
        Self { kind }
    }

    /// Resolves the package manager for a project.
    ///
    /// Precedence: explicit hint, the manifest's `packageManager` field,
    /// lockfile presence, then npm.
    pub fn detect(project_dir: &Path, hint: Option<&str>, manifest_field: Option<&str>) -> Self {
        if let Some(kind) = hint.and_then(PackageManagerKind::from_hint) {
            return Self::new(kind);
        }
        if let Some(kind) = manifest_field.and_then(PackageManagerKind::from_hint) {
            return Self::new(kind);
        }
        for kind in PackageManagerKind::ALL {
            let found = kind
                .lockfiles()
                .iter()
                .any(|lock| project_dir.join(lock).is_file());
            if found {
                debug!(manager = kind.command(), "detected from lockfile");
                return Self::new(kind);
            }
        }
        Self::new(PackageManagerKind::Npm)
    }

    pub fn kind(&self) -> PackageManagerKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.command()
    }

    /// Runs `<pm> install` in `dir`, inheriting stdio.
    pub fn install(&self, dir: &Path) -> Result<(), PackageManagerError> {
        self.run(dir, &["install"])
    }

    /// Installs a package globally at an exact version.
    pub fn install_global(&self, name: &str, version: &str) -> Result<(), PackageManagerError> {
        let spec = format!("{name}@{version}");
        let args: Vec<&str> = match self.kind {
            PackageManagerKind::Yarn => vec!["global", "add", &spec],
            PackageManagerKind::Bun => vec!["add", "--global", &spec],
            _ => vec!["install", "-g", &spec],
        };
        self.run(Path::new("."), &args)
    }

    fn run(&self, dir: &Path, args: &[&str]) -> Result<(), PackageManagerError> {
        let program = self.kind.command();
        debug!(program, ?args, dir = %dir.display(), "running package manager");

        let status = Command::new(program)
            .args(args)
            .current_dir(dir)
            .status()
            .map_err(|source| PackageManagerError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !status.success() {
            return Err(PackageManagerError::Failed {
                program: program.to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }

    /// Lists globally-installed packages as dependency records (workspace
    /// `global`).
    ///
    /// Uses the `ls -g --json` family; yarn classic has no compatible
    /// output and is reported as unsupported.
    pub fn global_dependencies(&self) -> Result<Vec<Dependency>, PackageManagerError> {
        let program = self.kind.command();
        let args: &[&str] = match self.kind {
            PackageManagerKind::Npm => &["ls", "-g", "--depth=0", "--json"],
            PackageManagerKind::Pnpm => &["ls", "-g", "--json"],
            PackageManagerKind::Bun => &["pm", "ls", "-g", "--json"],
            PackageManagerKind::Yarn => {
                return Err(PackageManagerError::UnsupportedGlobal("yarn".to_string()))
            }
        };

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| PackageManagerError::Spawn {
                program: program.to_string(),
                source,
            })?;

        decode_global_listing(&output.stdout)
    }

    /// The workspace glob sources for this manager: `pnpm-workspace.yaml`
    /// packages for pnpm (when present), otherwise the manifest globs.
    pub fn workspace_globs(&self, dir: &Path, manifest_globs: &[String]) -> Vec<String> {
        if self.kind == PackageManagerKind::Pnpm {
            if let Some(globs) = read_pnpm_workspace(&dir.join("pnpm-workspace.yaml")) {
                return globs;
            }
        }
        manifest_globs.to_vec()
    }
}

#[derive(Debug, Deserialize)]
struct PnpmWorkspaceFile {
    #[serde(default)]
    packages: Vec<String>,
}

fn read_pnpm_workspace(path: &Path) -> Option<Vec<String>> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_yaml::from_str::<PnpmWorkspaceFile>(&content) {
        Ok(file) if !file.packages.is_empty() => Some(file.packages),
        Ok(_) => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable pnpm workspace file");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct GlobalListing {
    #[serde(default)]
    dependencies: serde_json::Map<String, serde_json::Value>,
}

/// Decodes `ls -g --json` output into dependency records.
///
/// Accepts both the npm object shape and the pnpm array-of-projects shape.
fn decode_global_listing(stdout: &[u8]) -> Result<Vec<Dependency>, PackageManagerError> {
    let value: serde_json::Value = serde_json::from_slice(stdout)?;
    let listing: GlobalListing = match value {
        serde_json::Value::Array(mut projects) if !projects.is_empty() => {
            serde_json::from_value(projects.remove(0))?
        }
        other => serde_json::from_value(other)?,
    };

    let mut deps = Vec::new();
    for (name, entry) in listing.dependencies {
        let Some(version) = entry.get("version").and_then(|v| v.as_str()) else {
            continue;
        };
        match VersionSpec::parse(version) {
            Ok(current) => deps.push(Dependency::new(name, "global", Scope::Production, current)),
            Err(_) => debug!(package = %name, version, "skipping unparseable global version"),
        }
    }
    Ok(deps)
}
