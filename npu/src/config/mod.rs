//! Run configuration.
//!
//! One flat record mapping one-to-one onto the CLI surface. The CLI crate
//! fills it from parsed arguments; library code only ever reads it.

use std::path::PathBuf;
use std::time::Duration;

/// Hard ceiling on the per-package deadline, regardless of `--timeout`.
pub const MAX_PACKAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Multiplier applied to the CPU count for the default worker pool size.
/// Registry lookups are I/O bound, so the pool runs well past core count.
pub const WORKER_CPU_MULTIPLIER: usize = 4;

/// Fallback CPU count when detection fails.
pub const FALLBACK_CPU_COUNT: usize = 4;

/// Configuration record consumed by the resolution engine and the
/// manifest pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of the project.
    pub base_dir: PathBuf,
    /// Default registry base URL.
    pub registry: String,
    /// Path to the registry credentials file; `None` means `.npmrc`
    /// discovery (project dir, then home).
    pub config_file: Option<PathBuf>,

    /// Allow prerelease candidates.
    pub pre: bool,
    /// Constrain candidates to the current major.
    pub minor: bool,
    /// Constrain candidates to the current major.minor.
    pub patch: bool,
    /// Enforce the constraint implied by the current range operator.
    pub maintain_semver: bool,
    /// Carry the current range operator onto the written version.
    pub keep_range_operator: bool,
    /// Omit deprecated candidates.
    pub skip_deprecated: bool,

    /// Skip development and peer buckets.
    pub production: bool,
    /// Include the peer bucket.
    pub include_peer: bool,

    /// Walk workspaces declared by the manifest / package manager.
    pub workspaces: bool,
    /// Walk up to this many directory levels for child manifests instead
    /// of workspace globs.
    pub depth: Option<u8>,

    /// Regex narrowing the dependency set by package name.
    pub filter: Option<String>,
    /// Explicit package names to include.
    pub include: Vec<String>,
    /// Explicit package names to exclude.
    pub exclude: Vec<String>,

    /// Accept every found update without the TUI.
    pub non_interactive: bool,
    /// Print the intended manifest instead of writing it.
    pub dry_run: bool,
    /// Skip the post-write install invocation.
    pub no_install: bool,
    /// Purge the cache before running.
    pub clean_cache: bool,

    /// Per-package deadline in seconds.
    pub timeout_secs: u64,
    /// Worker pool size; `None` derives from CPU count.
    pub cpus: Option<usize>,
    /// Forced package-manager identity.
    pub package_manager: Option<String>,

    /// Print per-package failure summaries and progress detail.
    pub verbose: bool,
    /// Log level for the tracing filter.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            registry: crate::DEFAULT_REGISTRY.to_string(),
            config_file: None,
            pre: false,
            minor: false,
            patch: false,
            maintain_semver: false,
            keep_range_operator: true,
            skip_deprecated: false,
            production: false,
            include_peer: false,
            workspaces: false,
            depth: None,
            filter: None,
            include: Vec::new(),
            exclude: Vec::new(),
            non_interactive: false,
            dry_run: false,
            no_install: false,
            clean_cache: false,
            timeout_secs: 30,
            cpus: None,
            package_manager: None,
            verbose: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Effective per-package deadline, capped at [`MAX_PACKAGE_TIMEOUT`].
    pub fn package_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs).min(MAX_PACKAGE_TIMEOUT)
    }

    /// Effective worker pool size for `dep_count` pending lookups.
    ///
    /// Defaults to `4 x` the CPU count, clamped to the number of
    /// dependencies and never below one.
    pub fn worker_count(&self, dep_count: usize) -> usize {
        let base = self.cpus.filter(|&n| n > 0).unwrap_or_else(|| {
            let cpus = std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(FALLBACK_CPU_COUNT);
            cpus * WORKER_CPU_MULTIPLIER
        });
        base.min(dep_count).max(1)
    }
}
