//! npu CLI - command-line interface.
//!
//! The binary wires the library's pieces together:
//! - `Cli` / `Commands`: argument parsing (clap)
//! - `CliError`: centralized error handling with user-friendly messages
//! - `ui`: resolution progress bar and the two-pane update selector
//!
//! The root command checks and updates the project's manifest(s);
//! subcommands cover globally-installed packages, unused-dependency
//! analysis, and the version string.

mod error;
mod ui;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use npu::cache::{Cache, DiskCache, NoopCache};
use npu::checkdeps::{self, CheckReport};
use npu::config::Config;
use npu::dependency::{self, Dependency};
use npu::manifest::{self, WorkspacePackage};
use npu::pm::PackageManager;
use npu::registry::{HttpRegistryClient, Npmrc};
use npu::resolver::{progress_channel, ProgressReceiver, ResolveError, Resolver};

use error::CliError;

// ============================================================================
// CLI Argument Definitions
// ============================================================================

#[derive(Parser)]
#[command(name = "npu")]
#[command(version = npu::VERSION)]
#[command(about = "Check and update node package dependencies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    update: UpdateArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Update globally installed packages
    Global,

    /// Report declared-but-unused dependencies
    Checkdeps {
        /// Remove unused dependencies from the manifest
        #[arg(long)]
        fix: bool,
    },

    /// Print the npu version
    Version,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    /// Root directory containing package.json
    #[arg(value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Root directory for package search
    #[arg(long = "dir", short = 'd', value_name = "PATH")]
    dir_flag: Option<PathBuf>,

    /// Registry base URL
    #[arg(long, short = 'r', default_value = npu::DEFAULT_REGISTRY)]
    registry: String,

    /// Path to registry credentials file (default: .npmrc)
    #[arg(long = "config", short = 'c', value_name = "PATH")]
    config: Option<PathBuf>,

    /// Allow prerelease candidates
    #[arg(long)]
    pre: bool,

    /// Constrain candidates to the current major version
    #[arg(long, short = 'm')]
    minor: bool,

    /// Constrain candidates to the current major and minor version
    #[arg(long, short = 'p')]
    patch: bool,

    /// Enforce the current range operator's constraint
    #[arg(long = "semanticVersion", short = 's')]
    semantic_version: bool,

    /// Keep the range operator on written versions
    #[arg(
        long = "keepRange",
        short = 'k',
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    keep_range: bool,

    /// Skip development and peer dependencies
    #[arg(long, short = 'P')]
    production: bool,

    /// Include peer dependencies
    #[arg(long = "includePeer", short = 'i')]
    include_peer: bool,

    /// Walk workspaces declared by the manifest and package manager
    #[arg(long, short = 'w')]
    workspaces: bool,

    /// Walk up to N directory levels for child manifests
    #[arg(long, value_name = "N")]
    depth: Option<u8>,

    /// Regex narrowing the candidate dependency set
    #[arg(long, value_name = "REGEX")]
    filter: Option<String>,

    /// Package names to include (repeatable)
    #[arg(long = "include", short = 'I', value_name = "NAME")]
    include: Vec<String>,

    /// Package names to exclude (repeatable)
    #[arg(long = "exclude", short = 'e', value_name = "NAME")]
    exclude: Vec<String>,

    /// Accept every found update without the interactive selector
    #[arg(long = "nonInteractive", short = 'x')]
    non_interactive: bool,

    /// Print the intended manifest instead of writing it
    #[arg(long = "dryRun", short = 'D')]
    dry_run: bool,

    /// Skip the install invocation after updating
    #[arg(long = "noInstall", short = 'n')]
    no_install: bool,

    /// Purge the cache before running
    #[arg(long = "cleanCache", short = 'C')]
    clean_cache: bool,

    /// Omit deprecated candidates
    #[arg(long = "skipDeprecated")]
    skip_deprecated: bool,

    /// Per-package timeout in seconds
    #[arg(long, short = 't', default_value_t = 30, value_name = "SECONDS")]
    timeout: u64,

    /// Worker pool size (default: 4x CPU count)
    #[arg(long, value_name = "N")]
    cpus: Option<usize>,

    /// Package manager to use (npm, yarn, pnpm, bun)
    #[arg(long = "packageManager", short = 'M', value_name = "ID")]
    package_manager: Option<String>,

    /// Show per-package failure summaries
    #[arg(long)]
    verbose: bool,

    /// Log level (debug, info, warn, error)
    #[arg(long = "log", default_value = "info", value_name = "LEVEL")]
    log_level: String,
}

impl UpdateArgs {
    fn to_config(&self) -> Result<Config, CliError> {
        if self.workspaces && self.depth.is_some() {
            return Err(CliError::Config(
                "--workspaces and --depth are mutually exclusive".to_string(),
            ));
        }

        let base_dir = self
            .dir
            .clone()
            .or_else(|| self.dir_flag.clone())
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Config {
            base_dir,
            registry: self.registry.clone(),
            config_file: self.config.clone(),
            pre: self.pre,
            minor: self.minor,
            patch: self.patch,
            maintain_semver: self.semantic_version,
            keep_range_operator: self.keep_range,
            skip_deprecated: self.skip_deprecated,
            production: self.production,
            include_peer: self.include_peer,
            workspaces: self.workspaces,
            depth: self.depth,
            filter: self.filter.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            non_interactive: self.non_interactive,
            dry_run: self.dry_run,
            no_install: self.no_install,
            clean_cache: self.clean_cache,
            timeout_secs: self.timeout,
            cpus: self.cpus,
            package_manager: self.package_manager.clone(),
            verbose: self.verbose,
            log_level: self.log_level.clone(),
        })
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Version) => {
            println!("npu {}", npu::VERSION);
            Ok(())
        }
        Some(Commands::Global) => cli.update.to_config().and_then(run_global),
        Some(Commands::Checkdeps { fix }) => {
            cli.update.to_config().and_then(|c| run_checkdeps(c, fix))
        }
        None => cli.update.to_config().and_then(run_update),
    };

    if let Err(e) = result {
        e.exit();
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// The root command: resolve updates for the project manifest(s) and
/// rewrite them.
fn run_update(config: Config) -> Result<(), CliError> {
    let _logging = init_logging(&config)?;
    let cache = open_cache(&config);

    // Package-manager identity needs the manifest's own field, so probe
    // the root manifest first. A missing root manifest is fatal.
    let probe = WorkspacePackage::load_single(&config.base_dir)?;
    let manager_field = probe.manager.as_ref().map(|m| m.name.clone());
    let pm = PackageManager::detect(
        &config.base_dir,
        config.package_manager.as_deref(),
        manager_field.as_deref(),
    );

    let root = WorkspacePackage::load_root(&config, &pm)?;
    let deps = root.collect_dependencies(&config);
    let mut deps = dependency::apply_filters(
        deps,
        config.filter.as_deref(),
        &config.include,
        &config.exclude,
    );
    dependency::sort_for_display(&mut deps);

    if deps.is_empty() {
        println!("No dependencies to check.");
        return Ok(());
    }

    let (deps, cancelled) = resolve_all(&config, cache, deps)?;
    if cancelled {
        println!("Cancelled.");
        return Ok(());
    }

    if config.verbose {
        let failures = deps
            .iter()
            .filter(|d| d.next.is_none() && d.versions.is_empty())
            .count();
        if failures > 0 {
            eprintln!("{failures} package lookups failed; see the log for details.");
        }
    }

    let deps = dependency::with_updates(deps);
    if deps.is_empty() {
        println!("All dependencies are up to date!");
        return Ok(());
    }

    let (deps, committed) = select_updates(&config, deps)?;
    if !committed {
        println!("Cancelled.");
        return Ok(());
    }

    let marked = dependency::marked_for_update(deps);
    if marked.is_empty() {
        println!("No updates selected.");
        return Ok(());
    }

    apply_updates(&config, &pm, marked)?;
    if !config.dry_run {
        println!("All dependencies updated successfully!");
    }
    Ok(())
}

/// `npu global`: update globally-installed packages via the package
/// manager.
fn run_global(config: Config) -> Result<(), CliError> {
    let _logging = init_logging(&config)?;
    let cache = open_cache(&config);

    let pm = PackageManager::detect(
        &config.base_dir,
        config.package_manager.as_deref(),
        None,
    );
    let deps = pm.global_dependencies()?;
    let mut deps = dependency::apply_filters(
        deps,
        config.filter.as_deref(),
        &config.include,
        &config.exclude,
    );
    dependency::sort_for_display(&mut deps);

    if deps.is_empty() {
        println!("No global dependencies found.");
        return Ok(());
    }

    let (deps, cancelled) = resolve_all(&config, cache, deps)?;
    if cancelled {
        println!("Cancelled.");
        return Ok(());
    }

    let deps = dependency::with_updates(deps);
    if deps.is_empty() {
        println!("All global dependencies are up to date!");
        return Ok(());
    }

    let (deps, committed) = select_updates(&config, deps)?;
    if !committed {
        println!("Cancelled.");
        return Ok(());
    }

    for dep in dependency::marked_for_update(deps) {
        let Some(next) = dep.next.as_ref() else { continue };
        if config.dry_run {
            println!("{} {} -> {}", dep.name, dep.current.raw(), next.entry.raw);
            continue;
        }
        if let Err(e) = pm.install_global(&dep.name, &next.entry.raw) {
            warn!(package = %dep.name, error = %e, "global install failed");
            eprintln!("Failed to install {}: {e}", dep.name);
        }
    }
    Ok(())
}

/// `npu checkdeps`: report (and optionally remove) unused dependencies.
fn run_checkdeps(config: Config, fix: bool) -> Result<(), CliError> {
    let _logging = init_logging(&config)?;

    let report = checkdeps::analyze(&config.base_dir)?;
    print_check_report(&report, config.verbose);

    if fix && report.has_unused() {
        let wrote = checkdeps::fix(&config.base_dir, &report, config.dry_run)?;
        if wrote {
            println!("Unused dependencies removed from package.json");
            if !config.no_install {
                let pm = PackageManager::detect(
                    &config.base_dir,
                    config.package_manager.as_deref(),
                    None,
                );
                println!("Run '{} install' to refresh node_modules", pm.name());
            }
        }
    }
    Ok(())
}

// ============================================================================
// Shared Plumbing
// ============================================================================

fn init_logging(config: &Config) -> Result<npu::logging::LoggingGuard, CliError> {
    let stderr = config.verbose || config.non_interactive;
    npu::logging::init_logging(&config.log_level, stderr).map_err(CliError::LoggingInit)
}

/// Opens the persistent cache; any failure degrades to a no-op cache.
fn open_cache(config: &Config) -> Arc<dyn Cache> {
    let cache: Arc<dyn Cache> = match DiskCache::open() {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            warn!(error = %e, "cache unavailable, continuing without");
            Arc::new(NoopCache::new())
        }
    };
    if config.clean_cache {
        if let Err(e) = cache.clean() {
            warn!(error = %e, "cache clean failed");
        }
    }
    cache
}

/// Runs the resolution engine with progress display and Ctrl+C handling.
///
/// Returns the dependency records and whether the run was cancelled.
fn resolve_all(
    config: &Config,
    cache: Arc<dyn Cache>,
    deps: Vec<Dependency>,
) -> Result<(Vec<Dependency>, bool), CliError> {
    let npmrc = Npmrc::load(&config.base_dir, config.config_file.as_deref());
    let client = HttpRegistryClient::new(config.registry.clone(), npmrc, config.package_timeout())
        .map_err(CliError::Registry)?;

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Config(format!("failed to start async runtime: {e}")))?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let resolver = Resolver::new(client, cache, config.clone());
    let total = deps.len();
    let (progress_tx, progress_rx) = progress_channel();

    let engine_cancel = cancel.clone();
    let engine = runtime.spawn(async move {
        let mut deps = deps;
        let result = resolver.resolve(&mut deps, &progress_tx, engine_cancel).await;
        (deps, result)
    });

    watch_progress(config, total, &progress_rx, &cancel);

    let (deps, result) = runtime
        .block_on(engine)
        .map_err(|e| CliError::Config(format!("resolution task failed: {e}")))?;

    let cancelled = matches!(result, Err(ResolveError::Cancelled));
    Ok((deps, cancelled))
}

fn watch_progress(
    config: &Config,
    total: usize,
    rx: &ProgressReceiver,
    cancel: &CancellationToken,
) {
    if interactive(config) {
        match ui::progress::run(total, rx, cancel) {
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "progress display failed, continuing headless");
                ui::progress::run_headless(total, rx, cancel);
            }
        }
    } else {
        ui::progress::run_headless(total, rx, cancel);
    }
}

/// Marks the updates to apply: every found update in non-interactive mode,
/// otherwise whatever the operator selects in the TUI.
fn select_updates(
    config: &Config,
    mut deps: Vec<Dependency>,
) -> Result<(Vec<Dependency>, bool), CliError> {
    if !interactive(config) {
        for dep in &mut deps {
            dep.should_update = true;
        }
        return Ok((deps, true));
    }

    ui::selector::run(deps).map_err(|e| CliError::Config(format!("selector failed: {e}")))
}

fn interactive(config: &Config) -> bool {
    !config.non_interactive && std::io::stdout().is_terminal()
}

/// Rewrites each workspace manifest and triggers installs.
///
/// Per-workspace write failures are logged and skipped; the run fails only
/// when every required write failed.
fn apply_updates(
    config: &Config,
    pm: &PackageManager,
    marked: Vec<Dependency>,
) -> Result<(), CliError> {
    let mut wrote_any = false;
    let mut failed_any = false;

    for (workspace, group) in dependency::group_by_workspace(marked) {
        let changes = manifest::changes_from_deps(&group);
        match manifest::update_manifest(&workspace, &changes, config.dry_run) {
            Ok(wrote) => {
                wrote_any |= wrote;
                if wrote && !config.no_install {
                    if let Err(e) = pm.install(&workspace) {
                        warn!(workspace = %workspace.display(), error = %e, "install failed");
                        eprintln!("Warning: install failed in {}: {e}", workspace.display());
                    }
                }
            }
            Err(e) => {
                failed_any = true;
                warn!(workspace = %workspace.display(), error = %e, "manifest update failed");
                eprintln!("Warning: could not update {}: {e}", workspace.display());
            }
        }
    }

    if failed_any && !wrote_any && !config.dry_run {
        return Err(CliError::Write(
            "no workspace manifest could be written".to_string(),
        ));
    }
    Ok(())
}

fn print_check_report(report: &CheckReport, verbose: bool) {
    println!("Dependency analysis ({} files scanned)", report.files_scanned);

    if report.unused.is_empty() {
        println!("\nNo unused production dependencies found");
    } else {
        println!("\nUnused dependencies ({}):", report.unused.len());
        for name in &report.unused {
            println!("  - {name}");
        }
    }

    if report.unused_dev.is_empty() {
        println!("\nNo unused development dependencies found");
    } else {
        println!("\nUnused development dependencies ({}):", report.unused_dev.len());
        for name in &report.unused_dev {
            println!("  - {name}");
        }
    }

    if verbose && !report.used.is_empty() {
        println!("\nUsed dependencies ({}):", report.used.len());
        for (name, files) in &report.used {
            println!("  - {name} (referenced by {} files)", files.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["npu"]);
        let config = cli.update.to_config().unwrap();
        assert_eq!(config.base_dir, PathBuf::from("."));
        assert_eq!(config.registry, npu::DEFAULT_REGISTRY);
        assert!(config.keep_range_operator);
        assert!(!config.maintain_semver);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_positional_dir_wins_over_flag() {
        let cli = parse(&["npu", "--dir", "flagged", "./positional"]);
        let config = cli.update.to_config().unwrap();
        assert_eq!(config.base_dir, PathBuf::from("./positional"));
    }

    #[test]
    fn test_scope_flags() {
        let cli = parse(&["npu", "--patch", "--pre", "--semanticVersion"]);
        let config = cli.update.to_config().unwrap();
        assert!(config.patch && config.pre && config.maintain_semver);
        assert!(!config.minor);
    }

    #[test]
    fn test_keep_range_can_be_disabled() {
        let cli = parse(&["npu", "--keepRange=false"]);
        assert!(!cli.update.to_config().unwrap().keep_range_operator);

        let cli = parse(&["npu", "--keepRange"]);
        assert!(cli.update.to_config().unwrap().keep_range_operator);
    }

    #[test]
    fn test_repeatable_include_exclude() {
        let cli = parse(&["npu", "-I", "react", "-I", "vue", "-e", "lodash"]);
        let config = cli.update.to_config().unwrap();
        assert_eq!(config.include, vec!["react", "vue"]);
        assert_eq!(config.exclude, vec!["lodash"]);
    }

    #[test]
    fn test_workspaces_and_depth_conflict() {
        let cli = parse(&["npu", "--workspaces", "--depth", "2"]);
        assert!(cli.update.to_config().is_err());
    }

    #[test]
    fn test_checkdeps_subcommand() {
        let cli = parse(&["npu", "checkdeps", "--fix"]);
        assert!(matches!(cli.command, Some(Commands::Checkdeps { fix: true })));
    }

    #[test]
    fn test_global_subcommand() {
        let cli = parse(&["npu", "global"]);
        assert!(matches!(cli.command, Some(Commands::Global)));
    }
}
