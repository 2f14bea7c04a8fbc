//! npu - Node package updater
//!
//! This library provides the core functionality for checking a node
//! project's declared dependencies against a remote package registry,
//! selecting newer versions under semver rules, and rewriting the
//! manifest(s) accordingly.
//!
//! # High-Level Flow
//!
//! ```ignore
//! use npu::config::Config;
//! use npu::manifest::WorkspacePackage;
//! use npu::registry::HttpRegistryClient;
//! use npu::resolver::Resolver;
//!
//! let config = Config::default();
//! let root = WorkspacePackage::load(&config)?;
//! let mut deps = root.collect_dependencies(&config);
//!
//! let resolver = Resolver::new(client, cache, config);
//! resolver.resolve(&mut deps, &progress, cancel).await?;
//! // ... operator selection, then manifest::update_manifest() per workspace
//! ```

pub mod cache;
pub mod checkdeps;
pub mod config;
pub mod dependency;
pub mod logging;
pub mod manifest;
pub mod pm;
pub mod registry;
pub mod resolver;
pub mod version;

/// Version of the npu library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default registry used when neither a flag nor `.npmrc` provides one.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";
