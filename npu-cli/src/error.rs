//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes. Operator cancellation is not an error and
//! never reaches this type.

use std::fmt;
use std::process;

use npu::checkdeps::CheckDepsError;
use npu::manifest::ManifestError;
use npu::pm::PackageManagerError;
use npu::registry::RegistryError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Invalid flag combination or unusable configuration
    Config(String),
    /// Root manifest missing or malformed
    Manifest(ManifestError),
    /// Could not construct the registry client
    Registry(RegistryError),
    /// Every workspace write failed
    Write(String),
    /// Unused-dependency analysis failed
    CheckDeps(CheckDepsError),
    /// Package-manager interaction failed
    PackageManager(PackageManagerError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {self}");

        match self {
            CliError::Manifest(_) => {
                eprintln!();
                eprintln!("Run npu from a directory containing package.json, or pass --dir.");
            }
            CliError::PackageManager(PackageManagerError::Spawn { program, .. }) => {
                eprintln!();
                eprintln!("Make sure '{program}' is installed and on your PATH.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {e}"),
            CliError::Config(msg) => write!(f, "Configuration error: {msg}"),
            CliError::Manifest(e) => write!(f, "Manifest error: {e}"),
            CliError::Registry(e) => write!(f, "Registry error: {e}"),
            CliError::Write(msg) => write!(f, "Failed to update manifests: {msg}"),
            CliError::CheckDeps(e) => write!(f, "Dependency analysis failed: {e}"),
            CliError::PackageManager(e) => write!(f, "Package manager error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Manifest(e) => Some(e),
            CliError::Registry(e) => Some(e),
            CliError::CheckDeps(e) => Some(e),
            CliError::PackageManager(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ManifestError> for CliError {
    fn from(e: ManifestError) -> Self {
        CliError::Manifest(e)
    }
}

impl From<CheckDepsError> for CliError {
    fn from(e: CheckDepsError) -> Self {
        CliError::CheckDeps(e)
    }
}

impl From<PackageManagerError> for CliError {
    fn from(e: PackageManagerError) -> Self {
        CliError::PackageManager(e)
    }
}
