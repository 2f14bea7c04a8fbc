//! Registry access: package document retrieval and credentials.
//!
//! The resolution engine talks to the registry through the
//! [`RegistryClient`] trait so tests can substitute a mock; the production
//! implementation is [`HttpRegistryClient`] on a shared reqwest connection
//! pool.

mod client;
mod npmrc;

pub use client::{HttpRegistryClient, RegistryClient};
pub use npmrc::Npmrc;

use semver::Version;
use thiserror::Error;

use crate::version::Versions;

/// Errors from registry access.
#[derive(Debug, Error, Clone)]
pub enum RegistryError {
    /// Transport-level failure (connect, timeout, TLS, ...).
    #[error("request failed: {0}")]
    Http(String),
    /// The registry answered with a non-success status.
    #[error("registry returned {status} for {package}")]
    Status { status: u16, package: String },
    /// The package document could not be decoded.
    #[error("invalid registry document for {package}: {reason}")]
    Decode { package: String, reason: String },
}

/// A package's version record as served by the registry.
#[derive(Debug, Clone, Default)]
pub struct RegistryDocument {
    /// ETag of the response, when the registry sent one.
    pub etag: Option<String>,
    /// The `dist-tags.latest` pointer, when present and parseable.
    pub latest: Option<Version>,
    /// All published versions carrying a `dist` object.
    pub versions: Versions,
}
