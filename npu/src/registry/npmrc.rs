//! Registry credentials from `.npmrc`-shaped config files.
//!
//! The file is line-oriented `key=value` with `#`/`;` comments. Recognised
//! keys are the `<scope>:registry` and `<scope>:_authToken` suffixes plus a
//! bare `registry`; everything else is ignored.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ini::Ini;
use tracing::{debug, warn};

/// Suffix declaring a scoped registry base URL.
const REGISTRY_SUFFIX: &str = ":registry";
/// Suffix declaring a bearer token.
const AUTH_TOKEN_SUFFIX: &str = ":_authToken";

/// Parsed registry credentials.
#[derive(Debug, Clone, Default)]
pub struct Npmrc {
    /// Bare `registry=` override for the default registry.
    pub default_registry: Option<String>,
    scoped_registries: HashMap<String, String>,
    auth_tokens: HashMap<String, String>,
}

impl Npmrc {
    /// Loads credentials for a project.
    ///
    /// Looks at `explicit` when given, otherwise `<base_dir>/.npmrc`,
    /// otherwise `$HOME/.npmrc`. A missing or unparseable file yields an
    /// empty config; credentials are an optional input.
    pub fn load(base_dir: &Path, explicit: Option<&Path>) -> Self {
        let candidates: Vec<PathBuf> = match explicit {
            Some(path) => vec![path.to_path_buf()],
            None => {
                let mut paths = vec![base_dir.join(".npmrc")];
                if let Some(home) = std::env::var_os("HOME") {
                    paths.push(PathBuf::from(home).join(".npmrc"));
                }
                paths
            }
        };

        for path in candidates {
            if !path.is_file() {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    debug!(path = %path.display(), "loaded registry credentials");
                    return Self::parse(&content);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "unreadable credentials file"),
            }
        }

        Self::default()
    }

    /// Parses credentials from file content.
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();

        let ini = match Ini::load_from_str(content) {
            Ok(ini) => ini,
            Err(e) => {
                warn!(error = %e, "failed to parse credentials file");
                return config;
            }
        };

        // .npmrc has no sections; all keys live in the general section.
        if let Some(section) = ini.section(None::<String>) {
            for (key, value) in section.iter() {
                let key = key.trim();
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }

                if key == "registry" {
                    config.default_registry = Some(value.to_string());
                } else if let Some(scope) = key.strip_suffix(REGISTRY_SUFFIX) {
                    config
                        .scoped_registries
                        .insert(scope.to_string(), value.to_string());
                } else if let Some(scope) = key.strip_suffix(AUTH_TOKEN_SUFFIX) {
                    config
                        .auth_tokens
                        .insert(scope.to_string(), value.to_string());
                }
                // Unrecognised keys are ignored.
            }
        }

        config
    }

    /// The scope prefix of a package name (`@acme/widget` → `@acme`).
    fn scope_of(package: &str) -> Option<&str> {
        if package.starts_with('@') {
            package.split('/').next()
        } else {
            None
        }
    }

    /// Returns the scoped registry base for a package, when one is
    /// declared.
    pub fn registry_for(&self, package: &str) -> Option<&str> {
        let scope = Self::scope_of(package)?;
        self.scoped_registries.get(scope).map(String::as_str)
    }

    /// Returns the bearer token for a package's scope, when one is
    /// declared.
    pub fn token_for(&self, package: &str) -> Option<&str> {
        let scope = Self::scope_of(package)?;
        self.auth_tokens.get(scope).map(String::as_str)
    }
}
