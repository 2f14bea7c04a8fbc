//! Version model: lenient semver parsing with range operators.
//!
//! Manifest version strings carry more than a bare semver triple: a range
//! operator (`^`, `~`, `>=`, `>`), an optional `v` prefix, and sometimes
//! missing minor/patch components (`"1"`, `"1.2"`). This module parses
//! those into a [`VersionSpec`] wrapping a [`semver::Version`], which
//! supplies full semver precedence (including prerelease identifier
//! ordering).

mod versions;

pub use versions::{VersionEntry, Versions};

use semver::Version;
use std::fmt;
use thiserror::Error;

/// Errors produced while handling version data.
#[derive(Debug, Error)]
pub enum VersionError {
    /// The string does not decompose as a semver version.
    #[error("invalid version: {0}")]
    Invalid(String),
    /// Candidate set failed to (de)serialise for the cache.
    #[error("version data encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Leading range operator of a version constraint.
///
/// Checked longest-first when parsing so `>=` is not read as `>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOperator {
    /// `^` - same leftmost non-zero component.
    Caret,
    /// `~` - same major.minor.
    Tilde,
    /// `>=` - any version not less than the constraint.
    GreaterEq,
    /// `>` - any version greater than the constraint.
    Greater,
}

impl RangeOperator {
    /// All operators, longest token first.
    const ALL: [(&'static str, RangeOperator); 4] = [
        (">=", RangeOperator::GreaterEq),
        (">", RangeOperator::Greater),
        ("^", RangeOperator::Caret),
        ("~", RangeOperator::Tilde),
    ];

    /// Splits a leading operator off `raw`, returning the operator and the
    /// remainder.
    pub fn strip(raw: &str) -> (Option<RangeOperator>, &str) {
        for (token, op) in Self::ALL {
            if let Some(rest) = raw.strip_prefix(token) {
                return (Some(op), rest);
            }
        }
        (None, raw)
    }

    /// The operator's literal token.
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeOperator::Caret => "^",
            RangeOperator::Tilde => "~",
            RangeOperator::GreaterEq => ">=",
            RangeOperator::Greater => ">",
        }
    }

    /// Whether `candidate` satisfies the constraint this operator implies
    /// around `current`.
    ///
    /// `None` (no operator) is an exact pin and is handled by the caller.
    pub fn allows(&self, current: &Version, candidate: &Version) -> bool {
        match self {
            RangeOperator::Caret => {
                // Same leftmost non-zero component.
                if current.major != 0 {
                    candidate.major == current.major && candidate >= current
                } else if current.minor != 0 {
                    candidate.major == 0
                        && candidate.minor == current.minor
                        && candidate >= current
                } else {
                    candidate.major == 0
                        && candidate.minor == 0
                        && candidate.patch == current.patch
                        && candidate >= current
                }
            }
            RangeOperator::Tilde => {
                candidate.major == current.major
                    && candidate.minor == current.minor
                    && candidate >= current
            }
            RangeOperator::GreaterEq => candidate >= current,
            RangeOperator::Greater => candidate > current,
        }
    }
}

impl fmt::Display for RangeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of the distance between two versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionDiff {
    Major,
    Minor,
    Patch,
    None,
}

/// Classifies the first differing component between `current` and `next`.
///
/// Equal triples with differing prerelease identifiers classify as
/// [`VersionDiff::Patch`].
pub fn diff(current: &Version, next: &Version) -> VersionDiff {
    if current.major != next.major {
        VersionDiff::Major
    } else if current.minor != next.minor {
        VersionDiff::Minor
    } else if current.patch != next.patch || current.pre != next.pre {
        VersionDiff::Patch
    } else {
        VersionDiff::None
    }
}

/// A version constraint as written in a manifest.
///
/// The raw string is kept verbatim; `operator` and `version` are the
/// parsed views. Wildcard specs (`latest`, `*`, the empty string) parse
/// successfully with no inner version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpec {
    raw: String,
    operator: Option<RangeOperator>,
    version: Option<Version>,
}

impl VersionSpec {
    /// Parses a manifest version string.
    ///
    /// Accepts an optional leading range operator, an optional `v` prefix
    /// (dropped), and missing minor/patch components (padded with zeros).
    /// Returns an error for anything else that is not a wildcard.
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let trimmed = raw.trim();
        if is_wildcard(trimmed) {
            return Ok(Self {
                raw: raw.to_string(),
                operator: None,
                version: None,
            });
        }

        let (operator, rest) = RangeOperator::strip(trimmed);
        let rest = rest.strip_prefix('v').unwrap_or(rest);
        let version = parse_lenient(rest).ok_or_else(|| VersionError::Invalid(raw.to_string()))?;

        Ok(Self {
            raw: raw.to_string(),
            operator,
            version: Some(version),
        })
    }

    /// The string exactly as it appeared in the manifest.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The leading range operator, if any.
    pub fn operator(&self) -> Option<RangeOperator> {
        self.operator
    }

    /// The parsed version. `None` for wildcard specs.
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// True for `latest`, `*` and empty specs, which accept the highest
    /// precedence candidate regardless of constraint.
    pub fn is_wildcard(&self) -> bool {
        self.version.is_none()
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_wildcard(s: &str) -> bool {
    s.is_empty() || s == "*" || s == "latest"
}

/// Parses a bare version, tolerating missing minor/patch components.
///
/// `"1"` parses as `1.0.0`, `"1.2"` as `1.2.0`. Prerelease and build
/// metadata are only accepted on a full triple, matching what registries
/// actually publish.
pub fn parse_lenient(s: &str) -> Option<Version> {
    if let Ok(v) = Version::parse(s) {
        return Some(v);
    }

    // Short forms have no prerelease/build to worry about.
    if s.contains('-') || s.contains('+') {
        return None;
    }
    let dots = s.chars().filter(|&c| c == '.').count();
    let padded = match dots {
        0 => format!("{s}.0.0"),
        1 => format!("{s}.0"),
        _ => return None,
    };
    Version::parse(&padded).ok()
}
