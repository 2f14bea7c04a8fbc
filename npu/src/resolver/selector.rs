//! Version selection: picks the next version for a dependency.

use crate::config::Config;
use crate::dependency::SelectedVersion;
use crate::version::{RangeOperator, VersionEntry, VersionSpec, Versions};

/// Picks the next version to adopt, or `None` when the dependency is
/// already current or nothing satisfies the active constraints.
///
/// Candidates are scanned in descending precedence; the first survivor
/// wins. Wildcard currents (`latest`, `*`, empty) accept the highest
/// precedence candidate regardless of ordering, operator, and scope
/// constraints, but the prerelease and deprecated filters still apply.
pub fn select_next(
    current: &VersionSpec,
    candidates: &Versions,
    config: &Config,
) -> Option<SelectedVersion> {
    let chosen = candidates
        .iter()
        .find(|candidate| survives(current, candidate, config))?;

    Some(SelectedVersion {
        entry: chosen.clone(),
        operator: operator_for(current, config),
    })
}

fn survives(current: &VersionSpec, candidate: &VersionEntry, config: &Config) -> bool {
    if !candidate.version.pre.is_empty() && !config.pre {
        return false;
    }
    if config.skip_deprecated && candidate.deprecated {
        return false;
    }

    let cur = match current.version() {
        Some(cur) => cur,
        // Wildcard current: no ordering or constraint to enforce.
        None => return true,
    };

    if candidate.version <= *cur {
        return false;
    }

    if config.maintain_semver {
        match current.operator() {
            // No operator is an exact pin; nothing above it satisfies.
            None => return false,
            Some(op) => {
                if !op.allows(cur, &candidate.version) {
                    return false;
                }
            }
        }
    }

    if config.patch
        && (candidate.version.major != cur.major || candidate.version.minor != cur.minor)
    {
        return false;
    }
    if config.minor && candidate.version.major != cur.major {
        return false;
    }

    true
}

/// The operator carried onto the selected version for serialisation.
fn operator_for(current: &VersionSpec, config: &Config) -> Option<RangeOperator> {
    if config.keep_range_operator {
        return current.operator();
    }
    if !config.maintain_semver {
        if config.patch {
            return Some(RangeOperator::Tilde);
        }
        if config.minor {
            return Some(RangeOperator::Caret);
        }
    }
    None
}
