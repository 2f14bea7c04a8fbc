//! The concurrent dependency-resolution engine.
//!
//! Fans package lookups out to a bounded worker pool, coordinates with the
//! persistent ETag-keyed cache, and assigns each dependency its next
//! version. Tasks never touch shared dependency state: each returns an
//! outcome that the engine applies after join, so a cancelled task leaves
//! its dependency exactly as it found it.

pub mod progress;
pub mod selector;

pub use progress::{progress_channel, ProgressReceiver, ProgressSender};
pub use selector::select_next;

use std::sync::Arc;

use semver::Version;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{etag_key, package_key, Cache};
use crate::config::Config;
use crate::dependency::{Dependency, SelectedVersion};
use crate::registry::{RegistryClient, RegistryDocument};
use crate::version::{VersionSpec, Versions};

/// Errors from a resolution run.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The run was cancelled by the operator or a signal.
    #[error("resolution cancelled")]
    Cancelled,
}

/// What a single lookup task produced for its dependency.
struct Outcome {
    versions: Versions,
    latest: Option<Version>,
    next: Option<SelectedVersion>,
}

/// The resolution engine.
///
/// Holds the registry client, the cache handle, and the run configuration;
/// [`Resolver::resolve`] is the engine's single entry point.
pub struct Resolver<C: RegistryClient> {
    client: Arc<C>,
    cache: Arc<dyn Cache>,
    config: Arc<Config>,
}

impl<C: RegistryClient + 'static> Resolver<C> {
    pub fn new(client: C, cache: Arc<dyn Cache>, config: Config) -> Self {
        Self {
            client: Arc::new(client),
            cache,
            config: Arc::new(config),
        }
    }

    /// Resolves the next version for every dependency in `deps`.
    ///
    /// Every record is either left untouched or has its candidate set and
    /// `next` assigned. Per-package failures are not fatal; the only error
    /// is [`ResolveError::Cancelled`].
    pub async fn resolve(
        &self,
        deps: &mut [Dependency],
        progress: &ProgressSender,
        cancel: CancellationToken,
    ) -> Result<(), ResolveError> {
        if deps.is_empty() {
            return Ok(());
        }

        let workers = self.config.worker_count(deps.len());
        debug!(workers, deps = deps.len(), "starting resolution");

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks: JoinSet<(usize, Option<Outcome>)> = JoinSet::new();

        for (index, dep) in deps.iter().enumerate() {
            let client = Arc::clone(&self.client);
            let cache = Arc::clone(&self.cache);
            let config = Arc::clone(&self.config);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let progress = progress.clone();
            let name = dep.name.clone();
            let current = dep.current.clone();

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (index, None),
                };
                if cancel.is_cancelled() {
                    return (index, None);
                }

                progress.started(&name);

                let outcome = tokio::select! {
                    _ = cancel.cancelled() => None,
                    result = tokio::time::timeout(
                        config.package_timeout(),
                        lookup(client.as_ref(), cache.as_ref(), &config, &name, &current),
                    ) => match result {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            debug!(package = %name, "lookup timed out");
                            None
                        }
                    },
                };

                progress.finished();
                (index, outcome)
            });
        }

        // Drain the pool completely, even when cancelled, so no task is
        // left running against a dependency we are about to hand back.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Some(outcome))) => {
                    let dep = &mut deps[index];
                    dep.versions = outcome.versions;
                    dep.latest = outcome.latest;
                    dep.next = outcome.next;
                }
                Ok((_, None)) => {}
                Err(e) => warn!(error = %e, "resolution task panicked"),
            }
        }

        if cancel.is_cancelled() {
            Err(ResolveError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Resolves one dependency: cache restore, ETag revalidation, fetch,
/// cache store, selection.
async fn lookup<C: RegistryClient>(
    client: &C,
    cache: &dyn Cache,
    config: &Config,
    name: &str,
    current: &VersionSpec,
) -> Option<Outcome> {
    let mut document: Option<RegistryDocument> = None;

    // Try the cache first; a matching ETag lets us skip the GET entirely.
    if let Some(bytes) = cache.get(&package_key(name)) {
        if let Ok(versions) = Versions::from_cache_bytes(&bytes) {
            if let Some(etag_bytes) = cache.get(&etag_key(name)) {
                let cached_etag = String::from_utf8_lossy(&etag_bytes).into_owned();
                match client.head_etag(name).await {
                    Ok(Some(remote_etag)) if remote_etag == cached_etag => {
                        debug!(package = name, "etag match, using cached versions");
                        document = Some(RegistryDocument {
                            etag: Some(remote_etag),
                            latest: None,
                            versions,
                        });
                    }
                    Ok(_) => {}
                    Err(e) => debug!(package = name, error = %e, "etag check failed"),
                }
            }
        }
    }

    let document = match document {
        Some(doc) => doc,
        None => match client.fetch_package(name).await {
            Ok(doc) => {
                if let Some(ref etag) = doc.etag {
                    if let Err(e) = cache.set(&etag_key(name), etag.as_bytes()) {
                        debug!(package = name, error = %e, "failed to cache etag");
                    }
                }
                match doc.versions.to_cache_bytes() {
                    Ok(bytes) => {
                        if let Err(e) = cache.set(&package_key(name), &bytes) {
                            debug!(package = name, error = %e, "failed to cache versions");
                        }
                    }
                    Err(e) => debug!(package = name, error = %e, "failed to encode versions"),
                }
                doc
            }
            Err(e) => {
                debug!(package = name, error = %e, "registry lookup failed");
                return None;
            }
        },
    };

    let next = select_next(current, &document.versions, config);
    Some(Outcome {
        versions: document.versions,
        latest: document.latest,
        next,
    })
}
