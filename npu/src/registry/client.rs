//! HTTP registry client.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, trace, warn};

use super::{Npmrc, RegistryDocument, RegistryError};
use crate::version::{parse_lenient, VersionEntry, Versions};

/// User-Agent identifying this tool to registries.
const USER_AGENT: &str = concat!("npu/", env!("CARGO_PKG_VERSION"));

/// Negotiates the compact install document with a full-JSON fallback.
const ACCEPT: &str =
    "application/vnd.npm.install-v1+json; q=1.0, application/json; q=0.8, */*";

/// Connection pool floor; thousands of lookups fan out against one host.
const POOL_MAX_IDLE_PER_HOST: usize = 64;

/// Idle connections are reaped after this long.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for registry operations.
///
/// This abstraction allows for dependency injection and easier testing by
/// enabling mock registry clients in tests.
pub trait RegistryClient: Send + Sync {
    /// Performs a `HEAD` request for a package and returns the ETag.
    ///
    /// Returns `Ok(None)` on a non-success status; the caller falls back
    /// to a full fetch.
    fn head_etag(
        &self,
        package: &str,
    ) -> impl Future<Output = Result<Option<String>, RegistryError>> + Send;

    /// Performs a `GET` request for a package's version record.
    fn fetch_package(
        &self,
        package: &str,
    ) -> impl Future<Output = Result<RegistryDocument, RegistryError>> + Send;
}

/// Registry client on a shared reqwest connection pool.
///
/// Selects a scoped registry and attaches a bearer token when the package
/// name's scope has `.npmrc` overrides. The client never retries; retry
/// policy belongs to higher layers.
#[derive(Clone)]
pub struct HttpRegistryClient {
    client: reqwest::Client,
    default_registry: String,
    npmrc: Npmrc,
}

impl HttpRegistryClient {
    /// Creates a client against `default_registry` with the given
    /// credentials and per-request timeout.
    pub fn new(
        default_registry: impl Into<String>,
        npmrc: Npmrc,
        timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RegistryError::Http(format!("failed to create HTTP client: {e}")))?;

        let mut default_registry = default_registry.into();
        if let Some(ref override_url) = npmrc.default_registry {
            default_registry = override_url.clone();
        }

        Ok(Self {
            client,
            default_registry,
            npmrc,
        })
    }

    /// The registry URL and optional bearer token for a package.
    fn route(&self, package: &str) -> (String, Option<&str>) {
        match self.npmrc.registry_for(package) {
            Some(scoped) => (package_url(scoped, package), self.npmrc.token_for(package)),
            None => (package_url(&self.default_registry, package), None),
        }
    }

    fn request(&self, method: reqwest::Method, package: &str) -> reqwest::RequestBuilder {
        let (url, token) = self.route(package);
        trace!(package, url, method = %method, "registry request");

        let mut request = self.client.request(method, url).header("Accept", ACCEPT);
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        request
    }
}

impl RegistryClient for HttpRegistryClient {
    async fn head_etag(&self, package: &str) -> Result<Option<String>, RegistryError> {
        let response = self
            .request(reqwest::Method::HEAD, package)
            .send()
            .await
            .map_err(|e| RegistryError::Http(e.to_string()))?;

        if !response.status().is_success() {
            debug!(
                package,
                status = response.status().as_u16(),
                "HEAD returned non-success, skipping etag shortcut"
            );
            return Ok(None);
        }

        Ok(header_etag(&response))
    }

    async fn fetch_package(&self, package: &str) -> Result<RegistryDocument, RegistryError> {
        let response = self
            .request(reqwest::Method::GET, package)
            .send()
            .await
            .map_err(|e| RegistryError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(package, status = status.as_u16(), "registry error status");
            return Err(RegistryError::Status {
                status: status.as_u16(),
                package: package.to_string(),
            });
        }

        let etag = header_etag(&response);
        let body = response
            .bytes()
            .await
            .map_err(|e| RegistryError::Http(format!("failed to read response: {e}")))?;

        decode_document(package, &body, etag)
    }
}

/// Joins a registry base URL and a package name.
///
/// Scoped names are appended raw; registries accept both raw and encoded
/// forms.
fn package_url(base: &str, package: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), package)
}

fn header_etag(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(rename = "dist-tags", default)]
    dist_tags: HashMap<String, String>,
    #[serde(default)]
    versions: HashMap<String, RawVersion>,
}

#[derive(Debug, Deserialize)]
struct RawVersion {
    /// Absent on withdrawn publications; those entries are ignored.
    dist: Option<RawDist>,
    /// Non-empty string marks the version deprecated.
    #[serde(default)]
    deprecated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDist {
    #[serde(rename = "unpackedSize", default)]
    unpacked_size: u64,
}

/// Decodes a registry package document.
pub(crate) fn decode_document(
    package: &str,
    body: &[u8],
    etag: Option<String>,
) -> Result<RegistryDocument, RegistryError> {
    let raw: RawDocument = serde_json::from_slice(body).map_err(|e| RegistryError::Decode {
        package: package.to_string(),
        reason: e.to_string(),
    })?;

    let entries: Vec<VersionEntry> = raw
        .versions
        .into_iter()
        .filter_map(|(version, v)| {
            let dist = v.dist?;
            let deprecated = v.deprecated.as_deref().is_some_and(|d| !d.is_empty());
            VersionEntry::new(version, dist.unpacked_size, deprecated)
        })
        .collect();

    let latest = raw
        .dist_tags
        .get("latest")
        .and_then(|tag| parse_lenient(tag));

    Ok(RegistryDocument {
        etag,
        latest,
        versions: Versions::from_entries(entries),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_url_join() {
        assert_eq!(
            package_url("https://registry.npmjs.org/", "react"),
            "https://registry.npmjs.org/react"
        );
        assert_eq!(
            package_url("https://reg.acme", "@acme/widget"),
            "https://reg.acme/@acme/widget"
        );
    }

    #[test]
    fn test_decode_document_basic() {
        let body = br#"{
            "dist-tags": { "latest": "1.1.0" },
            "versions": {
                "1.0.0": { "dist": { "unpackedSize": 1000 } },
                "1.1.0": { "dist": { "unpackedSize": 2000 } }
            }
        }"#;
        let doc = decode_document("pkg", body, Some("\"abc\"".into())).unwrap();
        assert_eq!(doc.etag.as_deref(), Some("\"abc\""));
        assert_eq!(doc.latest, Some(semver::Version::new(1, 1, 0)));
        assert_eq!(doc.versions.len(), 2);
        assert_eq!(doc.versions.get("1.1.0").unwrap().weight, 2000);
    }

    #[test]
    fn test_decode_drops_distless_versions() {
        let body = br#"{
            "versions": {
                "1.0.0": { "dist": { "unpackedSize": 1000 } },
                "0.9.0": {}
            }
        }"#;
        let doc = decode_document("pkg", body, None).unwrap();
        assert_eq!(doc.versions.len(), 1);
        assert!(doc.versions.get("0.9.0").is_none());
    }

    #[test]
    fn test_decode_deprecated_bit() {
        let body = br#"{
            "versions": {
                "1.0.1": { "dist": { "unpackedSize": 10 }, "deprecated": "use 1.1.0" },
                "1.1.0": { "dist": { "unpackedSize": 10 }, "deprecated": "" }
            }
        }"#;
        let doc = decode_document("pkg", body, None).unwrap();
        assert!(doc.versions.get("1.0.1").unwrap().deprecated);
        assert!(!doc.versions.get("1.1.0").unwrap().deprecated);
    }

    #[test]
    fn test_decode_orders_descending() {
        let body = br#"{
            "versions": {
                "1.0.0": { "dist": { "unpackedSize": 1 } },
                "2.0.0": { "dist": { "unpackedSize": 1 } },
                "1.5.0": { "dist": { "unpackedSize": 1 } }
            }
        }"#;
        let doc = decode_document("pkg", body, None).unwrap();
        let order: Vec<&str> = doc.versions.iter().map(|e| e.raw.as_str()).collect();
        assert_eq!(order, vec!["2.0.0", "1.5.0", "1.0.0"]);
    }

    #[test]
    fn test_decode_garbage_errors() {
        assert!(decode_document("pkg", b"<html>", None).is_err());
    }

    #[test]
    fn test_scoped_route_uses_npmrc() {
        let npmrc = Npmrc::parse("@acme:registry=https://reg.acme/\n@acme:_authToken=TOKEN\n");
        let client = HttpRegistryClient::new(
            "https://registry.npmjs.org/",
            npmrc,
            Duration::from_secs(5),
        )
        .unwrap();

        let (url, token) = client.route("@acme/widget");
        assert_eq!(url, "https://reg.acme/@acme/widget");
        assert_eq!(token, Some("TOKEN"));

        let (url, token) = client.route("react");
        assert_eq!(url, "https://registry.npmjs.org/react");
        assert_eq!(token, None);
    }

    #[test]
    fn test_default_registry_override_from_npmrc() {
        let npmrc = Npmrc::parse("registry=https://mirror.example\n");
        let client = HttpRegistryClient::new(
            "https://registry.npmjs.org/",
            npmrc,
            Duration::from_secs(5),
        )
        .unwrap();
        let (url, _) = client.route("react");
        assert_eq!(url, "https://mirror.example/react");
    }
}
