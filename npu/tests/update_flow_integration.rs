//! End-to-end update flow: manifest load → resolution → rewrite.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use npu::cache::{Cache, DiskCache};
use npu::config::Config;
use npu::dependency;
use npu::manifest::{changes_from_deps, update_manifest, WorkspacePackage};
use npu::registry::{RegistryClient, RegistryDocument, RegistryError};
use npu::resolver::{ProgressSender, Resolver};
use npu::version::{VersionEntry, Versions};

/// Registry client serving fixed documents.
struct FixtureRegistry {
    documents: HashMap<String, RegistryDocument>,
}

impl FixtureRegistry {
    fn new(packages: &[(&str, &[&str])]) -> Self {
        let mut documents = HashMap::new();
        for (name, raws) in packages {
            documents.insert(
                name.to_string(),
                RegistryDocument {
                    etag: Some(format!("\"etag-{name}\"")),
                    latest: None,
                    versions: Versions::from_entries(
                        raws.iter()
                            .map(|r| VersionEntry::new(*r, 2048, false).unwrap())
                            .collect(),
                    ),
                },
            );
        }
        Self { documents }
    }
}

impl RegistryClient for FixtureRegistry {
    async fn head_etag(&self, package: &str) -> Result<Option<String>, RegistryError> {
        Ok(self.documents.get(package).and_then(|d| d.etag.clone()))
    }

    async fn fetch_package(&self, package: &str) -> Result<RegistryDocument, RegistryError> {
        self.documents
            .get(package)
            .cloned()
            .ok_or_else(|| RegistryError::Status {
                status: 404,
                package: package.to_string(),
            })
    }
}

fn write_manifest(dir: &Path, content: &str) {
    std::fs::write(dir.join("package.json"), content).unwrap();
}

async fn run_update(dir: &Path, cache: Arc<dyn Cache>, registry: FixtureRegistry, config: Config) {
    let config = Config {
        base_dir: dir.to_path_buf(),
        non_interactive: true,
        no_install: true,
        ..config
    };

    let root = WorkspacePackage::load_single(dir).unwrap();
    let deps = root.collect_dependencies(&config);
    let mut deps = dependency::apply_filters(
        deps,
        config.filter.as_deref(),
        &config.include,
        &config.exclude,
    );

    let resolver = Resolver::new(registry, cache, config.clone());
    resolver
        .resolve(&mut deps, &ProgressSender::disabled(), CancellationToken::new())
        .await
        .unwrap();

    // Non-interactive: accept every found update.
    let mut deps = dependency::with_updates(deps);
    for dep in &mut deps {
        dep.should_update = true;
    }

    for (workspace, group) in dependency::group_by_workspace(dependency::marked_for_update(deps)) {
        let changes = changes_from_deps(&group);
        update_manifest(&workspace, &changes, config.dry_run).unwrap();
    }
}

#[tokio::test]
async fn test_update_rewrites_manifest_preserving_operators() {
    let temp = tempfile::TempDir::new().unwrap();
    write_manifest(
        temp.path(),
        r#"{
  "name": "demo",
  "dependencies": {
    "alpha": "^1.2.3",
    "beta": "~2.0.0",
    "gamma": "3.0.0"
  }
}"#,
    );

    let registry = FixtureRegistry::new(&[
        ("alpha", &["1.2.3", "1.9.0"] as &[&str]),
        ("beta", &["2.0.0", "2.4.1"]),
        ("gamma", &["3.0.0"]),
    ]);
    let cache = Arc::new(DiskCache::open_at(temp.path().join("cache")).unwrap());

    run_update(temp.path(), cache, registry, Config::default()).await;

    let written = std::fs::read_to_string(temp.path().join("package.json")).unwrap();
    assert!(written.contains("\"alpha\": \"^1.9.0\""), "operator preserved: {written}");
    assert!(written.contains("\"beta\": \"~2.4.1\""));
    // Already current: untouched.
    assert!(written.contains("\"gamma\": \"3.0.0\""));
    // Key order survives the rewrite.
    assert!(written.find("\"name\"").unwrap() < written.find("\"dependencies\"").unwrap());
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let temp = tempfile::TempDir::new().unwrap();
    write_manifest(
        temp.path(),
        r#"{"dependencies": {"alpha": "^1.2.3"}}"#,
    );
    let cache: Arc<dyn Cache> = Arc::new(DiskCache::open_at(temp.path().join("cache")).unwrap());

    run_update(
        temp.path(),
        Arc::clone(&cache),
        FixtureRegistry::new(&[("alpha", &["1.2.3", "1.9.0"] as &[&str])]),
        Config::default(),
    )
    .await;
    let first = std::fs::read_to_string(temp.path().join("package.json")).unwrap();
    assert!(first.contains("^1.9.0"));

    run_update(
        temp.path(),
        cache,
        FixtureRegistry::new(&[("alpha", &["1.2.3", "1.9.0"] as &[&str])]),
        Config::default(),
    )
    .await;
    let second = std::fs::read_to_string(temp.path().join("package.json")).unwrap();
    assert_eq!(first, second, "unchanged registry must not change the manifest again");
}

#[tokio::test]
async fn test_patch_flag_constrains_whole_run() {
    let temp = tempfile::TempDir::new().unwrap();
    write_manifest(
        temp.path(),
        r#"{"dependencies": {"alpha": "^1.2.3"}}"#,
    );
    let cache = Arc::new(DiskCache::open_at(temp.path().join("cache")).unwrap());

    let config = Config {
        patch: true,
        ..Config::default()
    };
    run_update(
        temp.path(),
        cache,
        FixtureRegistry::new(&[("alpha", &["1.2.3", "1.2.4", "1.3.0", "2.0.0"] as &[&str])]),
        config,
    )
    .await;

    let written = std::fs::read_to_string(temp.path().join("package.json")).unwrap();
    assert!(written.contains("\"alpha\": \"^1.2.4\""), "{written}");
}

#[tokio::test]
async fn test_exclude_list_shields_package() {
    let temp = tempfile::TempDir::new().unwrap();
    write_manifest(
        temp.path(),
        r#"{"dependencies": {"alpha": "^1.0.0", "beta": "^1.0.0"}}"#,
    );
    let cache = Arc::new(DiskCache::open_at(temp.path().join("cache")).unwrap());

    let config = Config {
        exclude: vec!["beta".to_string()],
        ..Config::default()
    };
    run_update(
        temp.path(),
        cache,
        FixtureRegistry::new(&[
            ("alpha", &["2.0.0"] as &[&str]),
            ("beta", &["2.0.0"]),
        ]),
        config,
    )
    .await;

    let written = std::fs::read_to_string(temp.path().join("package.json")).unwrap();
    assert!(written.contains("\"alpha\": \"^2.0.0\""));
    assert!(written.contains("\"beta\": \"^1.0.0\""));
}
