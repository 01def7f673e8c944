//! End-to-end index pipeline: list assets, prefetch them on a bounded pool, then feed the
//! successes into a [`Repository`] in listing order.

use std::{num::NonZeroUsize, sync::Arc, time::Instant};

use debhub_config::Config;
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};
use tracing::{info, warn};

use crate::{
    error::{CoreError, CoreResult, LoadError},
    loader::PackageLoader,
    origin::Origin,
    package::{AssetDescriptor, Component, Package},
    registry::PackageCache,
    repository::Repository,
    source::ReleaseSource,
};

/// Shape of the index to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOptions {
    pub suite: String,
    pub component: Component,
    pub partitioned: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            suite: String::new(),
            component: Component::Releases,
            partitioned: false,
        }
    }
}

/// Load outcome of one listed asset.
#[derive(Debug, Clone)]
pub struct PackageStatus {
    pub asset: AssetDescriptor,
    pub outcome: Result<Arc<Package>, LoadError>,
}

pub struct IndexBuilder {
    source: Arc<dyn ReleaseSource>,
    packages: Arc<PackageCache>,
    pool: ThreadPool,
    allowed_owners: Vec<String>,
}

impl IndexBuilder {
    pub fn new(
        source: Arc<dyn ReleaseSource>,
        packages: Arc<PackageCache>,
        parallel_limit: usize,
    ) -> CoreResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(parallel_limit.max(1))
            .thread_name(|i| format!("debhub-fetch-{i}"))
            .build()
            .map_err(|err| CoreError::ThreadPool(err.to_string()))?;

        Ok(Self {
            source,
            packages,
            pool,
            allowed_owners: Vec::new(),
        })
    }

    /// Wires the services described by `config` around `source` and `origin`.
    pub fn from_config(
        config: &Config,
        source: Arc<dyn ReleaseSource>,
        origin: Arc<dyn Origin>,
    ) -> CoreResult<Self> {
        let loader = PackageLoader::from_config(config, origin);
        let capacity = NonZeroUsize::new(config.package_cache_size()).unwrap_or(NonZeroUsize::MIN);
        let packages = Arc::new(PackageCache::new(loader, capacity));

        Ok(Self::new(source, packages, config.parallel_limit())?
            .with_allowed_owners(config.allowed_owners.clone().unwrap_or_default()))
    }

    /// Limits requests to `owners`; an empty list allows every owner.
    pub fn with_allowed_owners(mut self, owners: Vec<String>) -> Self {
        self.allowed_owners = owners;
        self
    }

    pub fn packages(&self) -> &Arc<PackageCache> {
        &self.packages
    }

    fn list(&self, owner: &str, repo: Option<&str>) -> CoreResult<Vec<AssetDescriptor>> {
        if !self.allowed_owners.is_empty() && !self.allowed_owners.iter().any(|o| o == owner) {
            return Err(CoreError::OwnerNotAllowed(owner.to_string()));
        }

        self.source
            .list_assets(owner, repo)
            .map_err(CoreError::ReleaseSource)
    }

    /// Loads every asset on the pool. Results keep the order of `assets`.
    fn prefetch(&self, assets: &[AssetDescriptor]) -> Vec<Result<Arc<Package>, LoadError>> {
        self.pool
            .install(|| assets.par_iter().map(|asset| self.packages.get(asset)).collect())
    }

    /// Builds the index for `owner`, or for `owner/repo`.
    ///
    /// Assets that fail to load are logged and left out; only listing errors fail the build.
    pub fn build(
        &self,
        owner: &str,
        repo: Option<&str>,
        options: &IndexOptions,
    ) -> CoreResult<Repository> {
        let started = Instant::now();
        let assets = self.list(owner, repo)?;
        let results = self.prefetch(&assets);

        let mut repository = Repository::new(owner, repo)
            .with_suite(options.suite.clone())
            .with_component(options.component)
            .partitioned(options.partitioned);

        let mut failed = 0usize;
        for (asset, result) in assets.iter().zip(results) {
            match result {
                Ok(package) => {
                    repository.add(package);
                }
                Err(err) => {
                    failed += 1;
                    warn!(id = asset.id, url = %asset.url, "skipping package: {err}");
                }
            }
        }
        repository.sort();

        info!(
            owner,
            repo = repo.unwrap_or_default(),
            assets = assets.len(),
            packages = repository.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built index"
        );
        Ok(repository)
    }

    /// Loads every asset like [`IndexBuilder::build`] and reports each outcome in listing
    /// order.
    pub fn status(&self, owner: &str, repo: Option<&str>) -> CoreResult<Vec<PackageStatus>> {
        let assets = self.list(owner, repo)?;
        let results = self.prefetch(&assets);

        Ok(assets
            .into_iter()
            .zip(results)
            .map(|(asset, outcome)| {
                PackageStatus {
                    asset,
                    outcome,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use debhub_dl::error::DownloadError;
    use parking_lot::Mutex;
    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::{
        cache::DiskCache,
        package::tests::asset,
        testing::{deb_bytes, FakeOrigin, SAMPLE_CONTROL},
    };

    struct FakeSource {
        assets: Vec<AssetDescriptor>,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl ReleaseSource for FakeSource {
        fn list_assets(
            &self,
            owner: &str,
            repo: Option<&str>,
        ) -> Result<Vec<AssetDescriptor>, DownloadError> {
            self.calls
                .lock()
                .push((owner.to_string(), repo.map(String::from)));
            if owner == "broken" {
                return Err(DownloadError::InvalidResponse);
            }
            Ok(self.assets.clone())
        }
    }

    struct PerUrlOrigin {
        ok: FakeOrigin,
        failing: FakeOrigin,
    }

    impl Origin for PerUrlOrigin {
        fn open(&self, url: &str) -> Result<debhub_dl::http::Download, DownloadError> {
            if url.contains("broken") {
                self.failing.open(url)
            } else {
                self.ok.open(url)
            }
        }
    }

    fn builder(assets: Vec<AssetDescriptor>) -> (IndexBuilder, Arc<FakeSource>, TempDir) {
        let dir = tempdir().unwrap();
        let failing = FakeOrigin::serving(Vec::new());
        failing.set_status(502);
        let origin = Arc::new(PerUrlOrigin {
            ok: FakeOrigin::serving(deb_bytes(SAMPLE_CONTROL)),
            failing,
        });
        let loader = PackageLoader::new(
            origin,
            DiskCache::new(dir.path()),
            Vec::new(),
            Duration::from_secs(30),
        );
        let packages = Arc::new(PackageCache::new(loader, NonZeroUsize::new(16).unwrap()));
        let source = Arc::new(FakeSource {
            assets,
            calls: Mutex::new(Vec::new()),
        });
        let builder =
            IndexBuilder::new(Arc::clone(&source) as Arc<dyn ReleaseSource>, packages, 4).unwrap();
        (builder, source, dir)
    }

    #[test]
    fn test_build_skips_failed_assets() {
        let mut broken = asset(2, "broken.deb");
        broken.url = "https://example.com/broken.deb".into();
        let (builder, source, _dir) = builder(vec![asset(1, "foo_1.0_amd64.deb"), broken]);

        let repository = builder
            .build("o", Some("tool"), &IndexOptions::default())
            .unwrap();
        assert_eq!(repository.len(), 1);
        assert_eq!(repository.packages()[0].name(), "foo");
        assert_eq!(
            source.calls.lock().as_slice(),
            [("o".to_string(), Some("tool".to_string()))]
        );
    }

    #[test]
    fn test_status_reports_every_asset_in_order() {
        let mut broken = asset(2, "broken.deb");
        broken.url = "https://example.com/broken.deb".into();
        let (builder, _, _dir) = builder(vec![broken, asset(1, "foo_1.0_amd64.deb")]);

        let status = builder.status("o", None).unwrap();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].asset.id, 2);
        assert!(status[0].outcome.as_ref().unwrap_err().is_transient());
        assert_eq!(status[1].outcome.as_ref().unwrap().name(), "foo");
    }

    #[test]
    fn test_owner_allow_list() {
        let (builder, source, _dir) = builder(vec![asset(1, "foo.deb")]);
        let builder = builder.with_allowed_owners(vec!["o".into()]);

        assert!(matches!(
            builder.build("mallory", None, &IndexOptions::default()),
            Err(CoreError::OwnerNotAllowed(owner)) if owner == "mallory"
        ));
        assert!(source.calls.lock().is_empty());
        assert!(builder.build("o", None, &IndexOptions::default()).is_ok());
    }

    #[test]
    fn test_allow_list_from_config() {
        let dir = tempdir().unwrap();
        let mut config = Config::default_config();
        config.cache_dir = Some(dir.path().display().to_string());
        config.allowed_owners = Some(vec!["o".into()]);
        let source = Arc::new(FakeSource {
            assets: Vec::new(),
            calls: Mutex::new(Vec::new()),
        });
        let origin = Arc::new(FakeOrigin::serving(Vec::new()));

        let builder = IndexBuilder::from_config(&config, source.clone(), origin.clone()).unwrap();
        assert!(matches!(
            builder.status("mallory", None),
            Err(CoreError::OwnerNotAllowed(owner)) if owner == "mallory"
        ));
        assert!(builder.status("o", None).unwrap().is_empty());

        config.allowed_owners = Some(Vec::new());
        let builder = IndexBuilder::from_config(&config, source.clone(), origin).unwrap();
        assert!(builder.status("mallory", None).unwrap().is_empty());
        assert_eq!(source.calls.lock().len(), 2);
    }

    #[test]
    fn test_release_source_errors_propagate() {
        let (builder, _, _dir) = builder(vec![]);
        assert!(matches!(
            builder.status("broken", None),
            Err(CoreError::ReleaseSource(DownloadError::InvalidResponse))
        ));
    }
}
