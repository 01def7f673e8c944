//! Package loading and the per-package load state machine.
//!
//! [`PackageLoader::load`] runs the full pipeline for one asset: open the origin, derive the
//! cache tag from its entity tag, reuse a cached control block or parse the archive, then
//! validate and classify the result. [`PackageEntry`] wraps it so that concurrent requests for
//! the same asset share a single execution.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use debhub_config::Config;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::{
    cache::{DiskCache, CONTROL_KIND},
    error::LoadError,
    origin::{cache_tag, Origin},
    package::{AssetDescriptor, Package},
};

pub struct PackageLoader {
    origin: Arc<dyn Origin>,
    cache: DiskCache,
    suites: Vec<String>,
    retry_cooldown: Duration,
}

impl PackageLoader {
    pub fn new(
        origin: Arc<dyn Origin>,
        cache: DiskCache,
        suites: Vec<String>,
        retry_cooldown: Duration,
    ) -> Self {
        Self {
            origin,
            cache,
            suites,
            retry_cooldown,
        }
    }

    pub fn from_config(config: &Config, origin: Arc<dyn Origin>) -> Self {
        Self::new(
            origin,
            DiskCache::new(config.cache_dir()),
            config.suites(),
            config.retry_cooldown(),
        )
    }

    pub fn retry_cooldown(&self) -> Duration {
        self.retry_cooldown
    }

    pub fn disk_cache(&self) -> &DiskCache {
        &self.cache
    }

    /// Loads one asset. Prefer [`PackageEntry::ensure`], which adds the once-only guard and
    /// retry policy.
    pub fn load(&self, asset: &AssetDescriptor) -> Result<Package, LoadError> {
        let started = Instant::now();
        debug!(id = asset.id, url = %asset.url, "loading package");

        let download = self.origin.open(&asset.url)?;
        let tag = download
            .etag
            .as_deref()
            .and_then(cache_tag)
            .ok_or_else(|| LoadError::MissingValidator(asset.url.clone()))?;

        let control = match self.cached_control(&tag) {
            Some(control) => {
                debug!(id = asset.id, tag, "using cached control block");
                control
            }
            None => {
                let parsed = debhub_package::parse(download.reader)?;
                if let Err(err) = self.cache.put(&tag, CONTROL_KIND, parsed.control.as_bytes()) {
                    warn!(id = asset.id, tag, "failed to cache control block: {err}");
                }
                parsed.control
            }
        };

        let package = Package::from_control(asset, control, &self.suites)?;
        info!(
            id = asset.id,
            package = %package.key(),
            suite = %package.suite,
            component = %package.component,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded package"
        );
        Ok(package)
    }

    fn cached_control(&self, tag: &str) -> Option<String> {
        match self.cache.get(tag, CONTROL_KIND) {
            Ok(Some(data)) => {
                String::from_utf8(data)
                    .inspect_err(|_| warn!(tag, "ignoring cache entry that is not UTF-8"))
                    .ok()
            }
            Ok(None) => None,
            Err(err) => {
                warn!(tag, "failed to read cache entry: {err}");
                None
            }
        }
    }
}

#[derive(Debug)]
enum LoadState {
    Empty,
    Loading,
    Loaded(Arc<Package>),
    Failed {
        error: LoadError,
        /// Set for transient failures only.
        retry_after: Option<Instant>,
    },
}

/// Load slot for one asset.
///
/// `Empty` and cooled-down transient failures move to `Loading` for exactly one caller; every
/// other caller blocks on a condition variable until the load settles and then shares its
/// outcome. Successes and permanent failures are final.
#[derive(Debug)]
pub struct PackageEntry {
    state: Mutex<LoadState>,
    settled: Condvar,
}

impl Default for PackageEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageEntry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LoadState::Empty),
            settled: Condvar::new(),
        }
    }

    pub fn ensure(
        &self,
        loader: &PackageLoader,
        asset: &AssetDescriptor,
    ) -> Result<Arc<Package>, LoadError> {
        self.ensure_with(loader.retry_cooldown(), || loader.load(asset))
    }

    fn ensure_with<F>(&self, cooldown: Duration, load: F) -> Result<Arc<Package>, LoadError>
    where
        F: FnOnce() -> Result<Package, LoadError>,
    {
        let mut state = self.state.lock();
        loop {
            match &*state {
                LoadState::Empty => break,
                LoadState::Loading => {}
                LoadState::Loaded(package) => return Ok(Arc::clone(package)),
                LoadState::Failed {
                    error,
                    retry_after,
                } => {
                    match retry_after {
                        Some(at) if Instant::now() >= *at => break,
                        _ => return Err(error.clone()),
                    }
                }
            }
            self.settled.wait(&mut state);
        }
        *state = LoadState::Loading;
        drop(state);

        let mut guard = LoadingGuard {
            entry: self,
            settled: false,
        };
        let result = load().map(Arc::new);

        let next = match &result {
            Ok(package) => LoadState::Loaded(Arc::clone(package)),
            Err(error) => {
                let retry_after = error.is_transient().then(|| {
                    warn!("package load failed, retrying in {cooldown:?}: {error}");
                    Instant::now() + cooldown
                });
                LoadState::Failed {
                    error: error.clone(),
                    retry_after,
                }
            }
        };
        guard.settle(next);
        result
    }
}

/// Leaves the entry retryable and wakes waiters if the loader unwinds.
struct LoadingGuard<'a> {
    entry: &'a PackageEntry,
    settled: bool,
}

impl LoadingGuard<'_> {
    fn settle(&mut self, next: LoadState) {
        *self.entry.state.lock() = next;
        self.settled = true;
        self.entry.settled.notify_all();
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(LoadState::Failed {
                error: LoadError::Transient("package load panicked".into()),
                retry_after: Some(Instant::now()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
    };

    use tempfile::tempdir;

    use super::*;
    use crate::{
        package::tests::asset,
        testing::{deb_bytes, FakeOrigin, SAMPLE_CONTROL},
    };

    fn loader(origin: &Arc<FakeOrigin>, cache: DiskCache, cooldown: Duration) -> PackageLoader {
        PackageLoader::new(
            Arc::clone(origin) as Arc<dyn Origin>,
            cache,
            vec!["bionic".into(), "xenial".into()],
            cooldown,
        )
    }

    #[test]
    fn test_load_valid_archive() {
        let dir = tempdir().unwrap();
        let origin = Arc::new(FakeOrigin::serving(deb_bytes(SAMPLE_CONTROL)));
        let loader = loader(&origin, DiskCache::new(dir.path()), Duration::from_secs(30));

        let package = loader.load(&asset(1, "foo_1.0_amd64.deb")).unwrap();
        assert_eq!(package.name(), "foo");
        assert_eq!(package.version(), "1.0");
        assert_eq!(package.architecture(), "amd64");
        assert!(package.control().starts_with(SAMPLE_CONTROL));
        assert!(package.field("SHA256").is_some());
        assert_eq!(origin.fetches(), 1);
        assert!(loader.disk_cache().get("etag-1", CONTROL_KIND).unwrap().is_some());
    }

    #[test]
    fn test_cache_hit_skips_parsing() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        cache
            .put(
                "etag-1",
                CONTROL_KIND,
                b"Package: cached\nVersion: 2\nArchitecture: all\n",
            )
            .unwrap();

        // The body is not an archive; it must never be read.
        let origin = Arc::new(FakeOrigin::serving(b"garbage".to_vec()));
        let loader = loader(&origin, cache, Duration::from_secs(30));

        let package = loader.load(&asset(1, "foo.deb")).unwrap();
        assert_eq!(package.name(), "cached");
    }

    #[test]
    fn test_missing_validator() {
        let dir = tempdir().unwrap();
        let origin = Arc::new(FakeOrigin::serving(deb_bytes(SAMPLE_CONTROL)));
        origin.set_etag(None);
        let loader = loader(&origin, DiskCache::new(dir.path()), Duration::from_secs(30));

        assert!(matches!(
            loader.load(&asset(1, "foo.deb")),
            Err(LoadError::MissingValidator(_))
        ));
    }

    #[test]
    fn test_missing_debian_binary_is_never_retried() {
        let dir = tempdir().unwrap();
        let origin = Arc::new(FakeOrigin::serving(crate::testing::ar_archive(&[(
            "data.tar.gz",
            &b"xx"[..],
        )])));
        let loader = loader(&origin, DiskCache::new(dir.path()), Duration::ZERO);
        let entry = PackageEntry::new();
        let asset = asset(1, "foo.deb");

        for _ in 0..3 {
            assert!(matches!(
                entry.ensure(&loader, &asset),
                Err(LoadError::MissingMember(_))
            ));
        }
        assert_eq!(origin.fetches(), 1);
    }

    #[test]
    fn test_transient_failure_retried_after_cooldown() {
        let dir = tempdir().unwrap();
        let origin = Arc::new(FakeOrigin::serving(deb_bytes(SAMPLE_CONTROL)));
        origin.set_status(500);
        let cooldown = Duration::from_millis(200);
        let loader = loader(&origin, DiskCache::new(dir.path()), cooldown);
        let entry = PackageEntry::new();
        let asset = asset(1, "foo.deb");

        let first = entry.ensure(&loader, &asset).unwrap_err();
        assert!(first.is_transient());
        assert_eq!(origin.fetches(), 1);

        origin.set_status(200);
        assert_eq!(entry.ensure(&loader, &asset).unwrap_err(), first);
        assert_eq!(origin.fetches(), 1);

        thread::sleep(cooldown + Duration::from_millis(50));
        let package = entry.ensure(&loader, &asset).unwrap();
        assert_eq!(package.name(), "foo");
        assert_eq!(origin.fetches(), 2);

        entry.ensure(&loader, &asset).unwrap();
        assert_eq!(origin.fetches(), 2);
    }

    #[test]
    fn test_concurrent_ensure_loads_once() {
        let dir = tempdir().unwrap();
        let origin = Arc::new(FakeOrigin::serving(deb_bytes(SAMPLE_CONTROL)));
        origin.set_delay(Duration::from_millis(100));
        let loader = loader(&origin, DiskCache::new(dir.path()), Duration::from_secs(30));
        let entry = PackageEntry::new();
        let asset = asset(1, "foo.deb");

        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| entry.ensure(&loader, &asset)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(origin.fetches(), 1);
        let first = results[0].as_ref().unwrap();
        for result in &results {
            assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
        }
    }

    #[test]
    fn test_panicking_load_leaves_entry_retryable() {
        let entry = PackageEntry::new();
        let attempt = thread::scope(|scope| {
            scope
                .spawn(|| {
                    entry.ensure_with(Duration::ZERO, || -> Result<Package, LoadError> {
                        panic!("boom")
                    })
                })
                .join()
        });
        assert!(attempt.is_err());

        let calls = AtomicUsize::new(0);
        let result = entry.ensure_with(Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LoadError::MissingField("Package"))
        });
        assert_eq!(result.unwrap_err(), LoadError::MissingField("Package"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The permanent failure now sticks.
        let result = entry.ensure_with(Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LoadError::Transient("unused".into()))
        });
        assert_eq!(result.unwrap_err(), LoadError::MissingField("Package"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
