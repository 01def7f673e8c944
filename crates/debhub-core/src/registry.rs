use std::{num::NonZeroUsize, sync::Arc};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    error::LoadError,
    loader::{PackageEntry, PackageLoader},
    package::{AssetDescriptor, Package},
};

/// Bounded registry of load slots keyed by asset id.
///
/// The registry lock only covers slot lookup, creation and eviction; loads run on the slot
/// itself. An evicted slot that is still being loaded finishes normally for the callers that
/// already hold it.
pub struct PackageCache {
    entries: Mutex<LruCache<u64, Arc<PackageEntry>>>,
    loader: PackageLoader,
}

impl PackageCache {
    pub fn new(loader: PackageLoader, capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            loader,
        }
    }

    /// Returns the slot for `id`, creating an empty one on first reference.
    pub fn entry(&self, id: u64) -> Arc<PackageEntry> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(&id) {
            return Arc::clone(entry);
        }

        let entry = Arc::new(PackageEntry::new());
        if let Some((evicted, _)) = entries.push(id, Arc::clone(&entry)) {
            if evicted != id {
                debug!(id = evicted, "evicted package from cache");
            }
        }
        entry
    }

    /// Looks up or creates the slot for `asset` and makes sure it is loaded.
    pub fn get(&self, asset: &AssetDescriptor) -> Result<Arc<Package>, LoadError> {
        self.entry(asset.id).ensure(&self.loader, asset)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
        debug!("cleared package cache");
    }
}
