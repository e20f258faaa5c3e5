use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use crate::vfs::Resource;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(n) => n,
    None => unreachable!(),
};

/// Recently seen directory listings, keyed by root-relative directory path
/// (`""` for the root, otherwise ending with `/`).
///
/// Only the shell uses this, for completion and repeated `ls`; entries are
/// dropped whenever a command changes the directory.
#[derive(Clone)]
pub struct ListingCache {
    cache: Arc<Mutex<LruCache<String, Arc<Vec<Resource>>>>>,
}

impl ListingCache {
    /// Create a cache holding at most `capacity` listings
    pub fn new(capacity: usize) -> Self {
        let cache = LruCache::new(NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY));
        ListingCache {
            cache: Arc::new(Mutex::new(cache)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Arc<Vec<Resource>>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, dir: &str) -> Option<Arc<Vec<Resource>>> {
        self.lock().get(dir).cloned()
    }

    pub fn put(&self, dir: impl Into<String>, entries: Vec<Resource>) -> Arc<Vec<Resource>> {
        let entries = Arc::new(entries);
        self.lock().put(dir.into(), Arc::clone(&entries));
        entries
    }

    /// Forget `dir` and everything cached below it
    pub fn invalidate(&self, dir: &str) {
        let mut cache = self.lock();
        let stale: Vec<String> = cache
            .iter()
            .filter(|(key, _)| key.starts_with(dir))
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ListingCache {
    fn default() -> Self {
        ListingCache::new(DEFAULT_CAPACITY.get())
    }
}
