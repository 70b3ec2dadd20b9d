//! In-memory membership cache over queued item URLs

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// Set of item URLs already present in the queue
///
/// The cache is warmed from the store on first use and stays loaded until
/// cleared. Check-and-insert is atomic under a single lock.
#[derive(Debug, Default)]
pub struct DedupCache {
    inner: Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    loaded: bool,
    keys: HashSet<String>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        // the set stays consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Loads the cache with `loader` unless it is already loaded
    ///
    /// Returns true if the loader ran. A failing loader leaves the cache
    /// unloaded so the next call retries.
    pub fn populate_with<F, E>(&self, loader: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<Vec<String>, E>,
    {
        let mut state = self.state();
        if state.loaded {
            return Ok(false);
        }

        let keys = loader()?;
        state.keys.extend(keys);
        state.loaded = true;
        Ok(true)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state().keys.contains(key)
    }

    /// Inserts `key`, returning false if it was already present
    pub fn add(&self, key: &str) -> bool {
        self.state().keys.insert(key.to_string())
    }

    /// Forgets `keys`, so a later `add` admits them again
    pub fn remove_all(&self, keys: &[String]) {
        let mut state = self.state();
        for key in keys {
            state.keys.remove(key);
        }
    }

    /// Empties the cache and marks it unloaded
    pub fn clear(&self) {
        let mut state = self.state();
        state.keys.clear();
        state.loaded = false;
    }

    pub fn len(&self) -> usize {
        self.state().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_loaded(&self) -> bool {
        self.state().loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_check_and_insert() {
        let cache = DedupCache::new();
        assert!(cache.add("https://a/1"));
        assert!(!cache.add("https://a/1"));
        assert!(cache.contains("https://a/1"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_populate_runs_once() {
        let cache = DedupCache::new();
        let loaded: Result<bool, ()> =
            cache.populate_with(|| Ok(vec!["https://a/1".to_string(), "https://a/2".to_string()]));
        assert_eq!(loaded, Ok(true));

        let again: Result<bool, ()> = cache.populate_with(|| panic!("must not reload"));
        assert_eq!(again, Ok(false));
        assert_eq!(cache.len(), 2);
        assert!(!cache.add("https://a/2"));
    }

    #[test]
    fn test_failed_populate_leaves_cache_unloaded() {
        let cache = DedupCache::new();
        let result: Result<bool, &str> = cache.populate_with(|| Err("db down"));
        assert!(result.is_err());
        assert!(!cache.is_loaded());
    }

    #[test]
    fn test_removed_keys_are_admitted_again() {
        let cache = DedupCache::new();
        cache.add("https://a/1");
        cache.add("https://a/2");

        cache.remove_all(&["https://a/1".to_string(), "https://a/9".to_string()]);

        assert_eq!(cache.len(), 1);
        assert!(cache.add("https://a/1"));
        assert!(!cache.add("https://a/2"));
    }

    #[test]
    fn test_clear_forces_reload() {
        let cache = DedupCache::new();
        let _: Result<bool, ()> = cache.populate_with(|| Ok(vec!["x".to_string()]));
        cache.clear();

        assert!(cache.is_empty());
        assert!(!cache.is_loaded());
        let reloaded: Result<bool, ()> = cache.populate_with(|| Ok(Vec::new()));
        assert_eq!(reloaded, Ok(true));
    }
}
