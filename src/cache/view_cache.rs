use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use crate::assemble::RenderGraph;

/// Thread-safe LRU cache of assembled render graphs.
///
/// Keyed by (snapshot content hash, canonical filter key); the pipeline is a
/// pure function of those two, so a hit is indistinguishable from
/// recomputation. A fresh snapshot load changes the hash and naturally
/// invalidates every cached view.
pub struct ViewCache {
    cache: Mutex<LruCache<String, Arc<RenderGraph>>>,
}

impl ViewCache {
    /// Create a view cache with the given capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).expect("Cache capacity must be at least 1");
        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    fn key(snapshot_hash: &str, filter_key: &str) -> String {
        format!("{}#{}", snapshot_hash, filter_key)
    }

    /// Get a cached render graph.
    pub fn get(&self, snapshot_hash: &str, filter_key: &str) -> Option<Arc<RenderGraph>> {
        self.cache
            .lock()
            .unwrap()
            .get(&Self::key(snapshot_hash, filter_key))
            .cloned()
    }

    /// Store a render graph.
    pub fn put(&self, snapshot_hash: &str, filter_key: &str, graph: Arc<RenderGraph>) {
        self.cache
            .lock()
            .unwrap()
            .put(Self::key(snapshot_hash, filter_key), graph);
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().unwrap().is_empty()
    }

    /// Drop every cached view.
    pub fn clear(&self) {
        self.cache.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::AssembleStats;

    fn graph() -> Arc<RenderGraph> {
        Arc::new(RenderGraph {
            nodes: vec![],
            edges: vec![],
            stats: AssembleStats::default(),
        })
    }

    #[test]
    fn test_cache_put_and_get() {
        let cache = ViewCache::new(10);
        cache.put("hash1", "teams=coding", graph());
        assert!(cache.get("hash1", "teams=coding").is_some());
    }

    #[test]
    fn test_cache_miss_on_different_snapshot() {
        let cache = ViewCache::new(10);
        cache.put("hash1", "teams=coding", graph());
        assert!(cache.get("hash2", "teams=coding").is_none());
        assert!(cache.get("hash1", "teams=writing").is_none());
    }

    #[test]
    fn test_cache_eviction() {
        let cache = ViewCache::new(2);
        cache.put("h", "a", graph());
        cache.put("h", "b", graph());
        cache.put("h", "c", graph());

        assert!(cache.get("h", "a").is_none());
        assert!(cache.get("h", "b").is_some());
        assert!(cache.get("h", "c").is_some());
    }

    #[test]
    fn test_cache_clear() {
        let cache = ViewCache::new(10);
        cache.put("h", "a", graph());
        cache.put("h", "b", graph());
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("h", "a").is_none());
    }
}
