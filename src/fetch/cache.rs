use crate::data::feature::GeoFeature;
use crate::prelude::{Arc, Duration};
use crate::traits::{CacheStats, Cacheable};
use lru::LruCache;
use tokio::time::Instant;

/// Shared, immutable feature list as stored in the cache
pub type FeatureList = Arc<Vec<GeoFeature>>;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub features: FeatureList,
    pub inserted_at: Instant,
}

impl CacheEntry {
    pub fn is_fresh(&self, ttl: Option<Duration>, now: Instant) -> bool {
        ttl.map_or(true, |ttl| now.saturating_duration_since(self.inserted_at) < ttl)
    }
}

/// Bounded key → feature-list store.
///
/// Entries are ordered by insertion (reads use `peek` so they never reorder),
/// which makes pruning oldest-first.
pub struct GeoDataCache {
    entries: LruCache<String, CacheEntry>,
    max_entries: usize,
    prune_fraction: f64,
    ttl: Option<Duration>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl GeoDataCache {
    pub fn new(max_entries: usize, prune_fraction: f64, ttl: Option<Duration>) -> Self {
        Self {
            entries: LruCache::unbounded(),
            max_entries: max_entries.max(1),
            prune_fraction: prune_fraction.clamp(f64::EPSILON, 1.0),
            ttl,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn from_config(config: &crate::core::config::CacheConfig) -> Self {
        Self::new(config.max_entries, config.prune_fraction, config.entry_ttl())
    }

    /// Fresh entry for `key`, counting the lookup in the stats
    pub fn get(&mut self, key: &str, now: Instant) -> Option<FeatureList> {
        let ttl = self.ttl;
        let found = self
            .entries
            .peek(key)
            .filter(|entry| entry.is_fresh(ttl, now))
            .map(|entry| entry.features.clone());
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Entry for `key` regardless of age
    pub fn get_stale(&self, key: &str) -> Option<FeatureList> {
        self.entries.peek(key).map(|entry| entry.features.clone())
    }

    pub fn entry(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.peek(key)
    }

    /// Stores an entry (replacing any previous one) and prunes if oversized.
    /// Returns the number of entries evicted.
    pub fn insert(&mut self, key: String, features: FeatureList, now: Instant) -> usize {
        // Re-inserting must refresh the age and move the key to the back
        self.entries.pop(&key);
        let entry = CacheEntry {
            key: key.clone(),
            features,
            inserted_at: now,
        };
        self.entries.put(key, entry);
        self.prune()
    }

    /// Removes oldest entries until the cache fits its bound. Each cycle
    /// removes `ceil(len * prune_fraction)` entries.
    pub fn prune(&mut self) -> usize {
        let mut removed = 0;
        while self.entries.len() > self.max_entries {
            let batch = (self.entries.len() as f64 * self.prune_fraction).ceil() as usize;
            for _ in 0..batch.max(1) {
                if self.entries.pop_lru().is_none() {
                    break;
                }
                removed += 1;
            }
        }
        if removed > 0 {
            self.evictions += removed as u64;
            log::debug!(
                "pruned {} cache entries, {} remain",
                removed,
                self.entries.len()
            );
        }
        removed
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.pop(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn set_max_entries(&mut self, max_entries: usize) -> usize {
        self.max_entries = max_entries.max(1);
        self.prune()
    }

    /// Keys from oldest to newest
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().rev().map(|(key, _)| key.clone()).collect()
    }
}

impl Default for GeoDataCache {
    fn default() -> Self {
        Self::from_config(&crate::core::config::CacheConfig::default())
    }
}

impl Cacheable for GeoDataCache {
    type Key = String;
    type Value = FeatureList;

    fn get_cached(&self, key: &Self::Key) -> Option<Self::Value> {
        let now = Instant::now();
        self.entries
            .peek(key)
            .filter(|entry| entry.is_fresh(self.ttl, now))
            .map(|entry| entry.features.clone())
    }

    fn cache(&mut self, key: Self::Key, value: Self::Value) {
        self.insert(key, value, Instant::now());
    }

    fn invalidate(&mut self, key: &Self::Key) {
        self.remove(key);
    }

    fn clear_cache(&mut self) {
        self.clear();
    }

    fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            size: self.entries.len(),
        }
    }
}
