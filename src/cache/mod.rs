//! TTL cache for recommendation results.
//!
//! The cache is a pure performance optimization, never a correctness
//! dependency: every failure path (poisoned lock, missing entry, expired
//! entry) degrades to a miss and recomputation.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Key-value cache with per-entry TTL and prefix invalidation.
///
/// Implementations must be infallible from the caller's perspective: a
/// backend error is logged and surfaces as a miss (for `get`) or a no-op
/// (for writes).
pub trait RecommendationCache: Send + Sync {
    /// Returns the cached value for `key` if present and unexpired.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key` for `ttl`.
    fn set_with_ttl(&self, key: &str, value: String, ttl: Duration);

    /// Removes every entry whose key starts with `prefix`.
    ///
    /// Returns the number of entries removed.
    fn delete_by_prefix(&self, prefix: &str) -> usize;
}

/// Entry in the in-process cache.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-process [`RecommendationCache`] backed by an LRU map.
///
/// # Thread Safety
///
/// Uses `RwLock` for interior mutability. Lock poisoning is handled with
/// fail-open semantics: a poisoned lock means reads miss and writes are
/// skipped, so a transient panic elsewhere never blocks recommendation
/// serving.
pub struct MemoryTtlCache {
    entries: RwLock<LruCache<String, CacheEntry>>,
}

impl MemoryTtlCache {
    /// Default entry capacity.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Creates a cache holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if capacity is 0.
    #[must_use]
    #[allow(clippy::expect_used)] // Documented panic for invalid input
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).expect("capacity must be > 0");
        Self {
            entries: RwLock::new(LruCache::new(cap)),
        }
    }

    /// Returns the number of live (possibly expired) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns true if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryTtlCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl RecommendationCache for MemoryTtlCache {
    fn get(&self, key: &str) -> Option<String> {
        // LruCache::get updates recency, so a write lock is required
        let Ok(mut entries) = self.entries.write() else {
            tracing::warn!("Recommendation cache lock poisoned, treating get as miss");
            return None;
        };

        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            },
            None => None,
        }
    }

    fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) {
        let Ok(mut entries) = self.entries.write() else {
            tracing::warn!("Recommendation cache lock poisoned, skipping write");
            return;
        };

        entries.put(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn delete_by_prefix(&self, prefix: &str) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            tracing::warn!("Recommendation cache lock poisoned, skipping invalidation");
            return 0;
        };

        let keys: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            entries.pop(key);
        }
        keys.len()
    }
}
