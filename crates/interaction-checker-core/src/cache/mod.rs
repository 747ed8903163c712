//! Search result cache for keystroke-driven autocomplete.
//!
//! A small LRU with a time-to-live per entry. Expired entries read as
//! absent and are evicted lazily on lookup.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::models::{Substance, SubstanceType};

/// Default number of cached queries.
pub const DEFAULT_CAPACITY: usize = 10;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Time source, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Composite cache key: type filter plus trimmed lowercase query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: Option<SubstanceType>,
    pub query: String,
}

impl CacheKey {
    pub fn new(kind: Option<SubstanceType>, query: &str) -> Self {
        Self {
            kind,
            query: query.trim().to_lowercase(),
        }
    }
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Bounded, time-boxed LRU cache.
pub struct SearchCache<V> {
    entries: LruCache<CacheKey, CacheEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> SearchCache<V> {
    /// Cache with default capacity and TTL on the system clock.
    pub fn new() -> Self {
        Self::with_clock(DEFAULT_CAPACITY, DEFAULT_TTL, Arc::new(SystemClock))
    }

    /// Cache with explicit capacity, TTL and clock. A zero capacity is
    /// treated as one.
    pub fn with_clock(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
            clock,
        }
    }

    /// Look up a key. Fresh hits are promoted to most recently used;
    /// expired entries are removed and reported absent.
    pub fn get(&mut self, key: &CacheKey) -> Option<V> {
        let now = self.clock.now();
        let expired = match self.entries.peek(key) {
            None => return None,
            Some(entry) => now.saturating_duration_since(entry.inserted_at) > self.ttl,
        };

        if expired {
            self.entries.pop(key);
            return None;
        }

        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or replace a value. Returns the key evicted to make room, if any.
    pub fn put(&mut self, key: CacheKey, value: V) -> Option<CacheKey> {
        let entry = CacheEntry {
            value,
            inserted_at: self.clock.now(),
        };
        match self.entries.push(key.clone(), entry) {
            Some((evicted, _)) if evicted != key => Some(evicted),
            _ => None,
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<V: Clone> Default for SearchCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache shared by every resolver in the process.
pub type SharedSearchCache = Arc<Mutex<SearchCache<Vec<Substance>>>>;

static SEARCH_CACHE: OnceLock<SharedSearchCache> = OnceLock::new();

/// The process-wide autocomplete cache.
pub fn shared_search_cache() -> SharedSearchCache {
    SEARCH_CACHE
        .get_or_init(|| Arc::new(Mutex::new(SearchCache::new())))
        .clone()
}

/// A fresh cache not shared with the rest of the process.
pub fn isolated_search_cache(capacity: usize, ttl: Duration) -> SharedSearchCache {
    Arc::new(Mutex::new(SearchCache::with_clock(capacity, ttl, Arc::new(SystemClock))))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clock that only moves when told to.
    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Instant::now()),
            })
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    fn key(q: &str) -> CacheKey {
        CacheKey::new(None, q)
    }

    #[test]
    fn test_key_normalizes_query() {
        assert_eq!(CacheKey::new(None, "  WarF "), key("warf"));
        assert_ne!(
            CacheKey::new(Some(SubstanceType::Drug), "warf"),
            CacheKey::new(Some(SubstanceType::Supplement), "warf")
        );
    }

    #[test]
    fn test_ttl_expiry() {
        let clock = ManualClock::new();
        let mut cache = SearchCache::with_clock(10, DEFAULT_TTL, clock.clone());
        cache.put(key("warf"), vec![1]);

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get(&key("warf")), Some(vec![1]));

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.get(&key("warf")), None);
        assert!(!cache.contains(&key("warf")));
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let clock = ManualClock::new();
        let mut cache = SearchCache::with_clock(10, DEFAULT_TTL, clock);
        for i in 0..10 {
            assert_eq!(cache.put(key(&format!("q{i}")), i), None);
        }

        // Touch the oldest so q1 becomes least recently used
        assert_eq!(cache.get(&key("q0")), Some(0));

        let evicted = cache.put(key("q10"), 10);
        assert_eq!(evicted, Some(key("q1")));
        assert_eq!(cache.len(), 10);
        assert!(cache.contains(&key("q0")));
        assert!(cache.contains(&key("q10")));
        assert!(!cache.contains(&key("q1")));
    }

    #[test]
    fn test_replacing_existing_key_does_not_evict() {
        let clock = ManualClock::new();
        let mut cache = SearchCache::with_clock(2, DEFAULT_TTL, clock);
        cache.put(key("a"), 1);
        cache.put(key("b"), 2);
        assert_eq!(cache.put(key("a"), 3), None);
        assert_eq!(cache.get(&key("a")), Some(3));
        assert_eq!(cache.get(&key("b")), Some(2));
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut cache: SearchCache<u8> = SearchCache::with_clock(0, DEFAULT_TTL, Arc::new(SystemClock));
        cache.put(key("a"), 1);
        assert_eq!(cache.put(key("b"), 2), Some(key("a")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_shared_cache_is_singleton() {
        let a = shared_search_cache();
        let b = shared_search_cache();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
