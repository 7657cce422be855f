//! TTL-bounded cache of body parse results, one instance per body format.
//!
//! Entries are keyed by [`CacheKey`], expire `ttl` after they were stored and are
//! evicted strictly in insertion order once the cache is full: reading an entry
//! does not protect it from eviction. Bodies longer than `max_body_size` are
//! never looked up nor stored.
//!
//! Expired entries are dropped lazily when a lookup runs into them, and in bulk
//! by [`BodyParseCache::cleanup`], which the [`CleanupScheduler`](crate::cleanup::CleanupScheduler)
//! calls periodically through the [`Sweep`] trait.

use crate::clock::{Clock, SystemClock};
use crate::config::BodyCacheConfig;
use crate::key::CacheKey;
use crate::utils::hit_rate;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

#[derive(Debug)]
pub struct BodyParseCache<V> {
    name: &'static str,
    ttl: Duration,
    max_entries: usize,
    max_body_size: usize,
    clock: Arc<dyn Clock>,
    inner: Mutex<CacheState<V>>,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
    // position marker, matches the queue slot that inserted this entry
    seq: u64,
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<CacheKey, Entry<V>>,
    // insertion order, may hold stale slots for keys removed by expiry
    order: VecDeque<(u64, CacheKey)>,
    next_seq: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<V> CacheState<V> {
    fn new() -> Self {
        Self { entries: HashMap::new(), order: VecDeque::new(), next_seq: 0, hits: 0, misses: 0, evictions: 0 }
    }

    fn evict_oldest(&mut self) -> Option<CacheKey> {
        while let Some((seq, key)) = self.order.pop_front() {
            if self.entries.get(&key).is_some_and(|entry| entry.seq == seq) {
                self.entries.remove(&key);
                return Some(key);
            }
        }
        None
    }

    fn compact_order(&mut self) {
        let entries = &self.entries;
        self.order.retain(|(seq, key)| entries.get(key).is_some_and(|entry| entry.seq == *seq));
    }
}

/// A snapshot of one cache's counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub hit_rate: f64,
}

impl<V: Clone> BodyParseCache<V> {
    pub fn new(name: &'static str, config: &BodyCacheConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    pub fn with_clock(name: &'static str, config: &BodyCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            ttl: config.ttl,
            max_entries: config.max_entries,
            max_body_size: config.max_body_size,
            clock,
            inner: Mutex::new(CacheState::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    fn cacheable(&self, body: &[u8]) -> bool {
        body.len() <= self.max_body_size
    }

    /// Returns the value stored for `body`, if present and not yet expired.
    pub fn get(&self, body: &[u8]) -> Option<V> {
        if !self.cacheable(body) {
            self.inner.lock().misses += 1;
            return None;
        }

        let key = CacheKey::derive(body);
        let now = self.clock.now();

        let mut guard = self.inner.lock();
        let state = &mut *guard;
        match state.entries.get(&key) {
            Some(entry) if entry.expires_at > now => {
                state.hits += 1;
                Some(entry.value.clone())
            }
            Some(_) => {
                state.entries.remove(&key);
                state.misses += 1;
                trace!(cache = self.name, ?key, "dropped expired entry on lookup");
                None
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Stores `value` for `body` until `ttl` from now.
    ///
    /// Oversized bodies are ignored. When the cache is full the oldest inserted
    /// entry is evicted first. Storing a body that is already cached replaces its
    /// value and expiry but keeps its place in the eviction order.
    pub fn set(&self, body: &[u8], value: V) {
        if !self.cacheable(body) {
            return;
        }

        let key = CacheKey::derive(body);
        let expires_at = self.clock.now() + self.ttl;

        let mut state = self.inner.lock();
        if let Some(entry) = state.entries.get_mut(&key) {
            entry.value = value;
            entry.expires_at = expires_at;
            return;
        }

        if state.entries.len() >= self.max_entries
            && let Some(evicted) = state.evict_oldest()
        {
            state.evictions += 1;
            debug!(cache = self.name, key = ?evicted, "evicted oldest entry");
        }

        // a zero sized cache stores nothing
        if state.entries.len() >= self.max_entries {
            return;
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.order.push_back((seq, key.clone()));
        state.entries.insert(key, Entry { value, expires_at, seq });

        if state.order.len() > self.max_entries.saturating_mul(2) {
            state.compact_order();
        }
    }

    /// Removes every expired entry, returning how many were dropped.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.inner.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - state.entries.len();
        if removed > 0 {
            state.compact_order();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.inner.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            size: state.entries.len(),
            hit_rate: hit_rate(state.hits, state.misses),
        }
    }

    /// Drops every entry and resets the counters.
    pub fn clear(&self) {
        *self.inner.lock() = CacheState::new();
    }
}

/// A cache whose expired entries can be swept in the background.
pub trait Sweep: Send + Sync {
    fn name(&self) -> &'static str;

    /// Removes expired entries and returns how many were removed.
    fn cleanup(&self) -> usize;
}

impl<V: Clone + Send> Sweep for BodyParseCache<V> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn cleanup(&self) -> usize {
        BodyParseCache::cleanup(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::thread;

    const TTL: Duration = Duration::from_secs(60);

    fn cache(max_entries: usize, max_body_size: usize) -> (BodyParseCache<u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = BodyCacheConfig { ttl: TTL, max_entries, max_body_size };
        let cache = BodyParseCache::with_clock("test", &config, Arc::clone(&clock) as Arc<dyn Clock>);
        (cache, clock)
    }

    fn body(i: usize) -> Vec<u8> {
        format!(r#"{{"id":{i}}}"#).into_bytes()
    }

    #[test]
    fn set_then_get_round_trips() {
        let (cache, _) = cache(10, 1024);
        cache.set(b"{}", 7);
        assert_eq!(cache.get(b"{}"), Some(7));

        let large = vec![b'a'; 1024];
        cache.set(&large, 8);
        assert_eq!(cache.get(&large), Some(8));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (2, 0));
    }

    #[test]
    fn unknown_body_is_a_miss() {
        let (cache, _) = cache(10, 1024);
        assert_eq!(cache.get(b"{}"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let (cache, clock) = cache(10, 1024);
        cache.set(b"{}", 1);

        clock.advance(TTL - Duration::from_millis(1));
        assert_eq!(cache.get(b"{}"), Some(1));

        clock.advance(Duration::from_millis(2));
        assert_eq!(cache.get(b"{}"), None);
        assert_eq!(cache.len(), 0);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn oversized_body_is_never_cached() {
        let (cache, _) = cache(10, 16);
        let oversized = vec![b'x'; 17];
        for _ in 0..3 {
            cache.set(&oversized, 1);
            assert_eq!(cache.get(&oversized), None);
        }
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 3);

        let exact = vec![b'x'; 16];
        cache.set(&exact, 2);
        assert_eq!(cache.get(&exact), Some(2));
    }

    #[test]
    fn eviction_is_insertion_ordered() {
        let (cache, _) = cache(3, 1024);
        for i in 0..3 {
            cache.set(&body(i), u32::try_from(i).unwrap());
        }

        // reading the oldest entry must not save it
        assert_eq!(cache.get(&body(0)), Some(0));

        cache.set(&body(3), 3);
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&body(0)), None);
        for i in 1..=3 {
            assert_eq!(cache.get(&body(i)), Some(u32::try_from(i).unwrap()));
        }
    }

    #[test]
    fn overwrite_keeps_position_and_does_not_evict() {
        let (cache, _) = cache(2, 1024);
        cache.set(&body(0), 0);
        cache.set(&body(1), 1);
        cache.set(&body(0), 10);
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.get(&body(0)), Some(10));

        cache.set(&body(2), 2);
        assert_eq!(cache.get(&body(0)), None);
        assert_eq!(cache.get(&body(1)), Some(1));
    }

    #[test]
    fn reinserted_key_takes_new_position() {
        let (cache, clock) = cache(2, 1024);
        cache.set(&body(0), 0);
        clock.advance(TTL);
        assert_eq!(cache.get(&body(0)), None);

        cache.set(&body(1), 1);
        cache.set(&body(0), 0);
        cache.set(&body(2), 2);

        // body(1) is now the oldest, the stale slot of body(0) is skipped
        assert_eq!(cache.get(&body(1)), None);
        assert_eq!(cache.get(&body(0)), Some(0));
        assert_eq!(cache.get(&body(2)), Some(2));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn cleanup_removes_only_expired() {
        let (cache, clock) = cache(10, 1024);
        cache.set(&body(0), 0);
        cache.set(&body(1), 1);
        clock.advance(TTL / 2);
        cache.set(&body(2), 2);
        clock.advance(TTL / 2);

        assert_eq!(cache.cleanup(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&body(2)), Some(2));
        assert_eq!(cache.cleanup(), 0);
    }

    #[test]
    fn hit_rate_is_zero_without_lookups() {
        let (cache, _) = cache(10, 1024);
        cache.set(b"{}", 1);
        let stats = cache.stats();
        assert!(stats.hit_rate.abs() < f64::EPSILON);
        assert!(!stats.hit_rate.is_nan());
    }

    #[test]
    fn clear_empties_everything() {
        let (cache, _) = cache(1, 1024);
        cache.set(&body(0), 0);
        cache.set(&body(1), 1);
        cache.get(&body(1));

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats { hits: 0, misses: 0, evictions: 0, size: 0, hit_rate: 0.0 });
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let (cache, _) = cache(0, 1024);
        cache.set(b"{}", 1);
        assert_eq!(cache.get(b"{}"), None);
    }

    #[test]
    fn bounded_under_concurrent_writers() {
        let (cache, _) = cache(32, 1024);
        let cache = Arc::new(cache);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..200 {
                        let body = body(t * 1000 + i);
                        cache.set(&body, 1);
                        cache.get(&body);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = cache.stats();
        assert_eq!(stats.size, 32);
        assert_eq!(stats.evictions, 4 * 200 - 32);
        assert_eq!(stats.hits + stats.misses, 4 * 200);
    }
}
