//! Per-entry TTL cache used by the three resolver tiers.
//!
//! Expiry is lazy: [`TtlCache::get`] treats a stale entry as absent without
//! removing it, and removal only happens opportunistically on a later
//! [`TtlCache::set`] once the map has grown past a watermark. There is no
//! eviction policy beyond the TTL; key cardinality is bounded by the daily
//! active INN/user population, so an unbounded map is acceptable.
//!
//! Stale entries are deliberately kept readable via [`TtlCache::get_stale`]:
//! the enum-map tier reuses an expired mapping as a fallback when a fresh
//! fetch fails.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Number of live entries above which `set` sweeps out expired ones.
const SWEEP_WATERMARK: usize = 1024;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A thread-safe key/value store where every entry carries its own deadline.
///
/// Each tier constructs its own instance with [`TtlCache::new`], so tests can
/// build isolated caches with arbitrary TTLs instead of sharing process-wide
/// singletons.
///
/// Reads and writes are O(1) under a single mutex; contention is low because
/// the resolver touches each cache a handful of times per request. Races
/// between concurrent requests are benign: cached values are idempotent
/// derivations of the same upstream state, so last-writer-wins.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Creates an empty cache whose entries live for `ttl` after insertion.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the live value for `key`, or `None` when absent or expired.
    ///
    /// An expired entry is left in place; see [`TtlCache::get_stale`].
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    /// Returns the value for `key` even when its TTL has elapsed.
    ///
    /// Used by the enum-map tier to serve the last known mapping when a
    /// refresh fails. Returns `None` only when the key was never stored (or
    /// was swept).
    pub fn get_stale(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock();
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Stores `value` under `key`, resetting its deadline to now + TTL.
    ///
    /// When the map has grown past the sweep watermark, expired entries are
    /// dropped first.
    pub fn set(&self, key: K, value: V) {
        let expires_at = Instant::now() + self.ttl;
        let mut entries = self.entries.lock();
        if entries.len() >= SWEEP_WATERMARK {
            let now = Instant::now();
            entries.retain(|_, entry| entry.expires_at > now);
        }
        entries.insert(key, Entry { value, expires_at });
    }

    /// Number of stored entries, live and expired alike.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when no entries are stored at all.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
