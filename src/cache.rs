//! A small keyed cache with per-entry time-to-live.
//!
//! Queries are cheap enough to recompute, but the dashboard re-fires the
//! same filter selection constantly; a short TTL absorbs that without any
//! invalidation protocol. The cache is injected by the caller — the
//! metrics functions themselves never see it, so they stay pure.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<V> {
    inserted_at: Instant,
    value: V,
}

/// Thread-safe map from query key to cached value, expiring by TTL only.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TtlCache<K, V> {
    pub fn new() -> Self {
        TtlCache {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    /// Returns the cached value for `key` if it is younger than `ttl`,
    /// otherwise runs `producer`, stores the result, and returns it.
    pub fn get_or_compute<F>(&self, key: K, ttl: Duration, producer: F) -> V
    where
        F: FnOnce() -> V,
    {
        let mut entries = self.entries.lock().expect("cache lock poisoned");

        if let Some(entry) = entries.get(&key) {
            if entry.inserted_at.elapsed() < ttl {
                return entry.value.clone();
            }
        }

        let value = producer();
        entries.insert(
            key,
            Entry {
                inserted_at: Instant::now(),
                value: value.clone(),
            },
        );
        value
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
