//! Query caches owned by provider adapters.
//!
//! Each adapter holds its own [`QueryCache`] so analyses stay hermetic: dropping or
//! clearing the adapter's cache is the only way results are shared or forgotten.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use crate::model::LonLat;

/// Bit-exact key identifying a coordinate ring.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RingKey(Vec<(u64, u64)>);

impl RingKey {
    /// Key for the given ring.
    #[must_use]
    pub fn new(ring: &[LonLat]) -> Self {
        Self(
            ring.iter()
                .map(|pos| (pos.lon.to_bits(), pos.lat.to_bits()))
                .collect(),
        )
    }
}

/// Small bounded map from query keys to provider answers.
#[derive(Debug)]
pub struct QueryCache<K, V> {
    entries: Mutex<HashMap<K, V>>,
    capacity: usize,
}

impl<K: Eq + Hash, V: Clone> QueryCache<K, V> {
    /// Create a cache holding at most `capacity` entries. A capacity of zero disables it.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Cached answer for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Store an answer. When full, the cache is emptied before inserting.
    pub fn insert(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            log::debug!("Query cache full ({} entries), clearing", entries.len());
            entries.clear();
        }
        entries.insert(key, value);
    }

    /// Forget the answer for `key`. Returns whether one was stored.
    pub fn invalidate(&self, key: &K) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Forget every answer.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of cached answers.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_invalidates() {
        let cache = QueryCache::new(4);
        let key = RingKey::new(&[LonLat::new(1.0, 2.0), LonLat::new(3.0, 4.0)]);
        cache.insert(key.clone(), 42_u32);
        assert_eq!(cache.get(&key), Some(42));
        assert!(cache.invalidate(&key));
        assert_eq!(cache.get(&key), None);
        assert!(!cache.invalidate(&key));
    }

    #[test]
    fn clears_when_full() {
        let cache = QueryCache::new(2);
        cache.insert(1_u8, "a");
        cache.insert(2_u8, "b");
        cache.insert(3_u8, "c");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&3), Some("c"));
    }

    #[test]
    fn zero_capacity_disables() {
        let cache = QueryCache::new(0);
        cache.insert("key", 1_i32);
        assert!(cache.is_empty());
    }

    #[test]
    fn ring_keys_distinguish_coordinates() {
        let first = RingKey::new(&[LonLat::new(1.0, 2.0)]);
        let second = RingKey::new(&[LonLat::new(2.0, 1.0)]);
        assert_ne!(first, second);
    }
}
