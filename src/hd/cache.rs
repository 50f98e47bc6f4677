//! Bounded derivation cache with O(1) FIFO eviction.
//!
//! Child-key derivation runs an HMAC plus an elliptic-curve tweak per step;
//! wallets re-derive the same handful of children constantly, so derived
//! children are cached keyed by (key-version prefix, compressed public key,
//! child index). Entries are immutable once inserted and the cache is purely
//! an optimization: a hit must be bit-identical to recomputation.
//!
//! Uses a VecDeque to track insertion order for constant-time removal of the
//! oldest entries at capacity.

use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Key identifying one derivation: which parent (by version prefix and
/// compressed public key) and which child index was requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub version: u32,
    pub public_key: [u8; 33],
    pub index: u32,
}

/// Bounded FIFO cache of derived children.
#[derive(Debug)]
pub struct DerivationCache<T> {
    entries: HashMap<CacheKey, T>,
    insertion_order: VecDeque<CacheKey>,
    max_entries: usize,
}

impl<T: Clone> DerivationCache<T> {
    /// Default capacity: 500 derived children, matching typical gap-limit
    /// scanning patterns.
    pub fn new() -> Self {
        Self::with_capacity(500)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            max_entries,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<T> {
        self.entries.get(key).cloned()
    }

    /// Insert a derived child. Existing entries are never overwritten:
    /// derivation is deterministic, so a duplicate insert carries the same
    /// value and the first one wins.
    pub fn insert(&mut self, key: CacheKey, value: T) {
        if self.entries.contains_key(&key) {
            return;
        }

        if self.entries.len() >= self.max_entries {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.entries.remove(&oldest);
                debug!("Evicted oldest derivation cache entry");
            }
        }

        self.entries.insert(key.clone(), value);
        self.insertion_order.push_back(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all entries (useful for testing or wallet lock).
    pub fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
        debug!("Derivation cache cleared");
    }
}

impl<T: Clone> Default for DerivationCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(index: u32) -> CacheKey {
        CacheKey {
            version: 0x0488_b21e,
            public_key: [2u8; 33],
            index,
        }
    }

    #[test]
    fn test_hit_returns_inserted_value() {
        let mut cache = DerivationCache::with_capacity(4);
        cache.insert(key(0), "child-0");
        assert_eq!(cache.get(&key(0)), Some("child-0"));
        assert_eq!(cache.get(&key(1)), None);
    }

    #[test]
    fn test_entries_immutable_once_inserted() {
        let mut cache = DerivationCache::with_capacity(4);
        cache.insert(key(0), "first");
        cache.insert(key(0), "second");
        assert_eq!(cache.get(&key(0)), Some("first"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_fifo_eviction_at_capacity() {
        let mut cache = DerivationCache::with_capacity(3);
        for i in 0..5 {
            cache.insert(key(i), i);
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&key(0)), None);
        assert_eq!(cache.get(&key(1)), None);
        assert_eq!(cache.get(&key(4)), Some(4));
    }

    #[test]
    fn test_clear() {
        let mut cache = DerivationCache::with_capacity(3);
        cache.insert(key(0), 0);
        cache.clear();
        assert!(cache.is_empty());
    }
}
