//! Capacity-bounded memoization of expensive per-key computations

use std::{
    borrow::Borrow,
    collections::{HashMap, VecDeque},
    hash::Hash,
    num::NonZeroUsize,
};

/// Key-value cache holding at most a fixed number of entries
///
/// When full, the oldest inserted entry is evicted first. Eviction order does
/// not matter to callers, who must be able to recompute any evicted value.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    /// Maximal number of entries
    capacity: NonZeroUsize,

    /// Cached values
    entries: HashMap<K, V>,

    /// Keys in insertion order, oldest first
    insertion_order: VecDeque<K>,
}
//
impl<K: Clone + Eq + Hash, V> BoundedCache<K, V> {
    /// Set up an empty cache
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity.get()),
            insertion_order: VecDeque::with_capacity(capacity.get()),
        }
    }

    /// Look up a previously cached value
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.get(key)
    }

    /// Record a value, evicting the oldest entry if the cache is full
    pub fn insert(&mut self, key: K, value: V) {
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = value;
            return;
        }
        if self.entries.len() >= self.capacity.get() {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.insertion_order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_exceeds_capacity() {
        let mut cache = BoundedCache::new(NonZeroUsize::new(2).unwrap());
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(&2));
        assert_eq!(cache.get("c"), Some(&3));
    }

    #[test]
    fn reinsertion_updates_in_place() {
        let mut cache = BoundedCache::new(NonZeroUsize::new(2).unwrap());
        cache.insert("a", 1);
        cache.insert("a", 10);
        cache.insert("b", 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(&10));
    }
}
