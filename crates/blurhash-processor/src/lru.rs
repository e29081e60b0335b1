//! Bounded least-recently-used map.
//!
//! An `IndexMap` keeps entries in recency order: the front is the least
//! recently used entry and the back the most recent. Not synchronized; the
//! processor guards it with its state lock.

use std::hash::Hash;

use indexmap::IndexMap;

#[derive(Debug)]
pub(crate) struct LruCache<K, V> {
    entries: IndexMap<K, V>,
    capacity: usize,
}

impl<K: Hash + Eq, V> LruCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: IndexMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Look up `key` and mark it most recently used.
    pub(crate) fn get(&mut self, key: &K) -> Option<&V> {
        let idx = self.entries.get_index_of(key)?;
        let last = self.entries.len() - 1;
        self.entries.move_index(idx, last);
        self.entries.get_index(last).map(|(_, v)| v)
    }

    /// Whether `key` is present. Does not touch its recency.
    pub(crate) fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace `key` as the most recent entry, evicting from the
    /// front while the cache is full. Returns how many entries were evicted.
    pub(crate) fn insert(&mut self, key: K, value: V) -> usize {
        if let Some(idx) = self.entries.get_index_of(&key) {
            let last = self.entries.len() - 1;
            self.entries.move_index(idx, last);
            if let Some((_, slot)) = self.entries.get_index_mut(last) {
                *slot = value;
            }
            return 0;
        }

        let mut evicted = 0;
        while self.entries.len() >= self.capacity {
            if self.entries.shift_remove_index(0).is_none() {
                break;
            }
            evicted += 1;
        }
        self.entries.insert(key, value);
        evicted
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}
