//! Ordered indices over block handles
//!
//! The allocator keeps four of these in lock-step:
//! - [`OrderedIndex`] keyed by start: allocated blocks
//! - [`OrderedIndex`] keyed by start: free blocks
//! - [`OrderedIndex`] keyed by end: free blocks
//! - [`range::RangeIndex`] keyed by length: free blocks, several per key

pub mod range;

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Unique-key ordered map with predecessor lookup
///
/// `BTreeMap` provides the ordering and O(log n) operations; this wrapper pins
/// down the no-duplicate insert semantics the allocator relies on.
#[derive(Debug, Clone)]
pub struct OrderedIndex<K, V> {
    entries: BTreeMap<K, V>,
}

impl<K: Ord + Copy, V: Copy> OrderedIndex<K, V> {
    pub fn new() -> Self {
        OrderedIndex {
            entries: BTreeMap::new(),
        }
    }

    /// Insert `value` under `key`
    ///
    /// Returns `false` and leaves the index unchanged if `key` is already present.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    pub fn remove(&mut self, key: K) -> Option<V> {
        self.entries.remove(&key)
    }

    pub fn lookup(&self, key: K) -> Option<V> {
        self.entries.get(&key).copied()
    }

    /// Entry with the largest key that is `<= key`
    pub fn locate_le(&self, key: K) -> Option<(K, V)> {
        self.entries.range(..=key).next_back().map(|(k, v)| (*k, *v))
    }

    /// In-order traversal
    pub fn iter(&self) -> impl Iterator<Item = (K, V)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<K: Ord + Copy, V: Copy> Default for OrderedIndex<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
