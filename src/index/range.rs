//! Length-keyed multiset of free blocks
//!
//! Free blocks routinely share a length, so each key maps to a bucket of
//! handles. The last handle in a bucket is its representative: new blocks are
//! pushed on top and best-fit selection pops from the top, giving LIFO order
//! among equal lengths.

use crate::arena::BlockId;
use std::collections::BTreeMap;

/// Handles of one bucket, representative first
pub type Chain<'a> = std::iter::Copied<std::iter::Rev<std::slice::Iter<'a, BlockId>>>;

#[derive(Debug, Clone, Default)]
pub struct RangeIndex {
    buckets: BTreeMap<u64, Vec<BlockId>>,
    blocks: usize,
}

impl RangeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a block under `length`, making it the representative
    pub fn push(&mut self, length: u64, id: BlockId) {
        self.buckets.entry(length).or_default().push(id);
        self.blocks += 1;
    }

    /// Remove and return the representative of the smallest length `>= min_length`
    pub fn pop_best(&mut self, min_length: u64) -> Option<(u64, BlockId)> {
        let (&length, bucket) = self.buckets.range_mut(min_length..).next()?;
        let id = bucket.pop()?;
        if bucket.is_empty() {
            self.buckets.remove(&length);
        }
        self.blocks -= 1;
        Some((length, id))
    }

    /// Representative of the smallest length `>= min_length`, without removing it
    pub fn locate_ge(&self, min_length: u64) -> Option<(u64, BlockId)> {
        self.buckets
            .range(min_length..)
            .find_map(|(&length, bucket)| bucket.last().map(|&id| (length, id)))
    }

    /// Splice one specific block out of the bucket for `length`
    ///
    /// The remaining handles keep their relative order. Returns `false` if the
    /// block is not registered under that length.
    pub fn detach(&mut self, length: u64, id: BlockId) -> bool {
        let Some(bucket) = self.buckets.get_mut(&length) else {
            return false;
        };
        let Some(position) = bucket.iter().rposition(|&candidate| candidate == id) else {
            return false;
        };
        bucket.remove(position);
        if bucket.is_empty() {
            self.buckets.remove(&length);
        }
        self.blocks -= 1;
        true
    }

    pub fn contains(&self, length: u64, id: BlockId) -> bool {
        self.buckets
            .get(&length)
            .is_some_and(|bucket| bucket.contains(&id))
    }

    /// Longest registered length
    pub fn largest(&self) -> Option<u64> {
        self.buckets.keys().next_back().copied()
    }

    /// Buckets in length order, each listed from representative down the chain
    pub fn chains(&self) -> impl Iterator<Item = (u64, Chain<'_>)> + '_ {
        self.buckets
            .iter()
            .map(|(&length, bucket)| (length, bucket.iter().rev().copied()))
    }

    /// Number of registered blocks across all lengths
    pub fn len(&self) -> usize {
        self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::BlockArena;
    use crate::block::{Block, Span};

    fn ids(count: usize) -> Vec<BlockId> {
        let mut arena = BlockArena::new();
        (0..count)
            .map(|i| {
                let start = i as u64 + 1;
                arena.insert(Block::new(Span { start, end: start })).unwrap()
            })
            .collect()
    }

    fn representative(index: &RangeIndex, length: u64) -> Option<BlockId> {
        index
            .chains()
            .find(|(key, _)| *key == length)
            .and_then(|(_, mut chain)| chain.next())
    }

    #[test]
    fn test_pop_best_picks_smallest_sufficient() {
        let id = ids(4);
        let mut index = RangeIndex::new();
        index.push(3, id[0]);
        index.push(5, id[1]);
        index.push(10, id[2]);

        assert_eq!(index.pop_best(4), Some((5, id[1])));
        assert_eq!(index.pop_best(4), Some((10, id[2])));
        assert_eq!(index.pop_best(4), None);
        assert_eq!(index.pop_best(1), Some((3, id[0])));
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_equal_lengths_are_lifo() {
        let id = ids(3);
        let mut index = RangeIndex::new();
        index.push(5, id[0]);
        index.push(5, id[1]);
        index.push(5, id[2]);

        assert_eq!(representative(&index, 5), Some(id[2]));
        assert_eq!(index.chains().count(), 1);
        assert_eq!(index.len(), 3);

        let chain: Vec<BlockId> = index.chains().flat_map(|(_, chain)| chain).collect();
        assert_eq!(chain, vec![id[2], id[1], id[0]]);

        assert_eq!(index.pop_best(5), Some((5, id[2])));
        assert_eq!(index.pop_best(5), Some((5, id[1])));
    }

    #[test]
    fn test_detach_exact_block() {
        let id = ids(3);
        let mut index = RangeIndex::new();
        index.push(5, id[0]);
        index.push(5, id[1]);
        index.push(5, id[2]);

        // Splicing out the middle of the chain keeps the representative
        assert!(index.detach(5, id[1]));
        assert_eq!(representative(&index, 5), Some(id[2]));
        assert!(!index.contains(5, id[1]));

        // Splicing out the representative promotes the next one
        assert!(index.detach(5, id[2]));
        assert_eq!(representative(&index, 5), Some(id[0]));

        assert!(!index.detach(5, id[1]));
        assert!(!index.detach(6, id[0]));

        assert!(index.detach(5, id[0]));
        assert_eq!(representative(&index, 5), None);
        assert_eq!(index.chains().count(), 0);
    }

    #[test]
    fn test_locate_ge_and_largest() {
        let id = ids(2);
        let mut index = RangeIndex::new();
        assert_eq!(index.largest(), None);

        index.push(2, id[0]);
        index.push(8, id[1]);
        assert_eq!(index.locate_ge(3), Some((8, id[1])));
        assert!(index.contains(2, id[0]));
        assert_eq!(index.largest(), Some(8));
        assert_eq!(index.len(), 2);
    }
}
