//! Best-fit contiguous range allocator
//!
//! The allocator manages a fixed closed domain `[start, start + length - 1]`
//! and hands out contiguous sub-ranges. Four indices are kept in lock-step:
//!
//! ```text
//!   allocated_by_start   start  -> allocated block
//!   free_by_start        start  -> free block      ┐
//!   free_by_end          end    -> free block      ├ same set of free blocks
//!   free_by_range        length -> [free blocks]   ┘ (LIFO per length)
//! ```
//!
//! Blocks live in a [`BlockArena`]; indices only hold handles. Allocation is
//! best-fit by length. Deallocation eagerly coalesces with free neighbours so
//! that no two free blocks are ever adjacent between calls.

use crate::arena::{BlockArena, BlockId};
use crate::block::{Block, Span};
use crate::diagnostics::{IndexKind, IndexVisitor};
use crate::error::{IndexerError, Result};
use crate::index::range::RangeIndex;
use crate::index::OrderedIndex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

/// How a deallocated block was folded back into the free set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeCase {
    /// No free neighbour; the block is free on its own
    Standalone,
    /// Folded into the free block that follows it
    Next,
    /// Folded into the free block that precedes it
    Prev,
    /// Bridged the free blocks on both sides
    Both,
}

/// Best-fit range allocator over a fixed integer domain
///
/// Keeps allocated and free blocks in four ordered indices, enabling:
/// - Best-fit allocation by length, most recently freed first on ties
/// - Eager coalescing of a released range with its free neighbours
/// - Neighbour lookup by start and by end index
#[derive(Debug, Clone)]
pub struct RangeAllocator {
    domain: Span,
    arena: BlockArena,
    allocated_by_start: OrderedIndex<u64, BlockId>,
    free_by_start: OrderedIndex<u64, BlockId>,
    free_by_end: OrderedIndex<u64, BlockId>,
    free_by_range: RangeIndex,
    free_len: u64,
}

impl RangeAllocator {
    /// Create an allocator over `[start, start + length - 1]`
    ///
    /// The whole domain starts out as a single free block.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `start` or `length` is zero, or the domain would
    ///   run past `u64::MAX`
    /// - `OutOfMemory` if the initial block cannot be stored
    pub fn create(start: u64, length: u64) -> Result<Self> {
        if start == 0 || length == 0 {
            warn!(start, length, "rejecting allocator domain");
            return Err(IndexerError::InvalidArgument(format!(
                "start and length must be positive (start={start}, length={length})"
            )));
        }
        let domain = Span::from_length(start, length).ok_or_else(|| {
            IndexerError::InvalidArgument(format!(
                "domain of {length} indices starting at {start} overflows"
            ))
        })?;

        let mut allocator = RangeAllocator {
            domain,
            arena: BlockArena::new(),
            allocated_by_start: OrderedIndex::new(),
            free_by_start: OrderedIndex::new(),
            free_by_end: OrderedIndex::new(),
            free_by_range: RangeIndex::new(),
            free_len: length,
        };
        let id = allocator.arena.insert(Block::new(domain))?;
        allocator.register_free(id);

        debug!(start = domain.start, end = domain.end, "created range allocator");
        Ok(allocator)
    }

    /// Allocate `length` contiguous indices, returning the first one
    ///
    /// Picks the free block with the smallest sufficient length. Among blocks
    /// of equal length the most recently freed one wins. The allocation is
    /// carved from the front of that block and the remainder stays free.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `length` is zero
    /// - `InsufficientSpace` if no single free block is long enough
    /// - `OutOfMemory` if the remainder block cannot be stored; nothing is
    ///   modified in that case
    pub fn alloc(&mut self, length: u64) -> Result<u64> {
        if length == 0 {
            warn!("rejecting zero-length allocation");
            return Err(IndexerError::InvalidArgument(
                "allocation length must be positive".to_string(),
            ));
        }

        let Some((found, _)) = self.free_by_range.locate_ge(length) else {
            let largest_free = self.largest_free().unwrap_or(0);
            warn!(requested = length, largest_free, "no contiguous free range large enough");
            return Err(IndexerError::InsufficientSpace {
                requested: length,
                largest_free,
            });
        };

        // Last fallible step; the indices are untouched until it succeeds.
        let tail_slot = if found > length {
            Some(self.arena.reserve()?)
        } else {
            None
        };

        let Some((_, id)) = self.free_by_range.pop_best(length) else {
            desync("free-by-range lost its best fit between lookup and removal");
        };
        let block = *self.arena.get(id);
        self.unlink_free_edges(id, &block);

        let tail = self.arena.get_mut(id).truncate(length);
        match (tail, tail_slot) {
            (Some(span), Some(slot)) => {
                self.arena.fill(slot, Block::new(span));
                self.register_free(slot);
            }
            (None, None) => {}
            _ => desync("remainder does not match the reserved slot"),
        }

        if !self.allocated_by_start.insert(block.start, id) {
            desync(&format!("start {} is already allocated", block.start));
        }
        self.free_len -= length;

        debug!(start = block.start, length, from = found, "allocated range");
        Ok(block.start)
    }

    /// Release the allocation that begins at `start`
    ///
    /// The freed range is merged with any free neighbour on either side.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `start` is zero
    /// - `NotFound` if no allocation begins at `start`
    ///
    /// Both leave the allocator unchanged.
    pub fn dealloc(&mut self, start: u64) -> Result<MergeCase> {
        if start == 0 {
            warn!("rejecting dealloc of index 0");
            return Err(IndexerError::InvalidArgument(
                "dealloc start must be positive".to_string(),
            ));
        }

        let Some(id) = self.allocated_by_start.remove(start) else {
            warn!(start, "no allocated range starts here");
            return Err(IndexerError::NotFound(start));
        };
        let block = *self.arena.get(id);

        let next = block
            .end
            .checked_add(1)
            .and_then(|after| self.free_by_start.lookup(after));
        if next.is_none() {
            trace!(index = block.end.wrapping_add(1), "no free block follows");
        }
        let prev = block
            .start
            .checked_sub(1)
            .and_then(|before| self.free_by_end.lookup(before));
        if prev.is_none() {
            trace!(index = block.start.wrapping_sub(1), "no free block precedes");
        }

        let case = match (prev, next) {
            (None, None) => {
                self.register_free(id);
                MergeCase::Standalone
            }
            (None, Some(next)) => {
                self.merge_into_next(id, next);
                MergeCase::Next
            }
            (Some(prev), None) => {
                self.merge_into_prev(id, prev, false);
                MergeCase::Prev
            }
            (Some(prev), Some(next)) => {
                let merged = self.merge_into_next(id, next);
                self.merge_into_prev(merged, prev, true);
                MergeCase::Both
            }
        };
        self.free_len += block.length;

        debug!(start, length = block.length, ?case, "deallocated range");
        Ok(case)
    }

    /// Fold the just-released `block_id` into the free block right after it
    fn merge_into_next(&mut self, block_id: BlockId, next_id: BlockId) -> BlockId {
        let block = self.arena.remove(block_id);
        let next = *self.arena.get(next_id);

        if self.free_by_start.remove(next.start) != Some(next_id) {
            desync(&format!("free-by-start does not hold {}", next.span()));
        }
        self.detach_from_range(next_id);

        self.arena.get_mut(next_id).extend_front(block.start);
        if !self.free_by_start.insert(block.start, next_id) {
            desync(&format!("free-by-start already holds start {}", block.start));
        }
        let length = self.arena.get(next_id).length;
        self.free_by_range.push(length, next_id);
        next_id
    }

    /// Fold `right_id` into the free block right before it
    ///
    /// `right_is_free` marks a right-hand block that is already registered as
    /// free (the result of a preceding next-merge) and must be unlinked first.
    fn merge_into_prev(&mut self, right_id: BlockId, prev_id: BlockId, right_is_free: bool) {
        let prev = *self.arena.get(prev_id);
        if self.free_by_end.remove(prev.end) != Some(prev_id) {
            desync(&format!("free-by-end does not hold {}", prev.span()));
        }

        if right_is_free {
            let right = *self.arena.get(right_id);
            self.unlink_free_edges(right_id, &right);
            self.detach_from_range(right_id);
        }
        let right = self.arena.remove(right_id);
        self.detach_from_range(prev_id);

        self.arena.get_mut(prev_id).extend_back(right.end);
        if !self.free_by_end.insert(right.end, prev_id) {
            desync(&format!("free-by-end already holds end {}", right.end));
        }
        let length = self.arena.get(prev_id).length;
        self.free_by_range.push(length, prev_id);
    }

    /// Add a block to all three free indices
    fn register_free(&mut self, id: BlockId) {
        let block = *self.arena.get(id);
        if !self.free_by_start.insert(block.start, id) {
            desync(&format!("free-by-start already holds start {}", block.start));
        }
        if !self.free_by_end.insert(block.end, id) {
            desync(&format!("free-by-end already holds end {}", block.end));
        }
        self.free_by_range.push(block.length, id);
    }

    /// Remove a free block from the start and end indices
    fn unlink_free_edges(&mut self, id: BlockId, block: &Block) {
        if self.free_by_start.remove(block.start) != Some(id) {
            desync(&format!("free-by-start does not hold {}", block.span()));
        }
        if self.free_by_end.remove(block.end) != Some(id) {
            desync(&format!("free-by-end does not hold {}", block.span()));
        }
    }

    /// Splice exactly this block out of its length bucket
    fn detach_from_range(&mut self, id: BlockId) {
        let block = *self.arena.get(id);
        if !self.free_by_range.detach(block.length, id) {
            desync(&format!(
                "free-by-range has no entry for {} under length {}",
                block.span(),
                block.length
            ));
        }
    }

    /// The managed domain
    pub fn domain(&self) -> Span {
        self.domain
    }

    pub fn total_len(&self) -> u64 {
        self.domain.len()
    }

    /// Number of free indices across all free blocks
    pub fn free_len(&self) -> u64 {
        self.free_len
    }

    pub fn allocated_len(&self) -> u64 {
        self.total_len() - self.free_len
    }

    /// Number of free blocks (fragmentation indicator)
    pub fn free_block_count(&self) -> usize {
        self.free_by_start.len()
    }

    pub fn allocation_count(&self) -> usize {
        self.allocated_by_start.len()
    }

    /// Length of the longest free block, if anything is free
    pub fn largest_free(&self) -> Option<u64> {
        self.free_by_range.largest()
    }

    /// Fragmentation score (0.0 = all free space contiguous)
    ///
    /// Worst case, every free index its own block, approaches 1.0.
    pub fn fragmentation_score(&self) -> f64 {
        if self.free_len == 0 {
            return 0.0;
        }
        let blocks = self.free_block_count();
        if blocks == 0 {
            return 0.0;
        }
        (blocks as f64 - 1.0) / (self.free_len as f64).max(1.0)
    }

    /// Span of the allocation beginning at `start`
    pub fn allocation(&self, start: u64) -> Option<Span> {
        self.allocated_by_start
            .lookup(start)
            .map(|id| self.arena.get(id).span())
    }

    /// Check if a single index is covered by an allocation
    pub fn is_allocated(&self, index: u64) -> bool {
        self.allocated_by_start
            .locate_le(index)
            .is_some_and(|(_, id)| self.arena.get(id).span().contains(index))
    }

    /// Free blocks in start order
    pub fn free_spans(&self) -> impl Iterator<Item = Span> + '_ {
        self.free_by_start
            .iter()
            .map(|(_, id)| self.arena.get(id).span())
    }

    /// Allocated blocks in start order
    pub fn allocated_spans(&self) -> impl Iterator<Item = Span> + '_ {
        self.allocated_by_start
            .iter()
            .map(|(_, id)| self.arena.get(id).span())
    }

    /// Visit every block in every index without modifying anything
    ///
    /// Indices are visited allocated-by-start, free-by-start, free-by-end,
    /// free-by-range, each in key order. Range buckets are walked from the
    /// representative down the chain.
    pub fn scan<V: IndexVisitor + ?Sized>(&self, visitor: &mut V) {
        for (_, id) in self.allocated_by_start.iter() {
            visitor.visit(IndexKind::AllocatedByStart, self.arena.get(id), 0);
        }
        for (_, id) in self.free_by_start.iter() {
            visitor.visit(IndexKind::FreeByStart, self.arena.get(id), 0);
        }
        for (_, id) in self.free_by_end.iter() {
            visitor.visit(IndexKind::FreeByEnd, self.arena.get(id), 0);
        }
        for (_, chain) in self.free_by_range.chains() {
            for (position, id) in chain.enumerate() {
                visitor.visit(IndexKind::FreeByRange, self.arena.get(id), position);
            }
        }
    }

    /// Verify that the four indices agree and partition the domain
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` describing the first inconsistency found.
    pub fn check_invariants(&self) -> Result<()> {
        let violation = |message: String| Err(IndexerError::InvariantViolation(message));

        let free_count = self.free_by_start.len();
        if self.free_by_end.len() != free_count || self.free_by_range.len() != free_count {
            return violation(format!(
                "free index sizes disagree: start={}, end={}, range={}",
                free_count,
                self.free_by_end.len(),
                self.free_by_range.len()
            ));
        }
        if self.arena.len() != free_count + self.allocated_by_start.len() {
            return violation(format!(
                "arena holds {} blocks but indices reference {}",
                self.arena.len(),
                free_count + self.allocated_by_start.len()
            ));
        }

        let mut spans = Vec::with_capacity(self.arena.len());
        let mut free_total = 0u64;
        for (key, id) in self.free_by_start.iter() {
            let block = self.arena.get(id);
            if block.start != key || block.length != block.span().len() {
                return violation(format!("free block {} is misfiled", block.span()));
            }
            if self.free_by_end.lookup(block.end) != Some(id) {
                return violation(format!("free block {} missing from free-by-end", block.span()));
            }
            if !self.free_by_range.contains(block.length, id) {
                return violation(format!(
                    "free block {} missing from free-by-range",
                    block.span()
                ));
            }
            free_total += block.length;
            spans.push((block.span(), true));
        }
        if free_total != self.free_len {
            return violation(format!(
                "free length counter is {} but free blocks cover {}",
                self.free_len, free_total
            ));
        }

        for (key, id) in self.allocated_by_start.iter() {
            let block = self.arena.get(id);
            if block.start != key || block.length != block.span().len() {
                return violation(format!("allocated block {} is misfiled", block.span()));
            }
            spans.push((block.span(), false));
        }

        spans.sort_unstable_by_key(|(span, _)| span.start);
        let mut expected = self.domain.start;
        let mut previous: Option<(Span, bool)> = None;
        for &(span, is_free) in &spans {
            if span.start != expected {
                return violation(format!(
                    "block {span} does not continue from index {expected}"
                ));
            }
            if let Some((before, before_free)) = previous {
                if is_free && before_free && before.is_adjacent(&span) {
                    return violation(format!("free blocks {before} and {span} are adjacent"));
                }
            }
            previous = Some((span, is_free));
            match span.end.checked_add(1) {
                Some(after) => expected = after,
                None => break,
            }
        }
        match previous {
            Some((last, _)) if last.end == self.domain.end => Ok(()),
            Some((last, _)) => violation(format!(
                "blocks stop at {} but the domain ends at {}",
                last.end, self.domain.end
            )),
            None => violation("no blocks cover the domain".to_string()),
        }
    }
}

/// The indices disagree with each other.
#[cold]
fn desync(detail: &str) -> ! {
    error!(detail, "range allocator indices are out of sync");
    panic!("range allocator indices are out of sync: {detail}");
}
