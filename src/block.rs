//! Blocks: contiguous sub-ranges of the allocator domain
//!
//! A [`Span`] is a plain closed interval. A [`Block`] is the bookkeeping unit the
//! allocator stores in its arena; it carries the span plus its cached length.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A closed interval `[start, end]` of domain indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: u64,
    pub end: u64,
}

impl Span {
    /// Span of `length` indices beginning at `start`
    ///
    /// Returns `None` for an empty span or when the last index overflows.
    pub fn from_length(start: u64, length: u64) -> Option<Self> {
        let last = length.checked_sub(1)?;
        let end = start.checked_add(last)?;
        Some(Span { start, end })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Check if this span contains an index
    pub fn contains(&self, index: u64) -> bool {
        index >= self.start && index <= self.end
    }

    /// Check if this span directly precedes or follows another
    pub fn is_adjacent(&self, other: &Span) -> bool {
        self.end.checked_add(1) == Some(other.start) || other.end.checked_add(1) == Some(self.start)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// A free or allocated block tracked by the allocator
///
/// `length` always equals `end - start + 1`; it is stored because the range
/// index is keyed on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub start: u64,
    pub end: u64,
    pub length: u64,
}

impl Block {
    pub fn new(span: Span) -> Self {
        Block {
            start: span.start,
            end: span.end,
            length: span.len(),
        }
    }

    pub fn span(&self) -> Span {
        Span {
            start: self.start,
            end: self.end,
        }
    }

    /// Cut the block down to its first `length` indices
    ///
    /// Returns the span of the remainder, if any.
    pub fn truncate(&mut self, length: u64) -> Option<Span> {
        debug_assert!(length > 0 && length <= self.length);
        let tail = (length < self.length).then(|| Span {
            start: self.start + length,
            end: self.end,
        });
        self.end = self.start + (length - 1);
        self.length = length;
        tail
    }

    /// Grow the block leftwards so that it starts at `start`
    pub fn extend_front(&mut self, start: u64) {
        debug_assert!(start <= self.start);
        self.length += self.start - start;
        self.start = start;
    }

    /// Grow the block rightwards so that it ends at `end`
    pub fn extend_back(&mut self, end: u64) {
        debug_assert!(end >= self.end);
        self.length += end - self.end;
        self.end = end;
    }
}
