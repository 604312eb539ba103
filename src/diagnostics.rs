//! Read-only views of allocator state
//!
//! [`RangeAllocator::scan`] walks all four indices and hands each block to an
//! [`IndexVisitor`]. Two visitors ship with the crate: the one behind
//! [`RangeAllocator::snapshot`], and [`TraceVisitor`], which logs every block.

use crate::allocator::RangeAllocator;
use crate::block::{Block, Span};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Which of the four indices a visited block came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexKind {
    AllocatedByStart,
    FreeByStart,
    FreeByEnd,
    FreeByRange,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexKind::AllocatedByStart => "allocated-by-start",
            IndexKind::FreeByStart => "free-by-start",
            IndexKind::FreeByEnd => "free-by-end",
            IndexKind::FreeByRange => "free-by-range",
        };
        f.write_str(name)
    }
}

/// Observer for [`RangeAllocator::scan`]
pub trait IndexVisitor {
    /// Called once per index entry
    ///
    /// `chain_position` is the block's place in its length bucket for
    /// [`IndexKind::FreeByRange`] (0 = representative) and 0 otherwise.
    fn visit(&mut self, index: IndexKind, block: &Block, chain_position: usize);
}

/// Free blocks sharing one length, representative first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeChain {
    pub length: u64,
    pub blocks: Vec<Span>,
}

/// Point-in-time copy of all four indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub domain: Span,
    pub allocated_by_start: Vec<Span>,
    pub free_by_start: Vec<Span>,
    pub free_by_end: Vec<Span>,
    pub free_by_range: Vec<RangeChain>,
}

impl Snapshot {
    fn empty(domain: Span) -> Self {
        Snapshot {
            domain,
            allocated_by_start: Vec::new(),
            free_by_start: Vec::new(),
            free_by_end: Vec::new(),
            free_by_range: Vec::new(),
        }
    }

    /// Free blocks in start order
    pub fn free_spans(&self) -> &[Span] {
        &self.free_by_start
    }

    pub fn allocated_spans(&self) -> &[Span] {
        &self.allocated_by_start
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl IndexVisitor for Snapshot {
    fn visit(&mut self, index: IndexKind, block: &Block, chain_position: usize) {
        let span = block.span();
        match index {
            IndexKind::AllocatedByStart => self.allocated_by_start.push(span),
            IndexKind::FreeByStart => self.free_by_start.push(span),
            IndexKind::FreeByEnd => self.free_by_end.push(span),
            IndexKind::FreeByRange => match self.free_by_range.last_mut() {
                Some(chain) if chain_position > 0 => chain.blocks.push(span),
                _ => self.free_by_range.push(RangeChain {
                    length: block.length,
                    blocks: vec![span],
                }),
            },
        }
    }
}

fn write_spans(f: &mut fmt::Formatter<'_>, label: &str, spans: &[Span]) -> fmt::Result {
    write!(f, "  {label}:")?;
    if spans.is_empty() {
        write!(f, " (none)")?;
    }
    for span in spans {
        write!(f, " {span}")?;
    }
    writeln!(f)
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "domain {} ({} indices)", self.domain, self.domain.len())?;
        write_spans(f, "allocated by start", &self.allocated_by_start)?;
        write_spans(f, "free by start", &self.free_by_start)?;
        write_spans(f, "free by end", &self.free_by_end)?;
        write!(f, "  free by range:")?;
        if self.free_by_range.is_empty() {
            write!(f, " (none)")?;
        }
        writeln!(f)?;
        for chain in &self.free_by_range {
            write!(f, "    {}:", chain.length)?;
            for (position, span) in chain.blocks.iter().enumerate() {
                if position > 0 {
                    write!(f, " ->")?;
                }
                write!(f, " {span}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Logs every visited block at `info` level
#[derive(Debug, Default)]
pub struct TraceVisitor {
    visited: usize,
}

impl TraceVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> usize {
        self.visited
    }
}

impl IndexVisitor for TraceVisitor {
    fn visit(&mut self, index: IndexKind, block: &Block, chain_position: usize) {
        self.visited += 1;
        info!(
            %index,
            start = block.start,
            end = block.end,
            length = block.length,
            chain_position,
            "block"
        );
    }
}

impl RangeAllocator {
    /// Copy the current contents of all four indices
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::empty(self.domain());
        self.scan(&mut snapshot);
        snapshot
    }

    /// Log every block in every index
    pub fn trace_state(&self) {
        info!(
            domain = %self.domain(),
            free = self.free_len(),
            allocated = self.allocated_len(),
            "allocator state"
        );
        self.scan(&mut TraceVisitor::new());
    }
}
