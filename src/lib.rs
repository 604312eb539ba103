//! # range-indexer - Best-Fit Contiguous Range Allocator
//!
//! `range-indexer` hands out contiguous sub-ranges of a fixed integer domain
//! (device IDs, file offsets, VLAN blocks, ...) and takes them back, merging
//! adjacent free ranges as they are released.
//!
//! ## Quick Start
//!
//! ```rust
//! use range_indexer::{RangeAllocator, Result};
//!
//! # fn main() -> Result<()> {
//! let mut indexer = RangeAllocator::create(1, 100)?;
//!
//! let a = indexer.alloc(1)?;
//! let b = indexer.alloc(2)?;
//! assert_eq!((a, b), (1, 2));
//!
//! indexer.dealloc(a)?;
//! assert_eq!(indexer.alloc(1)?, 1);
//!
//! indexer.dealloc(1)?;
//! indexer.dealloc(2)?;
//! assert_eq!(indexer.free_block_count(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## How It Works
//!
//! ```text
//!   domain 1..=100 after alloc(1), alloc(2), dealloc(1):
//!
//!   ┌──────┬───────┬─────────────────────┐
//!   │  1   │ 2..=3 │       4..=100       │
//!   │ free │ alloc │        free         │
//!   └──────┴───────┴─────────────────────┘
//!
//!   free_by_start  { 1 -> [1..=1], 4 -> [4..=100] }
//!   free_by_end    { 1 -> [1..=1], 100 -> [4..=100] }
//!   free_by_range  { 1 -> [1..=1], 97 -> [4..=100] }
//!   allocated      { 2 -> [2..=3] }
//! ```
//!
//! - **alloc** takes the smallest free block that fits (successor search on
//!   `free_by_range`), carves the request off its front and re-files the rest.
//! - **dealloc** looks up the free block ending right before and the one
//!   starting right after the released range and merges with either or both.
//!
//! Equal-length free blocks are served most-recently-freed first.
//!
//! ## Crate Structure
//!
//! ```text
//!   range_indexer
//!   ├── allocator    - RangeAllocator (create / alloc / dealloc)
//!   ├── arena        - Block storage behind stable handles
//!   ├── block        - Block and Span types
//!   ├── config       - TOML configuration and scripted runs
//!   ├── diagnostics  - Read-only scans, snapshots, tracing output
//!   ├── error        - IndexerError
//!   └── index        - Ordered indices (unique-key and length multiset)
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded**: wrap the whole allocator in one lock if it must be shared
//! - **In-memory only**: nothing is persisted

pub mod allocator;
mod arena;
pub mod block;
pub mod config;
pub mod diagnostics;
pub mod error;
mod index;

pub use allocator::{MergeCase, RangeAllocator};
pub use block::{Block, Span};
pub use config::{AllocatorConfig, Outcome, Script, ScriptRun, Step, StepReport};
pub use diagnostics::{IndexKind, IndexVisitor, RangeChain, Snapshot, TraceVisitor};
pub use error::{IndexerError, Result};
