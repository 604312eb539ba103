//! Block arena addressed by stable handles
//!
//! Every index stores [`BlockId`]s rather than blocks, so the same block can be
//! reachable from several indices without any aliasing. Retired slots are
//! recycled.

use crate::block::Block;
use crate::error::{IndexerError, Result};
use std::fmt;

/// Stable handle to a block slot in a [`BlockArena`]
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlockArena {
    slots: Vec<Option<Block>>,
    vacant: Vec<BlockId>,
    live: usize,
}

impl BlockArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an empty slot without storing anything in it yet
    ///
    /// This is the only fallible step of adding a block. Callers reserve before
    /// touching any index so that a failure leaves them unchanged.
    pub fn reserve(&mut self) -> Result<BlockId> {
        if let Some(id) = self.vacant.pop() {
            return Ok(id);
        }
        let raw = u32::try_from(self.slots.len()).map_err(|_| IndexerError::OutOfMemory)?;
        self.slots
            .try_reserve(1)
            .map_err(|_| IndexerError::OutOfMemory)?;
        self.slots.push(None);
        Ok(BlockId(raw))
    }

    /// Store a block in a slot obtained from [`reserve`](Self::reserve)
    pub fn fill(&mut self, id: BlockId, block: Block) {
        let slot = &mut self.slots[id.index()];
        assert!(slot.is_none(), "arena slot {id} is already occupied");
        *slot = Some(block);
        self.live += 1;
    }

    pub fn insert(&mut self, block: Block) -> Result<BlockId> {
        let id = self.reserve()?;
        self.fill(id, block);
        Ok(id)
    }

    /// Retire a block, returning its final state
    pub fn remove(&mut self, id: BlockId) -> Block {
        match self.slots.get_mut(id.index()).and_then(Option::take) {
            Some(block) => {
                self.live -= 1;
                self.vacant.push(id);
                block
            }
            None => panic!("arena slot {id} is not live"),
        }
    }

    pub fn get(&self, id: BlockId) -> &Block {
        match self.slots.get(id.index()).and_then(Option::as_ref) {
            Some(block) => block,
            None => panic!("arena slot {id} is not live"),
        }
    }

    pub fn get_mut(&mut self, id: BlockId) -> &mut Block {
        match self.slots.get_mut(id.index()).and_then(Option::as_mut) {
            Some(block) => block,
            None => panic!("arena slot {id} is not live"),
        }
    }

    /// Number of live blocks
    pub fn len(&self) -> usize {
        self.live
    }
}
