//! Fixed-size-block pool backing expression nodes.
//!
//! Every block holds exactly one `T`. Vacant blocks are threaded into an
//! intrusive free list, so `allocate` and `deallocate` are O(1) apart from
//! the amortized cost of growing the backing storage by a whole chunk.
//! The live-block counter is exact and is the leak oracle used by tests.

use thiserror::Error;

/// Number of blocks reserved at once when the pool runs out of free blocks.
pub const DEFAULT_BLOCKS_PER_CHUNK: usize = 1024;

/// Pool errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The configured block limit was reached
    #[error("Pool exhausted: all {limit} blocks are in use")]
    Exhausted {
        /// Configured limit
        limit: usize,
    },

    /// The handle does not refer to a live block
    #[error("Block {0} is not allocated")]
    InvalidBlock(u32),
}

/// Handle to one block of a [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    /// Raw slot index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
enum Slot<T> {
    Occupied(T),
    Vacant { next_free: Option<u32> },
}

/// Fixed-size-block pool.
#[derive(Debug)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    in_use: usize,
    blocks_per_chunk: usize,
    block_limit: Option<usize>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Pool<T> {
    /// Create an unbounded pool.
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_BLOCKS_PER_CHUNK)
    }

    /// Create an unbounded pool that grows by `blocks_per_chunk` blocks.
    pub fn with_chunk_size(blocks_per_chunk: usize) -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            in_use: 0,
            blocks_per_chunk: blocks_per_chunk.max(1),
            block_limit: None,
        }
    }

    /// Create a pool that refuses to hand out more than `limit` live blocks.
    pub fn with_block_limit(limit: usize) -> Self {
        let mut pool = Self::with_chunk_size(DEFAULT_BLOCKS_PER_CHUNK.min(limit.max(1)));
        pool.block_limit = Some(limit);
        pool
    }

    /// Store `value` in a free block.
    pub fn allocate(&mut self, value: T) -> Result<BlockId, PoolError> {
        if let Some(limit) = self.block_limit {
            if self.in_use >= limit {
                return Err(PoolError::Exhausted { limit });
            }
        }

        let id = match self.free_head {
            Some(head) => {
                let next = match &self.slots[head as usize] {
                    Slot::Vacant { next_free } => *next_free,
                    Slot::Occupied(_) => None,
                };
                self.free_head = next;
                self.slots[head as usize] = Slot::Occupied(value);
                head
            }
            None => {
                if self.slots.len() == self.slots.capacity() {
                    self.slots.reserve_exact(self.blocks_per_chunk);
                }
                self.slots.push(Slot::Occupied(value));
                (self.slots.len() - 1) as u32
            }
        };

        self.in_use += 1;
        Ok(BlockId(id))
    }

    /// Return a block to the pool, handing back its contents.
    pub fn deallocate(&mut self, id: BlockId) -> Result<T, PoolError> {
        let slot = self
            .slots
            .get_mut(id.index())
            .ok_or(PoolError::InvalidBlock(id.0))?;
        if matches!(slot, Slot::Vacant { .. }) {
            return Err(PoolError::InvalidBlock(id.0));
        }

        let old = std::mem::replace(
            slot,
            Slot::Vacant {
                next_free: self.free_head,
            },
        );
        self.free_head = Some(id.0);
        self.in_use -= 1;

        match old {
            Slot::Occupied(value) => Ok(value),
            Slot::Vacant { .. } => Err(PoolError::InvalidBlock(id.0)),
        }
    }

    /// Number of live blocks.
    #[inline]
    pub fn blocks_in_use(&self) -> usize {
        self.in_use
    }

    /// Number of blocks ever carved out of the backing storage.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&T> {
        match self.slots.get(id.index()) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    #[inline]
    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut T> {
        match self.slots.get_mut(id.index()) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }
}

impl<T> std::ops::Index<BlockId> for Pool<T> {
    type Output = T;

    fn index(&self, id: BlockId) -> &T {
        match self.get(id) {
            Some(value) => value,
            None => panic!("{}", PoolError::InvalidBlock(id.0)),
        }
    }
}

impl<T> std::ops::IndexMut<BlockId> for Pool<T> {
    fn index_mut(&mut self, id: BlockId) -> &mut T {
        match self.slots.get_mut(id.index()) {
            Some(Slot::Occupied(value)) => value,
            _ => panic!("{}", PoolError::InvalidBlock(id.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_deallocate_counts() {
        let mut pool = Pool::new();
        let a = pool.allocate(1.0).unwrap();
        let b = pool.allocate(2.0).unwrap();
        assert_eq!(pool.blocks_in_use(), 2);
        assert_eq!(pool[a], 1.0);
        assert_eq!(pool[b], 2.0);

        assert_eq!(pool.deallocate(a).unwrap(), 1.0);
        assert_eq!(pool.blocks_in_use(), 1);
        assert_eq!(pool.deallocate(b).unwrap(), 2.0);
        assert_eq!(pool.blocks_in_use(), 0);
    }

    #[test]
    fn test_free_blocks_are_reused() {
        let mut pool = Pool::with_chunk_size(4);
        let ids: Vec<_> = (0..4).map(|i| pool.allocate(i).unwrap()).collect();
        pool.deallocate(ids[2]).unwrap();
        let reused = pool.allocate(42).unwrap();
        assert_eq!(reused, ids[2]);
        assert_eq!(pool.capacity(), 4);
    }

    #[test]
    fn test_double_free_is_rejected() {
        let mut pool = Pool::new();
        let a = pool.allocate("x").unwrap();
        pool.deallocate(a).unwrap();
        assert_eq!(pool.deallocate(a), Err(PoolError::InvalidBlock(a.0)));
        assert_eq!(pool.blocks_in_use(), 0);
    }

    #[test]
    fn test_block_limit() {
        let mut pool = Pool::with_block_limit(2);
        pool.allocate(0u8).unwrap();
        let b = pool.allocate(1u8).unwrap();
        assert!(matches!(pool.allocate(2u8), Err(PoolError::Exhausted { limit: 2 })));
        pool.deallocate(b).unwrap();
        assert!(pool.allocate(3u8).is_ok());
    }
}
