//! The external block handle.
//!
//! A [`MemoryBlock`] names a block without pointing at it. Every access
//! re-resolves the handle through the owning pool's handle table, so a
//! released block, a block from a previous pool generation, or a block
//! from another pool is rejected instead of followed.

use std::fmt;

use crate::id::{BlockId, PoolId};

/// Opaque, freely copyable handle to a block owned by a pool.
///
/// Carries the pool generation it was minted in, the block identifier,
/// and the slot generation at issue time. Holds no pointer, so copying
/// or sending a handle across threads is always memory-safe; staleness
/// is a resolve-time check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct MemoryBlock {
    pub(crate) pool: PoolId,
    pub(crate) id: BlockId,
    pub(crate) generation: u32,
}

impl MemoryBlock {
    /// Sentinel returned by logging façades when allocation fails.
    ///
    /// Never resolves in any pool.
    pub const INVALID: Self = Self {
        pool: PoolId::NONE,
        id: BlockId::NONE,
        generation: 0,
    };

    /// Assemble a handle. Only allocators should mint handles.
    pub fn new(pool: PoolId, id: BlockId, generation: u32) -> Self {
        Self {
            pool,
            id,
            generation,
        }
    }

    /// The pool generation this handle was issued by.
    pub fn pool(&self) -> PoolId {
        self.pool
    }

    /// The block identifier within the issuing handle table.
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Slot generation at issue time.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Whether this is the [`MemoryBlock::INVALID`] sentinel.
    ///
    /// A handle that is not the sentinel may still be stale; only the
    /// owning pool can tell.
    pub fn is_invalid(&self) -> bool {
        self.pool.is_none() || self.id.is_none()
    }
}

impl Default for MemoryBlock {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for MemoryBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MemoryBlock(pool={}, id={}, gen={})",
            self.pool, self.id, self.generation
        )
    }
}
