//! The allocation seam used by external components.

use crate::block::MemoryBlock;
use crate::error::PoolError;

/// A source of byte blocks addressed by [`MemoryBlock`] handles.
///
/// Buffer-backed caches and similar consumers depend on this trait
/// rather than on a concrete pool, treating the allocator as a black
/// box: lengths in, opaque handles out.
pub trait BlockAllocator {
    /// Allocate a block of at least `len` bytes.
    fn allocate(&mut self, len: usize) -> Result<MemoryBlock, PoolError>;

    /// Hand a block back for reuse.
    ///
    /// Releasing a stale or unknown handle returns
    /// [`PoolError::StaleOrUnknownHandle`] and leaves the allocator
    /// unchanged.
    fn release(&mut self, block: MemoryBlock) -> Result<(), PoolError>;

    /// Whether `block` currently resolves to a live allocation.
    fn is_live(&self, block: MemoryBlock) -> bool;
}
