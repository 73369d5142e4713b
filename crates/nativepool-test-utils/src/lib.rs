//! Test utilities and mock allocators for nativepool development.
//!
//! Provides a model implementation of [`BlockAllocator`]
//! ([`MockAllocator`]), invariant checks over a live [`MemoryPool`],
//! and the pool configurations used across tests and benches. Churn
//! generators and fault-injecting wrappers live in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::HashMap;

use nativepool_arena::{BlockRange, MemoryPool, PoolConfig};
use nativepool_core::{BlockAllocator, BlockId, MemoryBlock, PoolError, PoolId, StaleReason};

/// Config for the reference scenario: 1024 bytes, thresholds
/// `{16, 64, 256, 1024}`.
pub fn scenario_config() -> PoolConfig {
    PoolConfig::new(1024).with_bucket_count(4)
}

/// Small pool that grows quickly, for growth and staleness tests.
pub fn tiny_config() -> PoolConfig {
    PoolConfig::new(256).with_bucket_count(3)
}

/// Build a pool from `config`, panicking on invalid configuration.
pub fn pool_from(config: PoolConfig) -> MemoryPool {
    match MemoryPool::new(config) {
        Ok(pool) => pool,
        Err(e) => panic!("test config rejected: {e}"),
    }
}

/// Check that the ranges of every live block are pairwise disjoint and
/// lie within the pool's capacity. Returns the checked ranges.
pub fn assert_no_overlap(pool: &MemoryPool) -> Vec<BlockRange> {
    let mut ranges: Vec<BlockRange> = pool.live_blocks().map(|(_, r)| r).collect();
    ranges.sort_by_key(|r| r.offset);
    for r in &ranges {
        assert!(
            r.end() <= pool.capacity(),
            "block {r:?} exceeds capacity {}",
            pool.capacity()
        );
    }
    for pair in ranges.windows(2) {
        assert!(
            pair[0].end() <= pair[1].offset,
            "blocks overlap: {:?} and {:?}",
            pair[0],
            pair[1]
        );
    }
    ranges
}

/// Run [`MemoryPool::verify`] and panic with its message on failure.
pub fn assert_consistent(pool: &MemoryPool) {
    if let Err(violation) = pool.verify() {
        panic!("pool invariant violated: {violation}");
    }
}

/// Model allocator: tracks live handles in a `HashMap` and never fails
/// except on zero-length or stale input.
///
/// Mirrors the handle semantics of [`MemoryPool`] without any arena,
/// so tests can compare outcomes of the same operation sequence.
pub struct MockAllocator {
    pool: PoolId,
    next_id: u64,
    live: HashMap<BlockId, usize>,
}

impl MockAllocator {
    pub fn new() -> Self {
        Self {
            pool: PoolId::next(),
            next_id: 1,
            live: HashMap::new(),
        }
    }

    /// Number of live handles.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Requested length of a live handle.
    pub fn len_of(&self, block: MemoryBlock) -> Option<usize> {
        self.live.get(&block.id()).copied()
    }
}

impl Default for MockAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockAllocator for MockAllocator {
    fn allocate(&mut self, len: usize) -> Result<MemoryBlock, PoolError> {
        if len == 0 {
            return Err(PoolError::InvalidRequest { requested: 0 });
        }
        let id = BlockId(self.next_id);
        self.next_id += 1;
        self.live.insert(id, len);
        Ok(MemoryBlock::new(self.pool, id, 0))
    }

    fn release(&mut self, block: MemoryBlock) -> Result<(), PoolError> {
        let reason = if block.is_invalid() {
            StaleReason::Invalid
        } else if block.pool() != self.pool {
            StaleReason::WrongPool
        } else if self.live.remove(&block.id()).is_some() {
            return Ok(());
        } else {
            StaleReason::UnknownId
        };
        Err(PoolError::StaleOrUnknownHandle { block, reason })
    }

    fn is_live(&self, block: MemoryBlock) -> bool {
        block.pool() == self.pool && self.live.contains_key(&block.id())
    }
}
