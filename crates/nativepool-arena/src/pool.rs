//! The pool façade: allocation, release, resolution, and growth.
//!
//! [`MemoryPool`] ties one [`BlockArena`], its [`BucketIndex`], and a
//! [`HandleTable`] together under a single [`PoolId`]. Callers only
//! ever see [`MemoryBlock`] handles; every access re-resolves the
//! handle, so a released block or a block from before a resize is
//! reported as stale instead of aliasing recycled memory.
//!
//! # Growth
//!
//! When no free block fits a request the pool grows once, by
//! `growth_factor` steps until the request fits (capped at
//! `max_capacity`), and retries once. Growth is a rebuild: the byte
//! buffer is extended in place, the pool takes a fresh [`PoolId`], and
//! the arena restarts as a single free block. Every handle issued
//! before the growth stops resolving.

use std::ptr::NonNull;

use nativepool_core::{BlockAllocator, MemoryBlock, PoolError, PoolId, StaleReason};

use crate::affinity::OwnerThread;
use crate::arena::{BlockArena, BlockState, BlockView};
use crate::bucket::BucketIndex;
use crate::config::PoolConfig;
use crate::table::HandleTable;

/// Where a live block sits in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockRange {
    /// Byte offset from the start of the arena.
    pub offset: usize,
    /// Usable length in bytes; at least the requested length.
    pub len: usize,
    /// Threshold of the size class the block was served for.
    pub size_class: usize,
}

impl BlockRange {
    /// One past the last byte.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Point-in-time counters for a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStats {
    /// Current pool identity.
    pub pool: PoolId,
    /// Arena capacity in bytes.
    pub capacity: usize,
    /// Bytes in live blocks.
    pub used_bytes: usize,
    /// Bytes in free blocks.
    pub free_bytes: usize,
    /// Number of live handles.
    pub live_blocks: usize,
    /// Number of free blocks.
    pub free_blocks: usize,
    /// Length of the largest free block.
    pub largest_free: usize,
    /// Number of size classes.
    pub bucket_count: usize,
    /// Number of growth events since construction.
    pub growth_count: u32,
}

/// Bucketed, generation-checked arena allocator.
///
/// Thread-affine: every mutating call must come from the owning thread
/// (the creator, or whichever thread last called
/// [`MemoryPool::adopt_current_thread`]). A call from any other thread
/// panics. Share a pool across threads through
/// [`NativeMemoryPool`](crate::NativeMemoryPool).
#[derive(Debug)]
pub struct MemoryPool {
    id: PoolId,
    config: PoolConfig,
    arena: BlockArena,
    buckets: BucketIndex,
    table: HandleTable,
    owner: OwnerThread,
    growth_count: u32,
}

impl MemoryPool {
    /// Create a pool owned by the calling thread.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let mut buckets = BucketIndex::geometric(config.pool_size, config.initial_bucket_count);
        let arena = BlockArena::new(config.pool_size, &mut buckets);
        let id = PoolId::next();
        tracing::debug!(
            pool = %id,
            capacity = config.pool_size,
            buckets = buckets.bucket_count(),
            "created memory pool"
        );
        Ok(Self {
            id,
            config,
            arena,
            buckets,
            table: HandleTable::new(),
            owner: OwnerThread::current(),
            growth_count: 0,
        })
    }

    /// Create a pool of `pool_size` bytes with default settings otherwise.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidConfig`] if `pool_size` is zero or not a
    /// multiple of the default granularity.
    pub fn with_capacity(pool_size: u32) -> Result<Self, PoolError> {
        Self::new(PoolConfig::new(pool_size))
    }

    /// Current pool identity. Changes on every growth and clear.
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// The configuration the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Arena capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Size-class thresholds of the bucket index.
    pub fn thresholds(&self) -> &[u32] {
        self.buckets.thresholds()
    }

    /// Make the calling thread the owner.
    pub fn adopt_current_thread(&mut self) {
        self.owner.adopt_current();
    }

    /// Whether the calling thread owns the pool.
    pub fn is_owned_by_current_thread(&self) -> bool {
        self.owner.is_current()
    }

    /// Allocate a block of at least `len` bytes.
    ///
    /// The length is rounded up to the configured granularity. If no
    /// free block fits, the pool grows once and retries once.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidRequest`] if `len == 0`.
    /// - [`PoolError::AllocationFailure`] if the request still does not
    ///   fit after growth, or could never fit under `max_capacity`.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the owner.
    #[track_caller]
    pub fn try_get(&mut self, len: usize) -> Result<MemoryBlock, PoolError> {
        self.owner.assert_current("get");
        if len == 0 {
            return Err(PoolError::InvalidRequest { requested: 0 });
        }
        let Some(rounded) = self.config.round_request(len) else {
            return Err(PoolError::AllocationFailure {
                requested: len,
                capacity: self.capacity(),
            });
        };

        let block = match self.arena.carve(rounded, &mut self.buckets) {
            Ok(block) => block,
            Err(PoolError::OutOfSpace { .. }) => {
                self.grow_to_fit(rounded);
                match self.arena.carve(rounded, &mut self.buckets) {
                    Ok(block) => block,
                    Err(PoolError::OutOfSpace { .. }) => {
                        return Err(PoolError::AllocationFailure {
                            requested: rounded as usize,
                            capacity: self.capacity(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        };

        let (id, generation) = self.table.issue(block);
        Ok(MemoryBlock::new(self.id, id, generation))
    }

    /// Allocate a block, returning [`MemoryBlock::INVALID`] on failure.
    ///
    /// Failures are logged at `warn` level. See [`MemoryPool::try_get`].
    #[track_caller]
    pub fn get(&mut self, len: usize) -> MemoryBlock {
        match self.try_get(len) {
            Ok(block) => block,
            Err(error) => {
                tracing::warn!(pool = %self.id, requested = len, %error, "allocation failed");
                MemoryBlock::INVALID
            }
        }
    }

    /// Hand a block back to the pool.
    ///
    /// The handle is retired first, so a stale or repeated release
    /// leaves the pool untouched.
    ///
    /// # Errors
    ///
    /// [`PoolError::StaleOrUnknownHandle`] if `block` does not name a
    /// live allocation of this pool.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the owner.
    #[track_caller]
    pub fn try_reserve(&mut self, block: MemoryBlock) -> Result<(), PoolError> {
        self.owner.assert_current("reserve");
        let block_ref = self.table.retire(&block, self.id)?;
        let released = self.arena.release(block_ref, &mut self.buckets);
        debug_assert!(released.is_some(), "live handle {block} named a free block");
        Ok(())
    }

    /// Hand a block back, logging and ignoring stale handles.
    ///
    /// See [`MemoryPool::try_reserve`].
    #[track_caller]
    pub fn reserve(&mut self, block: MemoryBlock) {
        if let Err(error) = self.try_reserve(block) {
            tracing::warn!(pool = %self.id, %block, %error, "ignored release of stale block");
        }
    }

    /// Whether `block` names a live allocation of this pool.
    pub fn is_live(&self, block: MemoryBlock) -> bool {
        self.resolve_view(&block).is_ok()
    }

    fn resolve_view(&self, block: &MemoryBlock) -> Result<BlockView, PoolError> {
        let block_ref = self.table.resolve(block, self.id)?;
        self.arena
            .block(block_ref)
            .filter(|view| view.state == BlockState::InUse)
            .ok_or(PoolError::StaleOrUnknownHandle {
                block: *block,
                reason: StaleReason::UnknownId,
            })
    }

    fn range_of(&self, view: &BlockView) -> BlockRange {
        let class = self.buckets.class_for_request(view.len);
        BlockRange {
            offset: view.offset as usize,
            len: view.len as usize,
            size_class: self.buckets.threshold(class) as usize,
        }
    }

    /// Locate a live block in the arena.
    ///
    /// # Errors
    ///
    /// [`PoolError::StaleOrUnknownHandle`] if `block` is not live here.
    pub fn resolve(&self, block: MemoryBlock) -> Result<BlockRange, PoolError> {
        self.resolve_view(&block).map(|view| self.range_of(&view))
    }

    /// Bytes of a live block, or `None` (logged at `debug`) if stale.
    pub fn data(&self, block: MemoryBlock) -> Option<&[u8]> {
        match self.resolve_view(&block) {
            Ok(view) => Some(self.arena.bytes(&view)),
            Err(error) => {
                tracing::debug!(pool = %self.id, %block, %error, "data access on stale block");
                None
            }
        }
    }

    /// Mutable bytes of a live block, or `None` (logged at `debug`) if stale.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the owner.
    #[track_caller]
    pub fn data_mut(&mut self, block: MemoryBlock) -> Option<&mut [u8]> {
        self.owner.assert_current("data_mut");
        match self.resolve_view(&block) {
            Ok(view) => Some(self.arena.bytes_mut(&view)),
            Err(error) => {
                tracing::debug!(pool = %self.id, %block, %error, "data access on stale block");
                None
            }
        }
    }

    /// Address of the first byte of a live block.
    ///
    /// The pointer is valid until the next call that grows, clears, or
    /// drops the pool. Prefer [`MemoryPool::data_mut`] unless the bytes
    /// must cross an FFI boundary.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the owner.
    #[track_caller]
    pub fn data_ptr(&mut self, block: MemoryBlock) -> Option<NonNull<u8>> {
        self.data_mut(block).map(|bytes| NonNull::from(bytes).cast::<u8>())
    }

    /// Grow by one `growth_factor` step.
    ///
    /// Returns the new capacity. Every outstanding handle is invalidated.
    ///
    /// # Errors
    ///
    /// [`PoolError::AllocationFailure`] if the pool is already at
    /// `max_capacity`.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the owner.
    #[track_caller]
    pub fn grow(&mut self) -> Result<usize, PoolError> {
        self.owner.assert_current("grow");
        let current = self.arena.capacity() as u32;
        match self.config.grown_capacity(current) {
            Some(next) => {
                self.rebuild(next);
                self.growth_count += 1;
                Ok(next as usize)
            }
            None => Err(PoolError::AllocationFailure {
                requested: current.saturating_mul(self.config.growth_factor) as usize,
                capacity: current as usize,
            }),
        }
    }

    /// One growth event large enough for a block of `len` bytes, if the
    /// ceiling allows. Leaves the pool unchanged at the ceiling.
    fn grow_to_fit(&mut self, len: u32) {
        let current = self.arena.capacity() as u32;
        let mut target = current;
        while target < len.max(current + 1) {
            match self.config.grown_capacity(target) {
                Some(next) => target = next,
                None => break,
            }
        }
        if target > current {
            self.rebuild(target);
            self.growth_count += 1;
        }
    }

    /// Release every block without resizing.
    ///
    /// The pool takes a fresh identity, so every outstanding handle is
    /// invalidated.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the owner.
    #[track_caller]
    pub fn clear(&mut self) {
        self.owner.assert_current("clear");
        let capacity = self.arena.capacity() as u32;
        self.rebuild(capacity);
    }

    fn rebuild(&mut self, capacity: u32) {
        let old_id = self.id;
        let old_capacity = self.arena.capacity();
        let invalidated = self.table.live_count();

        self.buckets = BucketIndex::geometric(capacity, self.config.initial_bucket_count);
        self.arena.reset(capacity, &mut self.buckets);
        self.table.clear();
        self.id = PoolId::next();

        tracing::debug!(
            old_pool = %old_id,
            pool = %self.id,
            old_capacity,
            capacity,
            invalidated,
            "rebuilt memory pool"
        );
    }

    /// Snapshot of the pool's counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            pool: self.id,
            capacity: self.arena.capacity(),
            used_bytes: self.arena.used_bytes(),
            free_bytes: self.arena.free_bytes(),
            live_blocks: self.table.live_count(),
            free_blocks: self.buckets.free_count(),
            largest_free: self.buckets.largest_free() as usize,
            bucket_count: self.buckets.bucket_count(),
            growth_count: self.growth_count,
        }
    }

    /// Iterate over every live handle and its range.
    pub fn live_blocks(&self) -> impl Iterator<Item = (MemoryBlock, BlockRange)> + '_ {
        self.table.iter_live().filter_map(move |(id, generation, block_ref)| {
            let view = self.arena.block(block_ref)?;
            Some((
                MemoryBlock::new(self.id, id, generation),
                self.range_of(&view),
            ))
        })
    }

    /// Check every structural invariant of the arena, buckets, and
    /// handle table. Returns a description of the first violation.
    pub fn verify(&self) -> Result<(), String> {
        self.arena.verify(&self.buckets)?;
        if self.table.live_count() != self.arena.in_use_count() {
            return Err(format!(
                "{} live handles but {} in-use blocks",
                self.table.live_count(),
                self.arena.in_use_count()
            ));
        }
        for (id, _, block_ref) in self.table.iter_live() {
            match self.arena.block(block_ref) {
                Some(view) if view.state == BlockState::InUse => {}
                _ => return Err(format!("handle {id} names {block_ref:?}, which is not in use")),
            }
        }
        Ok(())
    }
}

impl Drop for MemoryPool {
    fn drop(&mut self) {
        let live = self.table.live_count();
        if live > 0 {
            tracing::warn!(
                pool = %self.id,
                live,
                used_bytes = self.arena.used_bytes(),
                "memory pool dropped with live blocks"
            );
        }
    }
}

impl BlockAllocator for MemoryPool {
    fn allocate(&mut self, len: usize) -> Result<MemoryBlock, PoolError> {
        self.try_get(len)
    }

    fn release(&mut self, block: MemoryBlock) -> Result<(), PoolError> {
        self.try_reserve(block)
    }

    fn is_live(&self, block: MemoryBlock) -> bool {
        MemoryPool::is_live(self, block)
    }
}
