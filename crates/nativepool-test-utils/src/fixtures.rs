//! Reusable workload fixtures.
//!
//! - [`ChurnGenerator`]: deterministic get/reserve sequences from a seed.
//! - [`FailingAllocator`]: wraps an allocator and fails after N allocations.

use nativepool_core::{BlockAllocator, MemoryBlock, PoolError};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// One step of a churn workload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChurnOp {
    /// Allocate this many bytes.
    Get(usize),
    /// Release the live block at this position (modulo the live count).
    Reserve(usize),
}

/// Seeded generator of [`ChurnOp`] sequences.
///
/// The same seed always yields the same sequence, so benches and
/// failing tests are reproducible.
pub struct ChurnGenerator {
    rng: ChaCha8Rng,
    max_len: usize,
    /// Out of 100: chance that a step is a `Get`.
    get_percent: u32,
}

impl ChurnGenerator {
    /// Generator producing lengths in `1..=max_len`, half gets, half reserves.
    pub fn new(seed: u64, max_len: usize) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            max_len: max_len.max(1),
            get_percent: 50,
        }
    }

    /// Bias the mix towards allocation (`percent` of steps are gets).
    pub fn with_get_percent(mut self, percent: u32) -> Self {
        self.get_percent = percent.min(100);
        self
    }

    /// Next operation.
    pub fn next_op(&mut self) -> ChurnOp {
        if self.rng.next_u32() % 100 < self.get_percent {
            let len = (self.rng.next_u64() % self.max_len as u64) as usize + 1;
            ChurnOp::Get(len)
        } else {
            ChurnOp::Reserve(self.rng.next_u32() as usize)
        }
    }

    /// Collect `count` operations.
    pub fn take_ops(&mut self, count: usize) -> Vec<ChurnOp> {
        (0..count).map(|_| self.next_op()).collect()
    }
}

/// Replay `ops` against `allocator`, returning the blocks it still holds.
///
/// Reserve steps on an empty live set are skipped. A release may find
/// its handle stale when an earlier allocation rebuilt the pool; any
/// other release error is a bug in the allocator.
///
/// # Panics
///
/// Panics if a release fails for a reason other than a stale handle.
pub fn run_churn<A: BlockAllocator>(allocator: &mut A, ops: &[ChurnOp]) -> Vec<MemoryBlock> {
    let mut live = Vec::new();
    for op in ops {
        match *op {
            ChurnOp::Get(len) => {
                if let Ok(block) = allocator.allocate(len) {
                    live.push(block);
                }
            }
            ChurnOp::Reserve(i) => {
                if !live.is_empty() {
                    let block = live.swap_remove(i % live.len());
                    if let Err(e) = allocator.release(block) {
                        assert!(e.is_stale(), "release of {block} failed: {e}");
                    }
                }
            }
        }
    }
    live
}

/// Delegates to an inner allocator, then fails every allocation after
/// the first `succeed_count`.
///
/// Useful for testing how consumers handle [`PoolError::AllocationFailure`].
pub struct FailingAllocator<A> {
    inner: A,
    succeed_count: usize,
    call_count: usize,
}

impl<A: BlockAllocator> FailingAllocator<A> {
    /// Wrap `inner`, allowing `succeed_count` successful allocations.
    pub fn new(inner: A, succeed_count: usize) -> Self {
        Self {
            inner,
            succeed_count,
            call_count: 0,
        }
    }

    /// Number of `allocate` calls so far.
    pub fn calls(&self) -> usize {
        self.call_count
    }

    /// Unwrap the inner allocator.
    pub fn into_inner(self) -> A {
        self.inner
    }
}

impl<A: BlockAllocator> BlockAllocator for FailingAllocator<A> {
    fn allocate(&mut self, len: usize) -> Result<MemoryBlock, PoolError> {
        self.call_count += 1;
        if self.call_count > self.succeed_count {
            return Err(PoolError::AllocationFailure {
                requested: len,
                capacity: 0,
            });
        }
        self.inner.allocate(len)
    }

    fn release(&mut self, block: MemoryBlock) -> Result<(), PoolError> {
        self.inner.release(block)
    }

    fn is_live(&self, block: MemoryBlock) -> bool {
        self.inner.is_live(block)
    }
}
