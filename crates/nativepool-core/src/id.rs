//! Strongly-typed identifiers for pools and blocks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique [`PoolId`] allocation. Zero is reserved for [`PoolId::NONE`].
static POOL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of one pool generation.
///
/// Allocated from a monotonic process-wide counter via [`PoolId::next`].
/// A pool draws a fresh id at construction and again on every resize or
/// clear, so handles minted before the change can never match the pool's
/// current id. Two distinct pools never share an id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(u64);

impl PoolId {
    /// The id carried by [`MemoryBlock::INVALID`](crate::MemoryBlock::INVALID).
    /// No pool ever has this id.
    pub const NONE: Self = Self(0);

    /// Allocate a fresh, unique pool id.
    ///
    /// Each call returns a new id that has never been returned before
    /// within this process. Thread-safe.
    pub fn next() -> Self {
        Self(POOL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Whether this is the reserved [`PoolId::NONE`].
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of one block issued by a handle table.
///
/// Identifiers are drawn from a per-table monotonic counter and are never
/// reused while the table lives. Zero is reserved for [`BlockId::NONE`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u64);

impl BlockId {
    /// The id carried by [`MemoryBlock::INVALID`](crate::MemoryBlock::INVALID).
    pub const NONE: Self = Self(0);

    /// Whether this is the reserved [`BlockId::NONE`].
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for BlockId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
