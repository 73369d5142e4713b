//! Error types for pool operations.
//!
//! One enum covers the whole allocation boundary. `OutOfSpace` is the
//! internal growth trigger; callers of the pool façade only ever see it
//! if they drive the arena directly.

use std::error::Error;
use std::fmt;

use crate::block::MemoryBlock;

/// Why a handle failed to resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaleReason {
    /// The handle is the [`MemoryBlock::INVALID`] sentinel.
    Invalid,
    /// The handle was issued by another pool, or by this pool before a
    /// resize or clear.
    WrongPool,
    /// No live entry carries the handle's identifier: the block was
    /// released, or the id was never issued.
    UnknownId,
    /// The identifier maps to a slot whose generation has moved on.
    GenerationMismatch {
        /// Generation recorded in the slot.
        current: u32,
    },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => write!(f, "invalid sentinel handle"),
            Self::WrongPool => write!(f, "handle belongs to another pool generation"),
            Self::UnknownId => write!(f, "identifier is not live"),
            Self::GenerationMismatch { current } => {
                write!(f, "slot generation is now {current}")
            }
        }
    }
}

/// Errors that can occur during pool operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// A zero-length block was requested. No state was changed.
    InvalidRequest {
        /// Number of bytes requested.
        requested: usize,
    },
    /// No single free block can hold the request. Transient: the pool
    /// grows and retries once before reporting [`PoolError::AllocationFailure`].
    OutOfSpace {
        /// Number of bytes requested (after alignment rounding).
        requested: usize,
        /// Length of the largest free block at the time of the request.
        largest_free: usize,
    },
    /// The request could not be satisfied even after growth.
    AllocationFailure {
        /// Number of bytes requested (after alignment rounding).
        requested: usize,
        /// Pool capacity after the growth attempt.
        capacity: usize,
    },
    /// A handle that is unknown, already released, or from a prior pool
    /// generation was resolved or released.
    StaleOrUnknownHandle {
        /// The offending handle.
        block: MemoryBlock,
        /// Which check rejected it.
        reason: StaleReason,
    },
    /// Pool configuration failed validation.
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
}

impl PoolError {
    /// Whether this error is the stale/unknown handle path.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleOrUnknownHandle { .. })
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest { requested } => {
                write!(f, "invalid request: {requested} bytes")
            }
            Self::OutOfSpace {
                requested,
                largest_free,
            } => {
                write!(
                    f,
                    "out of space: requested {requested} bytes, largest free block {largest_free} bytes"
                )
            }
            Self::AllocationFailure {
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "allocation failed: requested {requested} bytes, capacity {capacity} bytes"
                )
            }
            Self::StaleOrUnknownHandle { block, reason } => {
                write!(f, "stale or unknown handle {block}: {reason}")
            }
            Self::InvalidConfig { reason } => write!(f, "invalid pool config: {reason}"),
        }
    }
}

impl Error for PoolError {}
