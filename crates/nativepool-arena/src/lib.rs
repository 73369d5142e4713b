//! Bucketed, generation-checked arena allocation.
//!
//! A [`MemoryPool`] owns one contiguous byte buffer and hands out
//! variable-length blocks through [`MemoryBlock`] handles. Handles hold
//! identifiers, never pointers; every access re-resolves them, so a
//! released block, a block from before a resize, or a block from some
//! other pool is rejected as stale instead of aliasing live memory.
//!
//! # Architecture
//!
//! ```text
//! MemoryPool (façade, thread-affine)
//! ├── BlockArena      Vec<u8> tiled by address-linked block nodes
//! ├── BucketIndex     size classes → IndexMap<BlockRef, len> of free blocks
//! ├── HandleTable     slots {id, generation, block} + LinearMap id → slot
//! └── OwnerThread     asserted on every mutating call
//!
//! NativeMemoryPool = Arc<SpinMutex<MemoryPool>>
//! ```
//!
//! # Lifecycle of a block
//!
//! `Free → (carve + issue) → InUse → (retire + release) → Free`. A
//! release merges the block with free address neighbours in O(1).
//! Growth and [`MemoryPool::clear`] rebuild the arena under a new
//! [`PoolId`], invalidating every outstanding handle.
//!
//! # Unsafe code
//!
//! Confined to [`spin`]; everything else is safe Rust.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod affinity;
pub mod arena;
pub mod bucket;
pub mod config;
pub mod linear_map;
pub mod native;
pub mod pool;
pub mod spin;
pub mod table;

// Public re-exports for the primary API surface.
pub use config::PoolConfig;
pub use native::{NativeMemoryPool, PoolGuard};
pub use pool::{BlockRange, MemoryPool, PoolStats};

pub use nativepool_core::{BlockAllocator, BlockId, MemoryBlock, PoolError, PoolId, StaleReason};
