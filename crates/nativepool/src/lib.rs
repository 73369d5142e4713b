//! nativepool: a bucketed, generation-checked arena allocator.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the nativepool sub-crates. For most users, adding `nativepool` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use nativepool::prelude::*;
//!
//! let mut pool = MemoryPool::new(PoolConfig::new(1024).with_bucket_count(4)).unwrap();
//!
//! let small = pool.get(10);
//! let large = pool.get(1000);
//! assert_eq!(pool.resolve(small).unwrap().size_class, 16);
//! assert_eq!(pool.resolve(large).unwrap().size_class, 1024);
//!
//! pool.data_mut(small).unwrap().copy_from_slice(&[7; 16]);
//! assert_eq!(pool.data(small).unwrap()[0], 7);
//!
//! pool.reserve(small);
//! pool.reserve(large);
//! assert!(pool.resolve(small).is_err());
//!
//! // Both blocks coalesced back into one: the whole arena is available.
//! let full = pool.get(1024);
//! assert_eq!(pool.resolve(full).unwrap().len, 1024);
//! # pool.reserve(full);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`arena`] | `nativepool-arena` | `MemoryPool`, `NativeMemoryPool`, `PoolConfig`, arena internals |
//! | [`types`] | `nativepool-core` | IDs, `MemoryBlock`, errors, the `BlockAllocator` trait |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// The allocator and its building blocks (`nativepool-arena`).
///
/// Most users only need [`arena::MemoryPool`] or
/// [`arena::NativeMemoryPool`], both also in the [`prelude`]. The
/// arena, bucket, table, and map modules are public for benchmarks and
/// custom tooling.
pub use nativepool_arena as arena;

/// Core identifiers, handles, and errors (`nativepool-core`).
///
/// Contains [`types::MemoryBlock`], [`types::PoolError`], and the
/// [`types::BlockAllocator`] trait that consumers program against.
pub use nativepool_core as types;

/// Common imports for typical nativepool usage.
///
/// ```rust
/// use nativepool::prelude::*;
/// ```
pub mod prelude {
    // Pools
    pub use nativepool_arena::{BlockRange, MemoryPool, NativeMemoryPool, PoolConfig, PoolStats};

    // Handles and the allocator seam
    pub use nativepool_core::{BlockAllocator, MemoryBlock};

    // Errors
    pub use nativepool_core::{PoolError, StaleReason};
}
