//! Core types and traits for the nativepool allocator.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the allocator and its consumers: pool and
//! block identifiers, the [`MemoryBlock`] handle value, the error
//! taxonomy, and the [`BlockAllocator`] trait that external components
//! program against.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod block;
pub mod error;
pub mod id;
pub mod traits;

pub use block::MemoryBlock;
pub use error::{PoolError, StaleReason};
pub use id::{BlockId, PoolId};
pub use traits::BlockAllocator;
