//! A [`MemoryPool`] shared across threads behind one spin lock.
//!
//! The lock wraps the whole pool: a carve, its bucket updates, and the
//! handle issue all happen under a single acquisition. Acquiring the
//! lock makes the calling thread the pool's owner for the duration, so
//! the affinity assertions inside [`MemoryPool`] hold on every thread.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use nativepool_core::{BlockAllocator, MemoryBlock, PoolError};

use crate::config::PoolConfig;
use crate::pool::{BlockRange, MemoryPool, PoolStats};
use crate::spin::{SpinGuard, SpinMutex};

/// Cloneable, thread-safe handle to a shared [`MemoryPool`].
#[derive(Clone)]
pub struct NativeMemoryPool {
    inner: Arc<SpinMutex<MemoryPool>>,
}

/// Exclusive access to the pool inside a [`NativeMemoryPool`].
pub struct PoolGuard<'a> {
    guard: SpinGuard<'a, MemoryPool>,
}

impl Deref for PoolGuard<'_> {
    type Target = MemoryPool;

    fn deref(&self) -> &MemoryPool {
        &self.guard
    }
}

impl DerefMut for PoolGuard<'_> {
    fn deref_mut(&mut self) -> &mut MemoryPool {
        &mut self.guard
    }
}

impl NativeMemoryPool {
    /// Build a pool from `config` and wrap it for sharing.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        MemoryPool::new(config).map(Self::from_pool)
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: MemoryPool) -> Self {
        Self {
            inner: Arc::new(SpinMutex::new(pool)),
        }
    }

    /// Lock the pool and take ownership for the calling thread.
    pub fn lock(&self) -> PoolGuard<'_> {
        let mut guard = self.inner.lock();
        guard.adopt_current_thread();
        PoolGuard { guard }
    }

    /// See [`MemoryPool::get`].
    pub fn get(&self, len: usize) -> MemoryBlock {
        self.lock().get(len)
    }

    /// See [`MemoryPool::try_get`].
    pub fn try_get(&self, len: usize) -> Result<MemoryBlock, PoolError> {
        self.lock().try_get(len)
    }

    /// See [`MemoryPool::reserve`].
    pub fn reserve(&self, block: MemoryBlock) {
        self.lock().reserve(block);
    }

    /// See [`MemoryPool::try_reserve`].
    pub fn try_reserve(&self, block: MemoryBlock) -> Result<(), PoolError> {
        self.lock().try_reserve(block)
    }

    /// See [`MemoryPool::resolve`].
    pub fn resolve(&self, block: MemoryBlock) -> Result<BlockRange, PoolError> {
        self.lock().resolve(block)
    }

    /// Run `f` over the bytes of `block` while holding the lock.
    ///
    /// Returns `None` if the handle is stale.
    pub fn with_data<R>(&self, block: MemoryBlock, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        self.lock().data(block).map(f)
    }

    /// Run `f` over the mutable bytes of `block` while holding the lock.
    ///
    /// Returns `None` if the handle is stale.
    pub fn with_data_mut<R>(
        &self,
        block: MemoryBlock,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Option<R> {
        self.lock().data_mut(block).map(f)
    }

    /// See [`MemoryPool::stats`].
    pub fn stats(&self) -> PoolStats {
        self.lock().stats()
    }

    /// See [`MemoryPool::grow`].
    pub fn grow(&self) -> Result<usize, PoolError> {
        self.lock().grow()
    }

    /// See [`MemoryPool::clear`].
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Whether two handles share the same pool.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for NativeMemoryPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeMemoryPool")
            .field("locked", &self.inner.is_locked())
            .finish_non_exhaustive()
    }
}

impl BlockAllocator for NativeMemoryPool {
    fn allocate(&mut self, len: usize) -> Result<MemoryBlock, PoolError> {
        self.try_get(len)
    }

    fn release(&mut self, block: MemoryBlock) -> Result<(), PoolError> {
        self.try_reserve(block)
    }

    fn is_live(&self, block: MemoryBlock) -> bool {
        self.lock().is_live(block)
    }
}
