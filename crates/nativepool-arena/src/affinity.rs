//! Owner-thread tracking for [`MemoryPool`](crate::MemoryPool).
//!
//! A pool is bound to the thread that created it. Every mutating
//! operation asserts it runs on that thread; a violation is a
//! programming error and panics. Ownership can be handed over
//! explicitly with [`OwnerThread::adopt_current`], which is what
//! [`NativeMemoryPool`](crate::NativeMemoryPool) does under its lock.

use std::thread::{self, ThreadId};

/// The thread allowed to mutate a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OwnerThread {
    id: ThreadId,
}

impl OwnerThread {
    /// Bind to the calling thread.
    pub fn current() -> Self {
        Self {
            id: thread::current().id(),
        }
    }

    /// The owning thread's id.
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Whether the calling thread is the owner.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.id
    }

    /// Transfer ownership to the calling thread.
    pub fn adopt_current(&mut self) {
        let id = thread::current().id();
        if id != self.id {
            tracing::trace!(from = ?self.id, to = ?id, "pool changed owner thread");
            self.id = id;
        }
    }

    /// Panic unless called on the owning thread.
    ///
    /// # Panics
    ///
    /// Panics with a message naming `operation` when the calling thread
    /// is not the owner.
    #[track_caller]
    pub fn assert_current(&self, operation: &str) {
        let here = thread::current().id();
        if here != self.id {
            panic!(
                "nativepool: `{operation}` called on {here:?} but the pool is owned by {:?}",
                self.id
            );
        }
    }
}
