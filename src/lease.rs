//! RAII lease over a single pool block.
//!
//! A [`BlockLease`] binds the release of one block to its own destruction,
//! so the block goes back to the pool on every exit path, including early
//! returns and unwinding. The lease borrows the pool, which makes dropping
//! the pool while leases are live a compile error rather than a dangling
//! pointer.

use core::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::pool::SegregatedPool;

/// A zero-initialized block borrowed from a [`SegregatedPool`].
///
/// Created by [`SegregatedPool::lease`]. Dereferences to a `[u8]` of the
/// requested length (the backing block may be larger).
pub struct BlockLease<'pool> {
    pool: &'pool SegregatedPool,
    ptr: NonNull<u8>,
    len: usize,
}

impl<'pool> BlockLease<'pool> {
    /// Wraps a freshly allocated, zeroed block. `ptr` must come from
    /// `pool.allocate(len)` and `len` bytes must be initialized.
    pub(crate) fn new(pool: &'pool SegregatedPool, ptr: NonNull<u8>, len: usize) -> Self {
        Self { pool, ptr, len }
    }

    /// Requested length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the requested length was zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw pointer to the block start.
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Raw mutable pointer to the block start.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Releases the lease without returning the block.
    ///
    /// The caller takes over the manual contract: the block must eventually
    /// go back through [`SegregatedPool::deallocate`] with the returned
    /// length, or it stays out of circulation until the pool is dropped.
    #[must_use = "the detached block must be deallocated manually"]
    pub fn detach(self) -> (NonNull<u8>, usize) {
        let parts = (self.ptr, self.len);
        core::mem::forget(self);
        parts
    }
}

impl Deref for BlockLease<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        // SAFETY: ptr starts a block of at least len bytes, zero-initialized
        // by lease() and exclusively ours until drop.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for BlockLease<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: same as Deref; &mut self guarantees unique access.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl AsRef<[u8]> for BlockLease<'_> {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl AsMut<[u8]> for BlockLease<'_> {
    fn as_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl Drop for BlockLease<'_> {
    fn drop(&mut self) {
        // SAFETY: ptr came from this pool's allocate with this len and is
        // released exactly once (detach forgets self instead of dropping).
        let released = unsafe { self.pool.deallocate(self.ptr, self.len) };
        debug_assert!(released.is_ok());
    }
}

// SAFETY: BlockLease is Send because:
// - the block is exclusively owned by the lease until drop
// - SegregatedPool is Sync, so the borrowed &pool may move between threads
// - drop releases through the pool mutex, never through unsynchronized state
unsafe impl Send for BlockLease<'_> {}
