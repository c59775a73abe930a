//! The segregated pool allocator.
//!
//! Requests are routed through an immutable, ascending size-class table:
//! the first class whose block size covers the request serves it. Routing
//! is a pure function of the request, so deallocation rediscovers the same
//! class from the same size; the class's region registry then proves the
//! pointer actually belongs to it before any free-list mutation.
//!
//! All mutable state (free lists and region lists, across every class)
//! lives behind one `parking_lot::Mutex`; routing over the immutable table
//! takes no lock.

use std::ptr::NonNull;

use parking_lot::Mutex;

#[cfg(feature = "logging")]
use tracing::debug;

use crate::class::ClassState;
use crate::config::{PoolConfig, REGION_ALIGN};
use crate::error::{PoolError, PoolResult};
use crate::lease::BlockLease;
#[cfg(feature = "stats")]
use crate::stats::PoolStats;
use crate::utils::stride_alignment;

/// Usage snapshot of one size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassUsage {
    /// Bytes per block.
    pub block_size: usize,
    /// Total blocks owned across the class's regions.
    pub capacity: usize,
    /// Blocks currently on the free list.
    pub free_blocks: usize,
    /// Backing regions owned by the class.
    pub regions: usize,
}

/// A pool of fixed-size blocks segregated into size classes.
///
/// Blocks are recycled through per-class intrusive free lists; exhausted
/// classes grow by allocating a fresh backing region. Dropping the pool
/// releases every region exactly once.
///
/// # Teardown
///
/// The pool does not track outstanding blocks. Dropping it while raw
/// pointers from [`allocate`](SegregatedPool::allocate) are still live
/// invalidates them; keeping every block inside a [`BlockLease`] makes this
/// impossible to get wrong.
///
/// # Example
///
/// ```
/// use segpool::SegregatedPool;
///
/// let pool = SegregatedPool::new()?;
/// let ptr = pool.allocate(20)?; // served by the 32-byte class
/// unsafe { pool.deallocate(ptr, 20)? };
/// # Ok::<(), segpool::PoolError>(())
/// ```
pub struct SegregatedPool {
    /// Ascending block sizes; routing reads this without taking the lock.
    block_sizes: Box<[usize]>,
    classes: Mutex<Vec<ClassState>>,
    growth_factor: usize,
    alloc_pattern: Option<u8>,
    dealloc_pattern: Option<u8>,
    #[cfg(feature = "stats")]
    stats: PoolStats,
}

impl SegregatedPool {
    /// Creates a pool with the default configuration.
    pub fn new() -> PoolResult<Self> {
        Self::with_config(PoolConfig::default())
    }

    /// Creates a pool from a validated configuration.
    ///
    /// One initial region is carved per class with a non-zero initial block
    /// count; lazy classes grow on first use.
    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;

        let block_sizes: Box<[usize]> = config.classes.iter().map(|c| c.block_size).collect();
        let mut classes = Vec::with_capacity(config.classes.len());
        for entry in &config.classes {
            let mut class = ClassState::new(entry.block_size);
            if entry.initial_blocks > 0 {
                class.grow_by(entry.initial_blocks)?;
            }
            classes.push(class);
        }

        Ok(Self {
            block_sizes,
            classes: Mutex::new(classes),
            growth_factor: config.growth_factor,
            alloc_pattern: config.alloc_pattern,
            dealloc_pattern: config.dealloc_pattern,
            #[cfg(feature = "stats")]
            stats: PoolStats::default(),
        })
    }

    /// Largest configured block size; requests beyond it are rejected.
    #[must_use]
    pub fn largest_block_size(&self) -> usize {
        self.block_sizes.last().copied().unwrap_or(0)
    }

    /// First class whose block size covers `size`.
    ///
    /// Pure function of the request and the immutable table: allocation and
    /// deallocation of the same size always agree on the class.
    #[inline]
    fn class_for(&self, size: usize) -> Option<usize> {
        self.block_sizes.iter().position(|&bs| bs >= size)
    }

    /// Like [`class_for`](Self::class_for), additionally requiring the
    /// class's guaranteed block alignment to cover `align`. Still pure: the
    /// guarantee derives from the immutable block size alone.
    #[inline]
    fn class_for_aligned(&self, size: usize, align: usize) -> Option<usize> {
        self.block_sizes
            .iter()
            .position(|&bs| bs >= size && REGION_ALIGN.min(stride_alignment(bs)) >= align)
    }

    fn oversize(&self, requested: usize) -> PoolError {
        #[cfg(feature = "stats")]
        self.stats.record_oversize_rejection();

        PoolError::oversize_request(requested, self.largest_block_size())
    }

    /// Pops a block from the class at `index`, growing it first if empty.
    fn acquire_at(&self, index: usize) -> PoolResult<NonNull<u8>> {
        let mut classes = self.classes.lock();
        let class = &mut classes[index];

        if class.is_exhausted() {
            let added = class.grow(self.growth_factor)?;

            #[cfg(feature = "stats")]
            self.stats.record_growth();

            #[cfg(feature = "logging")]
            debug!(
                block_size = class.block_size(),
                added,
                capacity = class.capacity(),
                "size class grown"
            );
            #[cfg(not(feature = "logging"))]
            let _ = added;
        }

        let ptr = class.acquire(self.alloc_pattern);

        #[cfg(feature = "stats")]
        self.stats.record_allocation();

        Ok(ptr)
    }

    /// Returns a block to the class at `index` after proving it owns the
    /// pointer.
    fn release_at(&self, index: usize, ptr: NonNull<u8>) -> PoolResult<()> {
        let mut classes = self.classes.lock();
        let class = &mut classes[index];

        let addr = ptr.as_ptr() as usize;
        if !class.owns(addr) {
            #[cfg(feature = "stats")]
            self.stats.record_foreign_rejection();

            return Err(PoolError::foreign_pointer(addr, class.block_size()));
        }

        class.release(ptr, self.dealloc_pattern);

        #[cfg(feature = "stats")]
        self.stats.record_deallocation();

        Ok(())
    }

    /// Allocates a block of at least `size` bytes.
    ///
    /// Zero-size requests are clamped to one byte and served by the
    /// smallest class. The returned pointer is aligned to at least 8 bytes
    /// (16 when the serving class's block size is a multiple of 16) and
    /// stays valid until it is deallocated or the pool is dropped.
    ///
    /// # Errors
    ///
    /// [`PoolError::OversizeRequest`] if no class is large enough;
    /// [`PoolError::OutOfMemory`] if growth was needed and the system
    /// allocator refused. Either way the pool remains usable.
    pub fn allocate(&self, size: usize) -> PoolResult<NonNull<u8>> {
        let size = size.max(1);
        let index = self.class_for(size).ok_or_else(|| self.oversize(size))?;
        self.acquire_at(index)
    }

    /// Returns a block to the pool.
    ///
    /// `size` must be the size originally passed to
    /// [`allocate`](SegregatedPool::allocate); it is how the owning class is
    /// rediscovered. A pointer that does not belong to that class is
    /// rejected with [`PoolError::ForeignPointer`] and the free lists are
    /// left untouched.
    ///
    /// # Safety
    ///
    /// - `ptr` must come from this pool's `allocate` with the same `size`.
    /// - The block must not be released twice or used after this call.
    ///   A mismatched `size` that still routes to the owning class, and any
    ///   double release, are undetected and corrupt the free list.
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) -> PoolResult<()> {
        let size = size.max(1);
        let index = self.class_for(size).ok_or_else(|| self.oversize(size))?;
        self.release_at(index, ptr)
    }

    /// Allocates storage for `count` values of `T`.
    ///
    /// The request is `count * size_of::<T>()` bytes, routed to the first
    /// class that covers both the size and `align_of::<T>()`. Alignments
    /// above 16 bytes exceed the pool's region alignment and are never
    /// satisfiable.
    ///
    /// The storage is uninitialized; the caller must write each element
    /// before reading it.
    pub fn allocate_array<T>(&self, count: usize) -> PoolResult<NonNull<T>> {
        let index = self.route_array::<T>(count)?;
        self.acquire_at(index).map(|ptr| ptr.cast())
    }

    /// Returns storage obtained from
    /// [`allocate_array`](SegregatedPool::allocate_array).
    ///
    /// # Safety
    ///
    /// Same contract as [`deallocate`](SegregatedPool::deallocate), with
    /// `count` matching the original request. Any values still inside the
    /// block are not dropped.
    pub unsafe fn deallocate_array<T>(&self, ptr: NonNull<T>, count: usize) -> PoolResult<()> {
        let index = self.route_array::<T>(count)?;
        self.release_at(index, ptr.cast())
    }

    fn route_array<T>(&self, count: usize) -> PoolResult<usize> {
        let elem_size = size_of::<T>();
        let bytes = count
            .checked_mul(elem_size)
            .ok_or_else(|| PoolError::size_overflow(count, elem_size))?
            .max(1);
        self.class_for_aligned(bytes, align_of::<T>())
            .ok_or_else(|| self.oversize(bytes))
    }

    /// Acquires a zero-initialized block wrapped in an RAII lease.
    ///
    /// The lease exposes the block as a `[u8]` of the requested length and
    /// returns it to the pool when dropped, on every exit path.
    pub fn lease(&self, size: usize) -> PoolResult<BlockLease<'_>> {
        let ptr = self.allocate(size)?;
        // SAFETY: ptr starts a block of at least `size` bytes that is ours
        // until deallocated; zeroing makes the lease's `[u8]` view sound.
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, size) };
        Ok(BlockLease::new(self, ptr, size))
    }

    /// Per-class usage snapshot, in table order.
    pub fn usage(&self) -> Vec<ClassUsage> {
        self.classes
            .lock()
            .iter()
            .map(|class| ClassUsage {
                block_size: class.block_size(),
                capacity: class.capacity(),
                free_blocks: class.free_count(),
                regions: class.region_count(),
            })
            .collect()
    }

    /// Operation counters.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassConfig;

    fn three_class_config() -> PoolConfig {
        PoolConfig::with_classes(vec![
            ClassConfig::new(64, 8),
            ClassConfig::new(64, 16),
            ClassConfig::new(32, 32),
        ])
    }

    #[test]
    fn test_routing_picks_first_sufficient_class() {
        let pool = SegregatedPool::new().unwrap();
        assert_eq!(pool.class_for(1), Some(0));
        assert_eq!(pool.class_for(8), Some(0));
        assert_eq!(pool.class_for(9), Some(1));
        assert_eq!(pool.class_for(20), Some(2));
        assert_eq!(pool.class_for(256), Some(5));
        assert_eq!(pool.class_for(257), None);
    }

    #[test]
    fn test_oversize_request_reported() {
        let pool = SegregatedPool::with_config(three_class_config()).unwrap();
        let err = pool.allocate(40).unwrap_err();
        assert_eq!(
            err,
            PoolError::OversizeRequest {
                requested: 40,
                largest: 32
            }
        );

        // The rejection left every class untouched and usable.
        let ptr = pool.allocate(32).unwrap();
        unsafe { pool.deallocate(ptr, 32).unwrap() };
    }

    #[test]
    fn test_exhaustion_triggers_growth() {
        let pool = SegregatedPool::with_config(three_class_config()).unwrap();

        let mut held = Vec::new();
        for _ in 0..64 {
            held.push(pool.allocate(8).unwrap());
        }
        assert_eq!(pool.usage()[0].free_blocks, 0);
        assert_eq!(pool.usage()[0].capacity, 64);

        // 65th request doubles the class instead of failing.
        held.push(pool.allocate(8).unwrap());
        let usage = pool.usage()[0];
        assert_eq!(usage.capacity, 128);
        assert_eq!(usage.regions, 2);
        assert_eq!(usage.free_blocks, 63);

        for ptr in held {
            unsafe { pool.deallocate(ptr, 8).unwrap() };
        }
        let usage = pool.usage()[0];
        assert_eq!(usage.free_blocks, usage.capacity);
    }

    #[test]
    fn test_size_twenty_routes_to_32_byte_class_and_recycles() {
        let pool = SegregatedPool::with_config(three_class_config()).unwrap();

        let ptr = pool.allocate(20).unwrap();
        assert_eq!(pool.usage()[2].free_blocks, 31);
        assert_eq!(pool.usage()[0].free_blocks, 64);

        // SAFETY: ptr is ours, 20 bytes were requested.
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0xA5, 20);
            pool.deallocate(ptr, 20).unwrap();
        }

        let again = pool.allocate(20).unwrap();
        assert_eq!(again, ptr); // LIFO recycling from the same class
        unsafe { pool.deallocate(again, 20).unwrap() };
    }

    #[test]
    fn test_live_blocks_never_overlap() {
        let pool = SegregatedPool::new().unwrap();
        let block_size = 16usize;

        let mut addrs: Vec<usize> = (0..80)
            .map(|_| pool.allocate(block_size).unwrap().as_ptr() as usize)
            .collect();
        addrs.sort_unstable();
        for pair in addrs.windows(2) {
            assert!(pair[0] + block_size <= pair[1], "blocks overlap");
        }

        for addr in addrs {
            let ptr = NonNull::new(addr as *mut u8).unwrap();
            unsafe { pool.deallocate(ptr, block_size).unwrap() };
        }
    }

    #[test]
    fn test_no_cross_contamination_between_held_blocks() {
        let pool = SegregatedPool::new().unwrap();

        let a = pool.allocate(64).unwrap();
        let b = pool.allocate(64).unwrap();
        let c = pool.allocate(128).unwrap();

        // SAFETY: each pointer owns a block at least as large as requested.
        unsafe {
            std::ptr::write_bytes(a.as_ptr(), 0x11, 64);
            std::ptr::write_bytes(b.as_ptr(), 0x22, 64);
            std::ptr::write_bytes(c.as_ptr(), 0x33, 128);

            let read = |ptr: NonNull<u8>, len: usize| {
                std::slice::from_raw_parts(ptr.as_ptr(), len).to_vec()
            };
            assert!(read(a, 64).iter().all(|&byte| byte == 0x11));
            assert!(read(b, 64).iter().all(|&byte| byte == 0x22));
            assert!(read(c, 128).iter().all(|&byte| byte == 0x33));

            pool.deallocate(a, 64).unwrap();
            pool.deallocate(b, 64).unwrap();
            pool.deallocate(c, 128).unwrap();
        }
    }

    #[test]
    fn test_recycled_address_comes_from_same_class() {
        let pool = SegregatedPool::with_config(three_class_config()).unwrap();

        let mut seen = std::collections::HashSet::new();
        let mut held = Vec::new();
        for _ in 0..64 {
            let ptr = pool.allocate(16).unwrap();
            seen.insert(ptr.as_ptr() as usize);
            held.push(ptr);
        }
        for ptr in held.drain(..) {
            unsafe { pool.deallocate(ptr, 16).unwrap() };
        }

        let recycled = pool.allocate(16).unwrap();
        assert!(seen.contains(&(recycled.as_ptr() as usize)));
        unsafe { pool.deallocate(recycled, 16).unwrap() };
    }

    #[test]
    fn test_zero_size_request_clamped() {
        let pool = SegregatedPool::new().unwrap();
        let ptr = pool.allocate(0).unwrap();
        assert_eq!(pool.usage()[0].free_blocks, 63);
        unsafe { pool.deallocate(ptr, 0).unwrap() };
        assert_eq!(pool.usage()[0].free_blocks, 64);
    }

    #[test]
    fn test_foreign_pointer_rejected() {
        let pool_a = SegregatedPool::new().unwrap();
        let pool_b = SegregatedPool::new().unwrap();

        let ptr = pool_a.allocate(32).unwrap();
        let err = unsafe { pool_b.deallocate(ptr, 32) }.unwrap_err();
        assert!(matches!(err, PoolError::ForeignPointer { .. }));

        // pool_b is untouched, pool_a still owns and accepts the block.
        assert_eq!(pool_b.usage()[2].free_blocks, 32);
        unsafe { pool_a.deallocate(ptr, 32).unwrap() };
    }

    #[test]
    fn test_interior_pointer_rejected() {
        let pool = SegregatedPool::new().unwrap();
        let ptr = pool.allocate(32).unwrap();

        // One byte past the block start: inside the region, not on a stride.
        let interior = NonNull::new(unsafe { ptr.as_ptr().add(1) }).unwrap();
        let err = unsafe { pool.deallocate(interior, 32) }.unwrap_err();
        assert!(matches!(err, PoolError::ForeignPointer { .. }));

        unsafe { pool.deallocate(ptr, 32).unwrap() };
    }

    #[test]
    fn test_deallocate_oversize_size_reported() {
        let pool = SegregatedPool::with_config(three_class_config()).unwrap();
        let ptr = pool.allocate(8).unwrap();

        let err = unsafe { pool.deallocate(ptr, 100) }.unwrap_err();
        assert!(matches!(err, PoolError::OversizeRequest { .. }));

        unsafe { pool.deallocate(ptr, 8).unwrap() };
    }

    #[test]
    fn test_typed_array_allocation() {
        let pool = SegregatedPool::new().unwrap();

        // 4 * 8 = 32 bytes, 8-byte alignment: the 32-byte class.
        let ptr = pool.allocate_array::<u64>(4).unwrap();
        assert_eq!(ptr.as_ptr() as usize % align_of::<u64>(), 0);
        assert_eq!(pool.usage()[2].free_blocks, 31);

        // SAFETY: the block holds 4 u64 slots.
        unsafe {
            for i in 0..4 {
                ptr.as_ptr().add(i).write(u64::from(u32::MAX) + i as u64);
            }
            assert_eq!(ptr.as_ptr().add(3).read(), u64::from(u32::MAX) + 3);
            pool.deallocate_array(ptr, 4).unwrap();
        }
        assert_eq!(pool.usage()[2].free_blocks, 32);
    }

    #[test]
    fn test_typed_overflow_reported() {
        let pool = SegregatedPool::new().unwrap();
        let err = pool.allocate_array::<u64>(usize::MAX).unwrap_err();
        assert!(matches!(err, PoolError::SizeOverflow { .. }));
    }

    #[test]
    fn test_overaligned_type_rejected() {
        #[repr(align(32))]
        #[allow(dead_code)]
        struct Overaligned([u8; 32]);

        let pool = SegregatedPool::new().unwrap();
        let err = pool.allocate_array::<Overaligned>(1).unwrap_err();
        assert!(matches!(err, PoolError::OversizeRequest { .. }));
    }

    #[test]
    fn test_lazy_class_grows_on_first_use() {
        let pool =
            SegregatedPool::with_config(PoolConfig::with_classes(vec![ClassConfig::new(0, 8)]))
                .unwrap();
        assert_eq!(pool.usage()[0].capacity, 0);

        let ptr = pool.allocate(8).unwrap();
        let usage = pool.usage()[0];
        assert_eq!(usage.capacity, 1);
        assert_eq!(usage.free_blocks, 0);
        unsafe { pool.deallocate(ptr, 8).unwrap() };
    }

    #[cfg(feature = "stats")]
    #[test]
    fn test_stats_track_operations() {
        let pool = SegregatedPool::with_config(three_class_config()).unwrap();

        let ptr = pool.allocate(8).unwrap();
        unsafe { pool.deallocate(ptr, 8).unwrap() };
        let _ = pool.allocate(1000).unwrap_err();

        assert_eq!(pool.stats().allocations(), 1);
        assert_eq!(pool.stats().deallocations(), 1);
        assert_eq!(pool.stats().oversize_rejections(), 1);
        assert_eq!(pool.stats().outstanding(), 0);
    }
}
