//! Atomic operation counters, enabled by the `stats` feature.

use core::sync::atomic::{AtomicU64, Ordering};

/// Running totals across the lifetime of one pool.
///
/// Counters are updated with relaxed increments on the hot path and read
/// with acquire loads; they are monitoring data, not synchronization.
#[derive(Debug, Default)]
pub struct PoolStats {
    allocations: AtomicU64,
    deallocations: AtomicU64,
    growth_events: AtomicU64,
    oversize_rejections: AtomicU64,
    foreign_rejections: AtomicU64,
}

impl PoolStats {
    pub(crate) fn record_allocation(&self) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deallocation(&self) {
        self.deallocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_growth(&self) {
        self.growth_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_oversize_rejection(&self) {
        self.oversize_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_foreign_rejection(&self) {
        self.foreign_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Blocks handed out so far.
    pub fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Acquire)
    }

    /// Blocks returned so far.
    pub fn deallocations(&self) -> u64 {
        self.deallocations.load(Ordering::Acquire)
    }

    /// Regions added after construction.
    pub fn growth_events(&self) -> u64 {
        self.growth_events.load(Ordering::Acquire)
    }

    /// Requests rejected because no class was large enough.
    pub fn oversize_rejections(&self) -> u64 {
        self.oversize_rejections.load(Ordering::Acquire)
    }

    /// Deallocations rejected by the region membership check.
    pub fn foreign_rejections(&self) -> u64 {
        self.foreign_rejections.load(Ordering::Acquire)
    }

    /// Blocks currently outstanding (allocations minus deallocations).
    pub fn outstanding(&self) -> u64 {
        self.allocations().saturating_sub(self.deallocations())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = PoolStats::default();
        stats.record_allocation();
        stats.record_allocation();
        stats.record_deallocation();
        stats.record_growth();

        assert_eq!(stats.allocations(), 2);
        assert_eq!(stats.deallocations(), 1);
        assert_eq!(stats.growth_events(), 1);
        assert_eq!(stats.outstanding(), 1);
    }

    #[test]
    fn test_rejection_counters() {
        let stats = PoolStats::default();
        stats.record_oversize_rejection();
        stats.record_foreign_rejection();

        assert_eq!(stats.oversize_rejections(), 1);
        assert_eq!(stats.foreign_rejections(), 1);
        assert_eq!(stats.outstanding(), 0);
    }
}
