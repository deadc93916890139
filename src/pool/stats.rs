// src/pool/stats.rs
//! Pool statistics: observability only, never load-bearing for correctness.

use crossbeam::utils::CachePadded;
use portable_atomic::{AtomicU64, Ordering};

/// Raw atomic counters, isolated on their own cache line so that reading
/// statistics from one thread never causes false sharing with the hot
/// alloc/free path's own cache-line-aligned structures.
#[derive(Default)]
pub(crate) struct PoolStatsInner {
    pub alloc_count: AtomicU64,
    pub free_count: AtomicU64,
    pub contention_count: AtomicU64,
    pub cas_success: AtomicU64,
    pub cas_fail: AtomicU64,
    pub cache_hit: AtomicU64,
}

pub(crate) type PaddedStats = CachePadded<PoolStatsInner>;

/// A point-in-time snapshot of a [`crate::pool::Pool`]'s counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub alloc_count: u64,
    pub free_count: u64,
    pub contention_count: u64,
    pub cas_success: u64,
    pub cas_fail: u64,
    pub cache_hit: u64,
}

impl PoolStats {
    pub(crate) fn snapshot(inner: &PoolStatsInner) -> Self {
        Self {
            alloc_count: inner.alloc_count.load(Ordering::Relaxed),
            free_count: inner.free_count.load(Ordering::Relaxed),
            contention_count: inner.contention_count.load(Ordering::Relaxed),
            cas_success: inner.cas_success.load(Ordering::Relaxed),
            cas_fail: inner.cas_fail.load(Ordering::Relaxed),
            cache_hit: inner.cache_hit.load(Ordering::Relaxed),
        }
    }

    /// Allocations currently outstanding (not yet freed).
    pub fn in_use(&self) -> u64 {
        self.alloc_count.saturating_sub(self.free_count)
    }

    /// Fraction of CAS attempts on this pool's free-list/reserve head that
    /// succeeded on the first try, as a percentage.
    pub fn cas_success_rate(&self) -> f64 {
        let total = self.cas_success + self.cas_fail;
        if total == 0 {
            return 100.0;
        }
        (self.cas_success as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_use_saturates_at_zero() {
        let stats = PoolStats {
            alloc_count: 0,
            free_count: 5,
            ..Default::default()
        };
        assert_eq!(stats.in_use(), 0);
    }

    #[test]
    fn test_cas_success_rate_with_no_attempts() {
        assert_eq!(PoolStats::default().cas_success_rate(), 100.0);
    }

    #[test]
    fn test_cas_success_rate_computation() {
        let stats = PoolStats {
            cas_success: 3,
            cas_fail: 1,
            ..Default::default()
        };
        assert_eq!(stats.cas_success_rate(), 75.0);
    }
}
