// src/tagged_ptr.rs
//! ABA-safe tagged pointer: a 64-bit address packed with a 64-bit version
//! counter into a single 128-bit word, updated with one atomic CAS.
//!
//! A plain `AtomicPtr` free-list head is vulnerable to the classic ABA
//! problem: thread A reads head == X, gets preempted, thread B pops X,
//! pushes Y, pushes X again (same address, reused slot) — head is back to X
//! and A's CAS succeeds even though the free list changed underneath it. The
//! version counter is bumped on every push, so a stale CAS bumps a stale
//! version and is rejected even when the address recurs.

use portable_atomic::{AtomicU128, Ordering};

/// A pointer and a monotonically increasing version, packed for single-CAS
/// updates.
///
/// `ptr` is a raw, possibly-null address into a [`crate::pool::Pool`]'s slot
/// region (never dereferenced through this type directly — callers recover
/// a typed reference once they've won the CAS). `ver` only needs to avoid
/// colliding within the lifetime of one free-list entry; it is never reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedPtr {
    pub ptr: usize,
    pub ver: u64,
}

impl TaggedPtr {
    pub const NULL: TaggedPtr = TaggedPtr { ptr: 0, ver: 0 };

    #[inline]
    pub fn new(ptr: usize, ver: u64) -> Self {
        Self { ptr, ver }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr == 0
    }

    #[inline]
    fn to_bits(self) -> u128 {
        ((self.ver as u128) << 64) | (self.ptr as u128)
    }

    #[inline]
    fn from_bits(bits: u128) -> Self {
        Self {
            ptr: bits as usize,
            ver: (bits >> 64) as u64,
        }
    }
}

/// Atomic storage for a [`TaggedPtr`], backed by a native 128-bit CAS
/// (`cmpxchg16b` on x86_64, `casp` on AArch64) via `portable-atomic`.
///
/// `#[repr(align(16))]` matches the alignment the underlying intrinsics
/// require; `portable-atomic`'s `AtomicU128` already enforces this but the
/// explicit `repr` keeps the requirement visible at this crate's API
/// boundary.
#[repr(align(16))]
pub struct AtomicTaggedPtr {
    inner: AtomicU128,
}

impl AtomicTaggedPtr {
    #[inline]
    pub fn new(value: TaggedPtr) -> Self {
        Self {
            inner: AtomicU128::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn load(&self, order: Ordering) -> TaggedPtr {
        TaggedPtr::from_bits(self.inner.load(order))
    }

    #[inline]
    pub fn store(&self, value: TaggedPtr, order: Ordering) {
        self.inner.store(value.to_bits(), order);
    }

    /// Strong CAS: no spurious failure. Used at loop boundaries (single
    /// retry point) where a false failure would mean an extra, unnecessary
    /// round through the retry loop rather than a correctness issue, but
    /// callers that need a definite answer (e.g. `pool_destroy`-style
    /// invariant checks) should use this over `compare_exchange_weak`.
    #[inline]
    pub fn compare_exchange(
        &self,
        current: TaggedPtr,
        new: TaggedPtr,
        success: Ordering,
        failure: Ordering,
    ) -> Result<TaggedPtr, TaggedPtr> {
        self.inner
            .compare_exchange(current.to_bits(), new.to_bits(), success, failure)
            .map(TaggedPtr::from_bits)
            .map_err(TaggedPtr::from_bits)
    }

    /// Weak CAS, may fail spuriously even when `current` matches. Preferred
    /// inside alloc/free retry loops, where a spurious failure just costs
    /// one more iteration and weak CAS compiles to a tighter loop on
    /// architectures with LL/SC primitives.
    #[inline]
    pub fn compare_exchange_weak(
        &self,
        current: TaggedPtr,
        new: TaggedPtr,
        success: Ordering,
        failure: Ordering,
    ) -> Result<TaggedPtr, TaggedPtr> {
        self.inner
            .compare_exchange_weak(current.to_bits(), new.to_bits(), success, failure)
            .map(TaggedPtr::from_bits)
            .map_err(TaggedPtr::from_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_bits() {
        let tp = TaggedPtr::new(0xdead_beef, 7);
        assert_eq!(TaggedPtr::from_bits(tp.to_bits()), tp);
    }

    #[test]
    fn test_null_is_default() {
        assert!(TaggedPtr::NULL.is_null());
        assert_eq!(TaggedPtr::NULL.ver, 0);
    }

    #[test]
    fn test_cas_rejects_stale_version() {
        let cell = AtomicTaggedPtr::new(TaggedPtr::new(0x1000, 0));
        let stale = TaggedPtr::new(0x1000, 0);

        // Simulate an intervening push/pop/push cycle that bumps the version
        // but leaves the address the same (the ABA scenario).
        cell.store(TaggedPtr::new(0x2000, 1), Ordering::Release);
        cell.store(TaggedPtr::new(0x1000, 2), Ordering::Release);

        let result = cell.compare_exchange(
            stale,
            TaggedPtr::new(0x3000, 3),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        assert!(result.is_err(), "CAS must reject a version-stale address match");
    }

    #[test]
    fn test_cas_success_updates_both_fields() {
        let cell = AtomicTaggedPtr::new(TaggedPtr::NULL);
        let current = cell.load(Ordering::Acquire);
        let next = TaggedPtr::new(0x4000, current.ver + 1);
        cell.compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            .expect("CAS on an uncontended cell must succeed");
        assert_eq!(cell.load(Ordering::Acquire), next);
    }
}
