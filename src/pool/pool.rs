// src/pool/pool.rs
//! The generic, fixed-capacity, lock-free object pool.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use portable_atomic::Ordering;

use super::config::PoolConfig;
use super::slot::{self, CACHE_LINE_SIZE};
use super::stats::{PaddedStats, PoolStats, PoolStatsInner};
use super::thread_cache;
use crate::error::PoolError;
use crate::tagged_ptr::{AtomicTaggedPtr, TaggedPtr};

/// Chunk size for the chunked CAS walk in batch alloc/free. A single CAS
/// publishes or claims up to this many slots at once, amortizing CAS cost
/// across the chunk rather than paying it per slot.
const BATCH_SIZE: usize = 64;

/// Prefetches the slot at `ptr` for a read that follows shortly (its
/// payload, once this thread wins the CAS claiming it). Mirrors the
/// original's `__builtin_prefetch((void*)next.ptr)` in the alloc fast path
/// and chain walk; the stable equivalent is `_mm_prefetch` on x86_64, with
/// a no-op fallback elsewhere (same platform-gating pattern as
/// `prefetch_read` in `other_examples/vanyastaff-nebula`'s memory crate).
#[inline]
fn prefetch_slot(ptr: *const u8) {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        std::arch::x86_64::_mm_prefetch::<{ std::arch::x86_64::_MM_HINT_T0 }>(ptr.cast());
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        let _ = ptr;
    }
}

/// Fixed-capacity, lock-free, cache-line-aligned object pool.
///
/// Slots are handed out from a LIFO free-list (released slots) with
/// fallback to a LIFO reserve list (never-yet-issued slots), both
/// ABA-safe via [`crate::tagged_ptr::AtomicTaggedPtr`]. Per-thread caches
/// amortize CAS traffic for threads that alloc and free at similar rates.
///
/// `Pool` does not own typed objects: `object_size` is a runtime
/// parameter, and callers are responsible for what they store in the
/// returned payload pointer, matching the C original's `void*
/// pool_alloc(Pool*)` contract.
pub struct Pool {
    region: NonNull<u8>,
    region_layout: Layout,
    slot_size: usize,
    capacity: usize,
    free_list: AtomicTaggedPtr,
    reserve_head: AtomicTaggedPtr,
    stats: PaddedStats,
}

// SAFETY: the only shared mutable state (`free_list`, `reserve_head`,
// `stats`) is atomic; `region` is never mutated through a shared `&Pool`
// except via the atomically-published slot links.
unsafe impl Send for Pool {}
unsafe impl Sync for Pool {}

impl Pool {
    /// Builds a pool of `capacity` slots, each holding `object_size` bytes
    /// of caller payload.
    ///
    /// Chains every slot into one LIFO list at construction (the "reserve"
    /// list); the free-list (released slots) starts empty. Fails with
    /// [`PoolError::InvalidArgument`] if either parameter is zero, or
    /// [`PoolError::AllocationFailed`] if the backing allocation fails.
    pub fn new(object_size: usize, capacity: usize) -> Result<Self, PoolError> {
        if object_size == 0 {
            return Err(PoolError::InvalidArgument("object_size must be non-zero"));
        }
        if capacity == 0 {
            return Err(PoolError::InvalidArgument("capacity must be non-zero"));
        }

        let slot_size = slot::slot_size(object_size);
        let region_size = slot_size
            .checked_mul(capacity)
            .ok_or(PoolError::InvalidArgument("capacity * slot_size overflows usize"))?;
        let region_layout = Layout::from_size_align(region_size, CACHE_LINE_SIZE)
            .map_err(|_| PoolError::InvalidArgument("invalid size/alignment combination"))?;

        // SAFETY: region_size is non-zero (object_size, capacity > 0).
        let region = unsafe { alloc::alloc(region_layout) };
        let region = NonNull::new(region).ok_or(PoolError::AllocationFailed)?;

        let mut prev = TaggedPtr::NULL;
        for i in 0..capacity {
            let slot_base = unsafe { region.as_ptr().add(i * slot_size) };
            // SAFETY: slot_base is within the freshly allocated, uniquely
            // owned region and is cache-line (hence 16-byte) aligned.
            unsafe {
                slot::link_of(slot_base).store(prev, Ordering::Relaxed);
            }
            prev = TaggedPtr::new(slot_base as usize, 0);
        }

        Ok(Self {
            region,
            region_layout,
            slot_size,
            capacity,
            free_list: AtomicTaggedPtr::new(TaggedPtr::NULL),
            reserve_head: AtomicTaggedPtr::new(prev),
            stats: PaddedStats::new(PoolStatsInner::default()),
        })
    }

    /// Convenience constructor from a [`PoolConfig`].
    pub fn with_config(config: PoolConfig) -> Result<Self, PoolError> {
        Self::new(config.object_size, config.capacity)
    }

    /// Number of slots this pool was constructed with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Payload size in bytes of each slot.
    pub fn object_size(&self) -> usize {
        self.slot_size - slot::PAYLOAD_OFFSET
    }

    /// A snapshot of this pool's counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats::snapshot(&self.stats)
    }

    /// Identity key used to scope this pool's thread-local cache entries.
    /// Stable for the pool's lifetime (it is the backing region's base
    /// address), and distinct across pools even when they share an
    /// `object_size`.
    fn identity(&self) -> usize {
        self.region.as_ptr() as usize
    }

    /// # Safety
    /// `slot_base` must be a valid pointer into this pool's backing region,
    /// obtained via the free-list, reserve-list, or construction-time
    /// chaining.
    #[inline]
    unsafe fn slot_addr_valid(&self, slot_base: *mut u8) -> bool {
        let base = self.region.as_ptr() as usize;
        let addr = slot_base as usize;
        addr >= base
            && addr < base + self.capacity * self.slot_size
            && (addr - base) % self.slot_size == 0
    }

    /// Pops one slot from `list`, retrying on CAS failure. Returns `None`
    /// if the list was observed empty.
    fn pop_from(&self, list: &AtomicTaggedPtr) -> Option<*mut u8> {
        loop {
            let head = list.load(Ordering::Acquire);
            if head.is_null() {
                return None;
            }
            let slot_base = head.ptr as *mut u8;
            debug_assert!(unsafe { self.slot_addr_valid(slot_base) });
            let next = unsafe { slot::read_next(slot_base) };
            if !next.is_null() {
                prefetch_slot(next.ptr as *const u8);
            }
            let new_head = TaggedPtr::new(next.ptr, head.ver.wrapping_add(1));
            match list.compare_exchange_weak(head, new_head, Ordering::Acquire, Ordering::Relaxed) {
                Ok(_) => {
                    self.stats.cas_success.fetch_add(1, Ordering::Relaxed);
                    return Some(slot_base);
                }
                Err(_) => {
                    self.stats.cas_fail.fetch_add(1, Ordering::Relaxed);
                    self.stats.contention_count.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Pushes one slot onto `list`.
    fn push_to(&self, list: &AtomicTaggedPtr, slot_base: *mut u8) {
        loop {
            let head = list.load(Ordering::Relaxed);
            unsafe {
                slot::link_of(slot_base).store(head, Ordering::Relaxed);
            }
            let new_head = TaggedPtr::new(slot_base as usize, head.ver.wrapping_add(1));
            match list.compare_exchange_weak(head, new_head, Ordering::Release, Ordering::Relaxed) {
                Ok(_) => {
                    self.stats.cas_success.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(_) => {
                    self.stats.cas_fail.fetch_add(1, Ordering::Relaxed);
                    self.stats.contention_count.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Walks up to `max` nodes off `list` in one CAS, returning their slot
    /// base addresses. The walk is speculative: nodes are read before the
    /// head CAS confirms nobody else moved the list's front in the
    /// meantime; a failed CAS discards the walk and retries from scratch.
    fn pop_chain(&self, list: &AtomicTaggedPtr, max: usize) -> Vec<*mut u8> {
        if max == 0 {
            return Vec::new();
        }
        loop {
            let head = list.load(Ordering::Acquire);
            if head.is_null() {
                return Vec::new();
            }
            let mut nodes = Vec::with_capacity(max);
            let mut cur = head;
            loop {
                let slot_base = cur.ptr as *mut u8;
                nodes.push(slot_base);
                if nodes.len() >= max {
                    break;
                }
                let next = unsafe { slot::read_next(slot_base) };
                if next.is_null() {
                    break;
                }
                prefetch_slot(next.ptr as *const u8);
                cur = next;
            }
            let tail_next = unsafe { slot::read_next(*nodes.last().unwrap()) };
            let new_head = TaggedPtr::new(tail_next.ptr, head.ver.wrapping_add(1));
            match list.compare_exchange_weak(head, new_head, Ordering::Acquire, Ordering::Relaxed) {
                Ok(_) => {
                    self.stats.cas_success.fetch_add(1, Ordering::Relaxed);
                    return nodes;
                }
                Err(_) => {
                    self.stats.cas_fail.fetch_add(1, Ordering::Relaxed);
                    self.stats.contention_count.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Batch-publish: chains `slot_bases` into one internal list (each
    /// internal link version-tagged distinctly, fixing the upstream
    /// zero-version inconsistency) then publishes the whole chain onto
    /// `list` with a single CAS.
    fn batch_publish(&self, list: &AtomicTaggedPtr, slot_bases: &[*mut u8]) {
        if slot_bases.is_empty() {
            return;
        }
        for i in 1..slot_bases.len() {
            unsafe {
                slot::link_of(slot_bases[i]).store(
                    TaggedPtr::new(slot_bases[i - 1] as usize, i as u64),
                    Ordering::Relaxed,
                );
            }
        }
        let head_of_batch = slot_bases[0];
        let tail_of_batch = *slot_bases.last().unwrap();
        loop {
            let head = list.load(Ordering::Relaxed);
            unsafe {
                slot::link_of(tail_of_batch).store(head, Ordering::Relaxed);
            }
            let new_head = TaggedPtr::new(head_of_batch as usize, head.ver.wrapping_add(1));
            match list.compare_exchange_weak(head, new_head, Ordering::Release, Ordering::Relaxed) {
                Ok(_) => {
                    self.stats.cas_success.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(_) => {
                    self.stats.cas_fail.fetch_add(1, Ordering::Relaxed);
                    self.stats.contention_count.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Allocates one slot. Prefers the free-list (released slots); falls
    /// back to the reserve list (never-yet-issued slots). Returns `None`
    /// when the pool is exhausted — resource exhaustion is never an error
    /// here.
    pub fn alloc(&self) -> Option<NonNull<u8>> {
        let slot_base = self.pop_from(&self.free_list).or_else(|| self.pop_from(&self.reserve_head))?;
        self.stats.alloc_count.fetch_add(1, Ordering::Relaxed);
        let payload = unsafe { slot::payload_of(slot_base) };
        Some(unsafe { NonNull::new_unchecked(payload) })
    }

    /// Frees a single slot previously returned by `alloc`/`alloc_batch`.
    ///
    /// # Safety
    /// `ptr` must be a payload pointer this pool issued and not already
    /// freed. Double-free and freeing a foreign pointer are undefined
    /// behavior; debug builds assert the address lies within this pool's
    /// region on a slot boundary.
    pub fn free(&self, ptr: NonNull<u8>) {
        let slot_base = unsafe { slot::slot_base_of(ptr.as_ptr()) };
        debug_assert!(unsafe { self.slot_addr_valid(slot_base) }, "freed pointer not owned by this pool");
        self.push_to(&self.free_list, slot_base);
        self.stats.free_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Allocates up to `k` slots. Drains the calling thread's cache first,
    /// then draws from the global lists in chunks of [`BATCH_SIZE`],
    /// refilling the thread cache with any overshoot and spilling the rest
    /// back globally. Returns fewer than `k` entries if the pool is
    /// exhausted; never blocks.
    pub fn alloc_batch(&self, k: usize) -> Vec<NonNull<u8>> {
        let mut result = Vec::with_capacity(k);
        if k == 0 {
            return result;
        }
        let pool_key = self.identity();

        let mut cache_hits = Vec::new();
        thread_cache::take_up_to(pool_key, k, &mut cache_hits);
        self.stats.cache_hit.fetch_add(cache_hits.len() as u64, Ordering::Relaxed);
        result.extend(cache_hits);

        while result.len() < k {
            let mut nodes = self.pop_chain(&self.free_list, BATCH_SIZE);
            if nodes.is_empty() {
                nodes = self.pop_chain(&self.reserve_head, BATCH_SIZE);
            }
            if nodes.is_empty() {
                break;
            }

            let need = k - result.len();
            if nodes.len() <= need {
                for slot_base in nodes {
                    result.push(unsafe { NonNull::new_unchecked(slot::payload_of(slot_base)) });
                }
            } else {
                let surplus = nodes.split_off(need);
                for slot_base in nodes {
                    result.push(unsafe { NonNull::new_unchecked(slot::payload_of(slot_base)) });
                }
                let overflow = thread_cache::refill(pool_key, &surplus);
                if !overflow.is_empty() {
                    self.batch_publish(&self.free_list, &overflow);
                }
            }
        }

        self.stats.alloc_count.fetch_add(result.len() as u64, Ordering::Relaxed);
        result
    }

    /// Frees a batch of slots. First drains the calling thread's cache
    /// above the high watermark to the global list, then tops the cache
    /// back up with as many of `ptrs` as fit below the high watermark,
    /// publishing the remainder globally in one batch.
    ///
    /// # Safety
    /// Every pointer in `ptrs` must have been issued by this pool and not
    /// already freed.
    pub fn free_batch(&self, ptrs: &[NonNull<u8>]) {
        if ptrs.is_empty() {
            return;
        }
        let pool_key = self.identity();

        let excess = thread_cache::drain_excess(pool_key, thread_cache::HIGH_WATERMARK);
        if !excess.is_empty() {
            let bases: Vec<*mut u8> = excess
                .iter()
                .map(|p| unsafe { slot::slot_base_of(p.as_ptr()) })
                .collect();
            self.batch_publish(&self.free_list, &bases);
        }

        let accepted = thread_cache::fill_up_to(pool_key, thread_cache::HIGH_WATERMARK, ptrs);
        let remainder = &ptrs[accepted..];
        if !remainder.is_empty() {
            let bases: Vec<*mut u8> = remainder
                .iter()
                .map(|p| unsafe { slot::slot_base_of(p.as_ptr()) })
                .collect();
            self.batch_publish(&self.free_list, &bases);
        }

        self.stats.free_count.fetch_add(ptrs.len() as u64, Ordering::Relaxed);
    }

    /// Unconditionally moves every entry in the calling thread's cache for
    /// this pool into the global free-list.
    pub fn flush(&self) {
        let pool_key = self.identity();
        let drained = thread_cache::drain_all(pool_key);
        if drained.is_empty() {
            return;
        }
        let bases: Vec<*mut u8> = drained
            .iter()
            .map(|p| unsafe { slot::slot_base_of(p.as_ptr()) })
            .collect();
        self.batch_publish(&self.free_list, &bases);
    }

    /// Opts the calling thread's cache for this pool into the registry
    /// drained by [`crate::reaper::Reaper::start_global`], the corrected
    /// reaper redesign that drains every registered thread's cache instead
    /// of only its own. Not required when using the default
    /// [`crate::reaper::Reaper::start`], which only ever drains its own
    /// thread.
    pub fn register_cache_for_reaping(&self) {
        crate::reaper::register_pool(self.identity());
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.flush();
        let stats = self.stats();
        assert_eq!(
            stats.alloc_count, stats.free_count,
            "pool destroyed with {} outstanding allocations (alloc={}, free={})",
            stats.alloc_count - stats.free_count,
            stats.alloc_count,
            stats.free_count,
        );
        unsafe {
            alloc::dealloc(self.region.as_ptr(), self.region_layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_create_and_single_alloc_free() {
        let pool = Pool::new(4, 100).unwrap();
        let p = pool.alloc().expect("pool should not be exhausted");
        pool.free(p);
        let stats = pool.stats();
        assert_eq!(stats.alloc_count, 1);
        assert_eq!(stats.free_count, 1);
    }

    #[test]
    fn test_zero_object_size_is_argument_error() {
        assert_eq!(
            Pool::new(0, 10).unwrap_err(),
            PoolError::InvalidArgument("object_size must be non-zero")
        );
    }

    #[test]
    fn test_zero_capacity_is_argument_error() {
        assert_eq!(
            Pool::new(8, 0).unwrap_err(),
            PoolError::InvalidArgument("capacity must be non-zero")
        );
    }

    #[test]
    fn test_alloc_is_cache_line_aligned_and_in_region() {
        let pool = Pool::new(4, 100).unwrap();
        let mut ptrs = Vec::new();
        for _ in 0..100 {
            let p = pool.alloc().unwrap();
            assert_eq!(p.as_ptr() as usize % CACHE_LINE_SIZE, 0, "non-aligned slot");
            ptrs.push(p);
        }
        for p in ptrs {
            pool.free(p);
        }
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let pool = Pool::new(8, 2).unwrap();
        let _a = pool.alloc().unwrap();
        let _b = pool.alloc().unwrap();
        assert!(pool.alloc().is_none());
    }

    #[test]
    fn test_lifo_reuse_order() {
        let pool = Pool::new(8, 10).unwrap();
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        pool.free(a);
        pool.free(b);
        // b was freed last, so it is the top of the free-list.
        let first = pool.alloc().unwrap();
        assert_eq!(first, b);
        let second = pool.alloc().unwrap();
        assert_eq!(second, a);
        pool.free(first);
        pool.free(second);
    }

    #[test]
    fn test_batch_alloc_short_count_on_exhaustion() {
        let pool = Pool::new(64, 10).unwrap();
        let got = pool.alloc_batch(20);
        assert_eq!(got.len(), 10);
        assert_eq!(pool.stats().alloc_count, 10);
    }

    #[test]
    fn test_batch_alloc_then_batch_free_round_trips() {
        let pool = Pool::new(32, 50).unwrap();
        let got = pool.alloc_batch(50);
        assert_eq!(got.len(), 50);
        pool.free_batch(&got);
        let stats = pool.stats();
        assert_eq!(stats.alloc_count, 50);
        assert_eq!(stats.free_count, 50);
    }

    #[test]
    fn test_flush_drains_thread_cache() {
        let pool = Pool::new(16, 300);
        let pool = pool.unwrap();
        let got = pool.alloc_batch(200);
        pool.free_batch(&got);
        pool.flush();
        assert_eq!(thread_cache::len(pool.identity()), 0);
    }

    #[test]
    fn test_eight_threads_one_hundred_thousand_alloc_free_pairs() {
        let pool = Arc::new(Pool::new(8, 16).unwrap());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            handles.push(thread::spawn(move || {
                for _ in 0..100_000 {
                    if let Some(p) = pool.alloc() {
                        pool.free(p);
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let stats = pool.stats();
        assert_eq!(stats.alloc_count, stats.free_count);
    }
}
