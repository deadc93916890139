// src/pool/thread_cache.rs
//! Per-thread free-slot cache, amortizing CAS traffic on the global
//! free-list for the common case of balanced alloc/free on one thread.
//!
//! Keyed by pool identity (the pool's backing-region base address) rather
//! than a single unkeyed cache per thread: a thread touching two pools of
//! identical slot size cannot cross-contaminate, since each pool gets its
//! own entry in this thread's cache map.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ptr::NonNull;

/// Slots per thread per pool.
pub const CAPACITY: usize = 256;
/// Below this count a batch-free tops the cache back up instead of
/// spilling straight to the global list.
pub const LOW_WATERMARK: usize = 64;
/// Above this count a batch-free (or the reaper) drains the excess back to
/// the global list.
pub const HIGH_WATERMARK: usize = 192;

struct CacheSlots {
    slots: Vec<NonNull<u8>>,
}

thread_local! {
    static CACHES: RefCell<HashMap<usize, CacheSlots>> = RefCell::new(HashMap::new());
}

/// Pops up to `n` payload pointers from this thread's cache for `pool_key`,
/// LIFO, appending them to `out`. Returns the number taken.
pub fn take_up_to(pool_key: usize, n: usize, out: &mut Vec<NonNull<u8>>) -> usize {
    CACHES.with(|caches| {
        let mut caches = caches.borrow_mut();
        let Some(entry) = caches.get_mut(&pool_key) else {
            return 0;
        };
        let take = n.min(entry.slots.len());
        let start = entry.slots.len() - take;
        out.extend(entry.slots.drain(start..));
        take
    })
}

/// Pushes as many of `incoming` as fit below `HIGH_WATERMARK` into this
/// thread's cache for `pool_key`. Returns how many were accepted; the
/// caller is responsible for publishing the remainder (`incoming[accepted..]`)
/// to the global free-list.
pub fn fill_up_to(pool_key: usize, high_watermark: usize, incoming: &[NonNull<u8>]) -> usize {
    CACHES.with(|caches| {
        let mut caches = caches.borrow_mut();
        let entry = caches
            .entry(pool_key)
            .or_insert_with(|| CacheSlots { slots: Vec::with_capacity(CAPACITY) });
        let room = high_watermark.saturating_sub(entry.slots.len());
        let accept = room.min(incoming.len());
        entry.slots.extend_from_slice(&incoming[..accept]);
        accept
    })
}

/// Pushes `surplus` into the cache for `pool_key` up to `CAPACITY`, returning
/// whatever doesn't fit for the caller to publish globally.
pub fn refill(pool_key: usize, surplus: &[*mut u8]) -> Vec<*mut u8> {
    CACHES.with(|caches| {
        let mut caches = caches.borrow_mut();
        let entry = caches
            .entry(pool_key)
            .or_insert_with(|| CacheSlots { slots: Vec::with_capacity(CAPACITY) });
        let room = CAPACITY.saturating_sub(entry.slots.len());
        let accept = room.min(surplus.len());
        entry
            .slots
            .extend(surplus[..accept].iter().map(|&p| unsafe { NonNull::new_unchecked(p) }));
        surplus[accept..].to_vec()
    })
}

/// Drains every entry above `high_watermark` from this thread's cache for
/// `pool_key`, returning their slot-base pointers (caller recovers the base
/// from the payload pointer).
pub fn drain_excess(pool_key: usize, high_watermark: usize) -> Vec<NonNull<u8>> {
    CACHES.with(|caches| {
        let mut caches = caches.borrow_mut();
        let Some(entry) = caches.get_mut(&pool_key) else {
            return Vec::new();
        };
        if entry.slots.len() <= high_watermark {
            return Vec::new();
        }
        entry.slots.split_off(high_watermark)
    })
}

/// Unconditionally drains every entry for `pool_key` from this thread's
/// cache. Used by `Pool::flush` and the reaper.
pub fn drain_all(pool_key: usize) -> Vec<NonNull<u8>> {
    CACHES.with(|caches| {
        let mut caches = caches.borrow_mut();
        match caches.get_mut(&pool_key) {
            Some(entry) => std::mem::take(&mut entry.slots),
            None => Vec::new(),
        }
    })
}

/// Number of entries currently cached for `pool_key` on this thread.
pub fn len(pool_key: usize) -> usize {
    CACHES.with(|caches| {
        caches
            .borrow()
            .get(&pool_key)
            .map(|e| e.slots.len())
            .unwrap_or(0)
    })
}

/// All pool keys this thread currently holds cached slots for. Used by the
/// registry-based reaper variant to discover what it can drain.
pub fn registered_pool_keys() -> Vec<usize> {
    CACHES.with(|caches| caches.borrow().keys().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_ptr(n: usize) -> NonNull<u8> {
        NonNull::new(n as *mut u8).unwrap()
    }

    #[test]
    fn test_fill_and_take_roundtrip() {
        let key = 0xaaaa;
        drain_all(key); // reset in case another test in this thread left state
        let incoming = vec![dummy_ptr(0x1000), dummy_ptr(0x2000), dummy_ptr(0x3000)];
        let accepted = fill_up_to(key, HIGH_WATERMARK, &incoming);
        assert_eq!(accepted, 3);
        assert_eq!(len(key), 3);

        let mut out = Vec::new();
        let taken = take_up_to(key, 2, &mut out);
        assert_eq!(taken, 2);
        assert_eq!(len(key), 1);
        drain_all(key);
    }

    #[test]
    fn test_drain_excess_respects_watermark() {
        let key = 0xbbbb;
        drain_all(key);
        let incoming: Vec<NonNull<u8>> = (1..=10).map(dummy_ptr).collect();
        fill_up_to(key, 1000, &incoming);
        assert_eq!(len(key), 10);
        let excess = drain_excess(key, 6);
        assert_eq!(excess.len(), 4);
        assert_eq!(len(key), 6);
        drain_all(key);
    }

    #[test]
    fn test_distinct_pool_keys_do_not_cross_contaminate() {
        let key_a = 0xcccc;
        let key_b = 0xdddd;
        drain_all(key_a);
        drain_all(key_b);
        fill_up_to(key_a, HIGH_WATERMARK, &[dummy_ptr(1)]);
        fill_up_to(key_b, HIGH_WATERMARK, &[dummy_ptr(2), dummy_ptr(3)]);
        assert_eq!(len(key_a), 1);
        assert_eq!(len(key_b), 2);
        drain_all(key_a);
        drain_all(key_b);
    }
}
