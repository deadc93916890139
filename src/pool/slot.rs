// src/pool/slot.rs
//! Slot layout math: every pool slot is a cache-line-aligned record whose
//! first 16 bytes are a tagged-pointer free-list link, followed by the
//! caller's payload.

use crate::tagged_ptr::{AtomicTaggedPtr, TaggedPtr};
use portable_atomic::Ordering;

/// Platform cache line size. 64 bytes on the architectures this crate
/// targets primarily (x86-64, AArch64); 128 on POWER, which historically
/// uses a wider line to amortize its larger coherence granule.
#[cfg(target_arch = "powerpc64")]
pub const CACHE_LINE_SIZE: usize = 128;
#[cfg(not(target_arch = "powerpc64"))]
pub const CACHE_LINE_SIZE: usize = 64;

/// Size in bytes of the free-list link occupying the start of every slot.
pub const LINK_SIZE: usize = std::mem::size_of::<TaggedPtr>();

#[inline]
const fn round_up(value: usize, multiple: usize) -> usize {
    (value + multiple - 1) / multiple * multiple
}

/// Total per-slot size for a pool configured with payload size `object_size`:
/// `ceil(LINK_SIZE + ceil(object_size, 16), CACHE_LINE_SIZE)`.
#[inline]
pub const fn slot_size(object_size: usize) -> usize {
    round_up(LINK_SIZE + round_up(object_size, 16), CACHE_LINE_SIZE)
}

/// Byte offset from a slot's base to its payload area. Equal to the link
/// field's size since the payload immediately follows it.
pub const PAYLOAD_OFFSET: usize = LINK_SIZE;

/// Recovers a slot's base address from a payload pointer the pool handed
/// out.
///
/// # Safety
/// `payload` must be a pointer this pool previously returned from `alloc`
/// or `alloc_batch` and must not have been freed.
#[inline]
pub unsafe fn slot_base_of(payload: *mut u8) -> *mut u8 {
    unsafe { payload.sub(PAYLOAD_OFFSET) }
}

/// Recovers a slot's payload pointer from its base address.
///
/// # Safety
/// `slot_base` must point at the start of a slot belonging to this pool.
#[inline]
pub unsafe fn payload_of(slot_base: *mut u8) -> *mut u8 {
    unsafe { slot_base.add(PAYLOAD_OFFSET) }
}

/// Views a slot's free-list link field as an atomic tagged pointer.
///
/// # Safety
/// `slot_base` must point at the start of a valid, live slot; the link
/// field must be 16-byte aligned (guaranteed by `slot_size`'s rounding and
/// the pool's cache-line-aligned backing allocation).
#[inline]
pub unsafe fn link_of<'a>(slot_base: *mut u8) -> &'a AtomicTaggedPtr {
    unsafe { &*(slot_base as *const AtomicTaggedPtr) }
}

/// Reads a slot's `next` field without going through the atomic wrapper's
/// public load — used by the chain-walk in batch allocation, where the
/// read is speculative and re-validated by the head CAS that follows it.
#[inline]
pub unsafe fn read_next(slot_base: *mut u8) -> TaggedPtr {
    unsafe { link_of(slot_base).load(Ordering::Relaxed) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_size_rounds_up_to_cache_line() {
        assert_eq!(slot_size(4) % CACHE_LINE_SIZE, 0);
        assert_eq!(slot_size(64) % CACHE_LINE_SIZE, 0);
        assert_eq!(slot_size(1) % CACHE_LINE_SIZE, 0);
    }

    #[test]
    fn test_slot_size_at_least_link_plus_payload() {
        assert!(slot_size(4) >= LINK_SIZE + 4);
    }

    #[test]
    fn test_payload_offset_equals_link_size() {
        assert_eq!(PAYLOAD_OFFSET, LINK_SIZE);
    }
}
