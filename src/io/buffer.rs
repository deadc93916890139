// src/io/buffer.rs
//! Double-buffered, memory-mapped input reader.

use std::alloc::{self, Layout};
use std::fs::File;
use std::path::Path;
use std::ptr::NonNull;

use memmap2::{Advice, Mmap, MmapOptions};

use super::simd::SimdLevel;
use crate::error::{ReaderError, ReaderResult};

/// Scratch buffer size: 2 MiB, matching the original's page-aligned refill
/// chunk.
pub const BUFFER_SIZE: usize = 2 << 20;

/// Alignment for the reader's scratch buffers: 4 KiB, matching the
/// original's `#define ALIGNMENT 4096` and its `aligned_alloc(ALIGNMENT,
/// size)` call in `buffer_alloc`.
const PAGE_ALIGN: usize = 4096;

/// A cache-page-aligned scratch buffer, allocated directly (not through
/// `Vec`, whose `Box<[u8]>` only guarantees 1-byte alignment) so the
/// data-model invariant in spec.md §3 ("two cache-page-aligned scratch
/// buffers") actually holds. Mirrors the raw `NonNull<u8>` + `Layout`
/// ownership already used for the pool's backing region
/// (`src/pool/pool.rs`) and token blocks (`src/token/block.rs`).
struct ScratchBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl ScratchBuffer {
    fn new(len: usize) -> Self {
        let layout = Layout::from_size_align(len, PAGE_ALIGN).expect("invalid scratch buffer layout");
        // SAFETY: layout has non-zero size (len == BUFFER_SIZE) and valid alignment.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(layout));

        // Matches the original's buffer_alloc: madvise(ptr, size,
        // MADV_SEQUENTIAL | MADV_WILLNEED) on the page-aligned scratch
        // region itself, not just the mmap.
        #[cfg(unix)]
        unsafe {
            let rc = libc::madvise(
                ptr.as_ptr() as *mut libc::c_void,
                len,
                libc::MADV_SEQUENTIAL | libc::MADV_WILLNEED,
            );
            if rc != 0 {
                log::warn!("madvise on scratch buffer failed: {}", std::io::Error::last_os_error());
            }
        }

        Self { ptr, layout }
    }

    #[inline]
    fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` is valid for `layout.size()` bytes for the life of `self`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }

    #[inline]
    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: `ptr` is valid for `layout.size()` bytes for the life of `self`.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for ScratchBuffer {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`layout` are exactly what `alloc_zeroed` returned.
        unsafe {
            alloc::dealloc(self.ptr.as_ptr(), self.layout);
        }
    }
}

// SAFETY: a `ScratchBuffer` owns its allocation exclusively; no aliasing
// pointers are handed out beyond the borrow-checked slice views above.
unsafe impl Send for ScratchBuffer {}

/// Streams a memory-mapped source file to the lexer one byte at a time,
/// refilling two alternating 2 MiB scratch buffers off the consumer's
/// critical path, plus a bulk [`process_buffer`] scan for whitespace.
///
/// [`process_buffer`]: InputReader::process_buffer
pub struct InputReader {
    _file: File,
    mmap: Option<Mmap>,
    file_size: usize,
    file_offset: usize,
    buffers: [ScratchBuffer; 2],
    active_buf: usize,
    front_idx: usize,
    back_idx: usize,
    simd_level: SimdLevel,
}

impl InputReader {
    /// Opens and memory-maps `path`, then primes buffer 0 with the first
    /// `min(file_size, BUFFER_SIZE)` bytes.
    pub fn open<P: AsRef<Path>>(path: P) -> ReaderResult<Self> {
        let file = File::open(path).map_err(ReaderError::Io)?;
        let metadata = file.metadata().map_err(ReaderError::Io)?;
        let file_size = metadata.len() as usize;

        // A zero-length file cannot be mapped (most platforms reject a
        // zero-size mmap outright); treat it as an immediate-EOF reader
        // with no mapping rather than failing construction.
        let mmap = if file_size == 0 {
            None
        } else {
            // SAFETY: the file is not expected to be mutated by another
            // process while mapped; this matches the original's
            // read-only, whole-file mapping contract.
            let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(ReaderError::Mmap)?;
            let _ = mmap.advise(Advice::Sequential);
            let _ = mmap.advise(Advice::WillNeed);
            Some(mmap)
        };

        let mut buffers = [ScratchBuffer::new(BUFFER_SIZE), ScratchBuffer::new(BUFFER_SIZE)];

        let first_chunk = file_size.min(BUFFER_SIZE);
        if let Some(mmap) = &mmap {
            buffers[0].as_mut_slice()[..first_chunk].copy_from_slice(&mmap[..first_chunk]);
        }

        Ok(Self {
            _file: file,
            mmap,
            file_size,
            file_offset: first_chunk,
            buffers,
            active_buf: 0,
            front_idx: first_chunk,
            back_idx: 0,
            simd_level: SimdLevel::detect(),
        })
    }

    /// Total size of the mapped file in bytes.
    pub fn file_size(&self) -> usize {
        self.file_size
    }

    /// Bytes consumed from the mapping so far (across both refills and
    /// `next_char` reads from the active buffer).
    pub fn file_offset(&self) -> usize {
        self.file_offset
    }

    /// Returns the next byte, or `None` at end of file.
    ///
    /// If the active buffer still has unread bytes (`back_idx < front_idx`)
    /// returns the next one directly. Otherwise refills the *inactive*
    /// buffer from the mapping, flips which buffer is active, and recurses
    /// once.
    pub fn next_char(&mut self) -> Option<u8> {
        if self.back_idx < self.front_idx {
            let b = self.buffers[self.active_buf].as_slice()[self.back_idx];
            self.back_idx += 1;
            return Some(b);
        }

        if self.file_offset >= self.file_size {
            return None;
        }

        let refill_len = (self.file_size - self.file_offset).min(BUFFER_SIZE);
        let inactive = 1 - self.active_buf;
        let mmap = self.mmap.as_ref().expect("refill requested on a mapping-less reader");
        self.buffers[inactive].as_mut_slice()[..refill_len]
            .copy_from_slice(&mmap[self.file_offset..self.file_offset + refill_len]);

        self.active_buf = inactive;
        self.front_idx = refill_len;
        self.back_idx = 0;
        self.file_offset += refill_len;

        self.next_char()
    }

    /// Bulk-scans the currently active buffer's unread region
    /// (`[back_idx, front_idx)`) for ASCII spaces, returning their
    /// positions relative to the start of that region.
    pub fn process_buffer(&self) -> Vec<u32> {
        let active = &self.buffers[self.active_buf].as_slice()[self.back_idx..self.front_idx];
        self.simd_level.process_buffer(active)
    }

    /// Which SIMD implementation this reader dispatched to at construction.
    pub fn simd_level(&self) -> SimdLevel {
        self.simd_level
    }
}
