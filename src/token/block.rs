// src/token/block.rs
//! Token blocks: fixed-size (1024-token) chunks linked into a growth
//! stack. A block's `used` counter is a monotonic bump-allocation cursor;
//! blocks are never individually freed except at allocator cleanup.

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicUsize, Ordering as StdOrdering};

use super::kinds::{Span, TokenKind};
use super::token::{Token, TokenPayload};

/// Tokens per block.
pub const TOKENS_PER_BLOCK: usize = 1024;

/// A cache-line aligned header for one block of `TOKENS_PER_BLOCK` tokens.
#[repr(align(64))]
pub(crate) struct TokenBlock {
    tokens: NonNull<Token>,
    layout: Layout,
    pub used: AtomicUsize,
    pub prev: *mut TokenBlock,
}

// SAFETY: `tokens` and `prev` are only mutated through the allocator's own
// atomics; the block's contents (individual `Token`s) carry their own
// synchronization via `link`.
unsafe impl Send for TokenBlock {}
unsafe impl Sync for TokenBlock {}

impl TokenBlock {
    /// Allocates and zero-initializes a new block, linking `prev` as the
    /// block that was the active top of the stack before this one.
    /// Returns `None` if the backing allocation fails.
    pub fn new(prev: *mut TokenBlock) -> Option<Box<TokenBlock>> {
        let layout = Layout::array::<Token>(TOKENS_PER_BLOCK).ok()?;
        let raw = unsafe { alloc::alloc(layout) } as *mut Token;
        let tokens = NonNull::new(raw)?;
        for i in 0..TOKENS_PER_BLOCK {
            unsafe {
                ptr::write(
                    tokens.as_ptr().add(i),
                    Token::blank_with_span(TokenKind::Eof, Span::default(), TokenPayload::None),
                );
            }
        }
        Some(Box::new(TokenBlock {
            tokens,
            layout,
            used: AtomicUsize::new(0),
            prev,
        }))
    }

    /// Bump-allocates the next token slot in this block. `Ok` carries the
    /// freshly claimed slot; `Err` carries the pre-increment index so the
    /// caller can tell whether it is the unique thread that pushed the
    /// block from "has room" to "exhausted" (`idx == TOKENS_PER_BLOCK`,
    /// guaranteed to occur for exactly one `fetch_add` per block since the
    /// counter only ever advances) and must therefore grow the stack.
    pub fn bump_alloc(&self) -> Result<NonNull<Token>, usize> {
        let idx = self.used.fetch_add(1, StdOrdering::Relaxed);
        if idx < TOKENS_PER_BLOCK {
            Ok(unsafe { NonNull::new_unchecked(self.tokens.as_ptr().add(idx)) })
        } else {
            Err(idx)
        }
    }
}

impl Drop for TokenBlock {
    fn drop(&mut self) {
        unsafe {
            for i in 0..TOKENS_PER_BLOCK {
                ptr::drop_in_place(self.tokens.as_ptr().add(i));
            }
            alloc::dealloc(self.tokens.as_ptr() as *mut u8, self.layout);
        }
    }
}
