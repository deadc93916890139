// src/token/allocator.rs
//! The growable token allocator: a specialization of the generic pool
//! discipline (ABA-safe free-list CAS) tuned for one record type, with
//! unbounded growth via a block-linked bump allocator instead of a fixed
//! capacity.
//!
//! Unlike the original C implementation this is ported from — which kept
//! `free_list`, `pool_head`, and `total_allocated` as module-level
//! `static`/`__thread` globals — `TokenAllocator` is an explicit struct
//! constructed by the caller and passed around by reference or `Arc`. That
//! global mutable state was flagged as a porting hazard in the design
//! notes for this crate; giving it an owner here removes the hazard
//! instead of reproducing it.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering as StdOrdering};

use portable_atomic::Ordering;

use super::block::{TokenBlock, TOKENS_PER_BLOCK};
use super::kinds::{CommentKind, Delimiter, DocComment, Ident, Literal, Span, TokenKind};
use super::token::{Token, TokenPayload};
use crate::tagged_ptr::{AtomicTaggedPtr, TaggedPtr};

/// Growable, block-linked, lock-free allocator for `Token` records.
pub struct TokenAllocator {
    free_list: AtomicTaggedPtr,
    block_stack: AtomicPtr<TokenBlock>,
    total_allocated: AtomicUsize,
}

impl Default for TokenAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenAllocator {
    pub fn new() -> Self {
        Self {
            free_list: AtomicTaggedPtr::new(TaggedPtr::NULL),
            block_stack: AtomicPtr::new(std::ptr::null_mut()),
            total_allocated: AtomicUsize::new(0),
        }
    }

    /// Number of tokens currently allocated (not yet freed) across every
    /// block.
    pub fn total_allocated(&self) -> usize {
        self.total_allocated.load(StdOrdering::Relaxed)
    }

    fn pop_free(&self) -> Option<NonNull<Token>> {
        loop {
            let head = self.free_list.load(Ordering::Acquire);
            if head.is_null() {
                return None;
            }
            let token_ptr = head.ptr as *mut Token;
            let next = unsafe { (*token_ptr).link().load(Ordering::Relaxed) };
            let new_head = TaggedPtr::new(next.ptr, head.ver.wrapping_add(1));
            match self
                .free_list
                .compare_exchange_weak(head, new_head, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => return Some(unsafe { NonNull::new_unchecked(token_ptr) }),
                Err(_) => continue,
            }
        }
    }

    fn push_free(&self, token: NonNull<Token>) {
        let token_ptr = token.as_ptr();
        loop {
            let head = self.free_list.load(Ordering::Relaxed);
            unsafe {
                (*token_ptr).link().store(head, Ordering::Relaxed);
            }
            let new_head = TaggedPtr::new(token_ptr as usize, head.ver.wrapping_add(1));
            match self
                .free_list
                .compare_exchange_weak(head, new_head, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(_) => continue,
            }
        }
    }

    /// Grows the block stack by one block, CAS-ing it in only if
    /// `exhausted` (the block the caller observed full) is still the
    /// current top — otherwise another thread already grew it and this
    /// thread's freshly built block is discarded.
    fn grow(&self, exhausted: *mut TokenBlock) -> bool {
        let Some(new_block) = TokenBlock::new(exhausted) else {
            return false;
        };
        let new_block = Box::into_raw(new_block);
        match self
            .block_stack
            .compare_exchange(exhausted, new_block, StdOrdering::AcqRel, StdOrdering::Acquire)
        {
            Ok(_) => true,
            Err(_) => {
                // SAFETY: we just took this pointer from Box::into_raw and no
                // other thread observed it (the CAS failed, so it was never
                // published).
                unsafe {
                    drop(Box::from_raw(new_block));
                }
                true
            }
        }
    }

    /// Allocates one token. Fast path pops the free-list (ABA-safe CAS,
    /// same discipline as [`crate::pool::Pool`]); slow path bump-allocates
    /// from the active block, growing the block stack on demand. Never
    /// fails except on a failed backing allocation during growth.
    pub fn alloc(&self) -> Option<NonNull<Token>> {
        if let Some(token) = self.pop_free() {
            self.total_allocated.fetch_add(1, StdOrdering::Relaxed);
            return Some(token);
        }

        loop {
            let mut block_ptr = self.block_stack.load(StdOrdering::Acquire);
            if block_ptr.is_null() {
                if !self.grow(block_ptr) {
                    return None;
                }
                block_ptr = self.block_stack.load(StdOrdering::Acquire);
            }
            let block = unsafe { &*block_ptr };
            match block.bump_alloc() {
                Ok(token_ptr) => {
                    self.total_allocated.fetch_add(1, StdOrdering::Relaxed);
                    return Some(token_ptr);
                }
                Err(idx) => {
                    if idx == TOKENS_PER_BLOCK && !self.grow(block_ptr) {
                        return None;
                    }
                    // Either we grew it, another thread did, or a racing
                    // fetch_add just overshot — retry against whatever the
                    // stack head is now.
                }
            }
        }
    }

    /// Releases a token back to the free-list, wiping its body first so a
    /// stray read through a dangling handle observes an inert token
    /// rather than stale payload data.
    ///
    /// # Safety
    /// `token` must have been returned by `alloc` on this allocator and
    /// not already freed.
    pub fn free(&self, mut token: NonNull<Token>) {
        unsafe {
            token.as_mut().wipe();
        }
        self.push_free(token);
        self.total_allocated.fetch_sub(1, StdOrdering::Relaxed);
    }

    /// Allocates a token and populates it as a literal.
    pub fn alloc_literal(&self, span: Span, literal: Literal) -> Option<NonNull<Token>> {
        let mut token = self.alloc()?;
        unsafe {
            let t = token.as_mut();
            t.kind = TokenKind::Literal;
            t.span = span;
            t.payload = TokenPayload::Literal(literal);
        }
        Some(token)
    }

    /// Allocates a token and populates it as an identifier.
    pub fn alloc_ident(&self, span: Span, ident: Ident) -> Option<NonNull<Token>> {
        let mut token = self.alloc()?;
        unsafe {
            let t = token.as_mut();
            t.kind = TokenKind::Ident;
            t.span = span;
            t.payload = TokenPayload::Ident(ident);
        }
        Some(token)
    }

    /// Allocates a token and populates it as a doc comment.
    pub fn alloc_doc_comment(&self, span: Span, comment_kind: CommentKind, doc: DocComment) -> Option<NonNull<Token>> {
        let mut token = self.alloc()?;
        unsafe {
            let t = token.as_mut();
            t.kind = TokenKind::DocComment(comment_kind);
            t.span = span;
            t.payload = TokenPayload::Doc(doc);
        }
        Some(token)
    }

    /// Allocates a token and populates it as an opening or closing
    /// delimiter.
    pub fn alloc_delim(&self, span: Span, delim: Delimiter, is_open: bool) -> Option<NonNull<Token>> {
        let mut token = self.alloc()?;
        unsafe {
            let t = token.as_mut();
            t.kind = if is_open {
                TokenKind::OpenDelim(delim)
            } else {
                TokenKind::CloseDelim(delim)
            };
            t.span = span;
            t.payload = TokenPayload::None;
        }
        Some(token)
    }

    /// Atomically detaches the block stack, frees every block (and hence
    /// every token in it), and resets the free-list and counters.
    /// Idempotent: calling it again on an already-empty allocator is a
    /// no-op.
    pub fn cleanup(&self) {
        let mut block_ptr = self.block_stack.swap(std::ptr::null_mut(), StdOrdering::AcqRel);
        while !block_ptr.is_null() {
            let block = unsafe { Box::from_raw(block_ptr) };
            block_ptr = block.prev;
            drop(block);
        }
        self.free_list.store(TaggedPtr::NULL, Ordering::Relaxed);
        self.total_allocated.store(0, StdOrdering::Relaxed);
    }
}

impl Drop for TokenAllocator {
    fn drop(&mut self) {
        self.cleanup();
    }
}

// SAFETY: all shared mutable state is atomic; `Token`s reachable through
// the free-list or block stack are only read/written by the thread that
// currently owns them via a successful alloc/CAS.
unsafe impl Send for TokenAllocator {}
unsafe impl Sync for TokenAllocator {}
