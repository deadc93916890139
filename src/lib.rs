// src/lib.rs
//! # north-core
//!
//! Allocation and I/O substrate for a lexical-analysis front-end: a
//! lock-free, cache-line-aligned, fixed-capacity object pool with a
//! thread-local free cache; its specialization as a growable token
//! allocator; a symbol interner; and a double-buffered, memory-mapped input
//! reader with SIMD whitespace scanning.
//!
//! The hard part is the pool (`pool`): it must serve allocations across many
//! threads with no global lock, defeat ABA on its free-list via a
//! tagged-pointer CAS (`tagged_ptr`), and guarantee reclaimed slots are
//! never double-freed or leaked. The token allocator (`token`) is the same
//! discipline specialized to one record type with block-growth on demand.
//! The input reader (`io`) streams source bytes off the consumer's critical
//! path. A background reaper (`reaper`) drains idle thread-local caches.
//!
//! The lexer proper, the AST/nonterminal model, and CLI entry points are
//! deliberately out of scope; this crate is the substrate they are built on.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::missing_safety_doc)]

pub mod error;
pub mod io;
pub mod pool;
pub mod reaper;
pub mod symbol;
pub mod tagged_ptr;
pub mod token;

pub use error::{PoolError, ReaderError, ReaderResult, Result};
pub use io::{InputReader, SimdLevel, BUFFER_SIZE};
pub use pool::{Pool, PoolConfig, PoolStats};
pub use reaper::Reaper;
pub use symbol::{SymbolHandle, SymbolTable};
pub use tagged_ptr::{AtomicTaggedPtr, TaggedPtr};
pub use token::{AttrStyle, CommentKind, Delimiter, DocComment, Ident, LitKind, LitValue, Literal, Span, Token, TokenAllocator, TokenKind, TokenPayload};

/// Commonly used imports.
pub mod prelude {
    pub use crate::error::{PoolError, ReaderError, ReaderResult, Result};
    pub use crate::io::InputReader;
    pub use crate::pool::{Pool, PoolConfig, PoolStats};
    pub use crate::reaper::Reaper;
    pub use crate::symbol::{SymbolHandle, SymbolTable};
    pub use crate::token::{Span, Token, TokenAllocator, TokenKind};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_pool_alloc_free_round_trip() {
        let pool = Pool::new(4, 100).unwrap();
        let p = pool.alloc().unwrap();
        pool.free(p);
        let stats = pool.stats();
        assert_eq!(stats.alloc_count, 1);
        assert_eq!(stats.free_count, 1);
    }

    #[test]
    fn test_token_allocator_and_symbol_table_together() {
        let allocator = TokenAllocator::new();
        let symbols = SymbolTable::new();
        let handle = symbols.intern(b"my_ident");
        let ident = crate::token::Ident { symbol: handle, is_raw: false };
        let token = allocator.alloc_ident(Span::new(0, 8), ident).unwrap();
        unsafe {
            assert_eq!(token.as_ref().kind, TokenKind::Ident);
        }
        allocator.free(token);
    }

    #[test]
    fn test_reaper_drains_a_shared_pool() {
        let pool = Arc::new(Pool::new(8, 16).unwrap());
        let reaper = Reaper::start(Arc::clone(&pool));
        std::thread::sleep(std::time::Duration::from_millis(5));
        reaper.stop();
    }
}
