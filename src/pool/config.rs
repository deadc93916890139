// src/pool/config.rs
//! Configuration for constructing a [`crate::pool::Pool`].

/// Parameters for [`crate::pool::Pool::new`].
///
/// `object_size` and `capacity` are the only two values the pool's layout
/// depends on; presets below are convenience constructors for slot sizes
/// this crate's callers (a lexer's token/span/small-struct allocators)
/// commonly reach for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Payload size in bytes of each slot. Must be non-zero.
    pub object_size: usize,
    /// Number of slots the pool's backing region holds. Fixed for the
    /// pool's lifetime; must be non-zero.
    pub capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            object_size: 64,
            capacity: 4096,
        }
    }
}

impl PoolConfig {
    pub fn new(object_size: usize, capacity: usize) -> Self {
        Self { object_size, capacity }
    }

    /// Small fixed-size records (e.g. a `Span` or a small enum tag) at high
    /// slot counts.
    pub fn small_objects() -> Self {
        Self {
            object_size: 16,
            capacity: 65536,
        }
    }

    /// Token-sized payloads at a capacity matching one token block; callers
    /// needing unbounded growth should use
    /// [`crate::token::TokenAllocator`](crate::token::TokenAllocator)
    /// instead of a bare `Pool`.
    pub fn token_sized() -> Self {
        Self {
            object_size: 64,
            capacity: 1024,
        }
    }

    /// Larger slots (e.g. a small AST node) at a moderate capacity.
    pub fn large_objects() -> Self {
        Self {
            object_size: 256,
            capacity: 8192,
        }
    }
}
