// src/error.rs
//! Error types for the pool, token allocator, and input reader.

use std::fmt;

/// Errors raised constructing a [`crate::pool::Pool`] or [`crate::token::TokenAllocator`].
///
/// Allocation and free on the hot path never return an error: exhaustion is
/// reported as `None` (single alloc) or a short count (batch alloc). `PoolError`
/// only covers construction-time argument validation and the backing
/// allocation for the slot region failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// `object_size` or `capacity` was zero, or `object_size` was too small
    /// to hold the free-list linkage.
    InvalidArgument(&'static str),
    /// The backing allocation for the pool's slot region failed.
    AllocationFailed,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::AllocationFailed => write!(f, "allocation failed"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Result type alias for pool and token-allocator construction.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors raised by the memory-mapped [`crate::io::InputReader`].
///
/// Setup failures (open/stat/mmap/madvise) are propagated as `Err` rather
/// than aborting the process; callers that want fail-fast behavior can
/// `.unwrap_or_else(|e| { log::error!("{e}"); std::process::exit(1) })`.
#[derive(Debug)]
pub enum ReaderError {
    /// Opening, `stat`-ing, or reading the source file failed.
    Io(std::io::Error),
    /// Memory-mapping the source file failed.
    Mmap(std::io::Error),
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Mmap(e) => write!(f, "mmap failed: {}", e),
        }
    }
}

impl std::error::Error for ReaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) | Self::Mmap(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ReaderError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Result type alias for input-reader operations.
pub type ReaderResult<T> = std::result::Result<T, ReaderError>;

#[cfg(feature = "anyhow")]
impl From<PoolError> for anyhow::Error {
    fn from(err: PoolError) -> Self {
        anyhow::anyhow!("{}", err)
    }
}

#[cfg(feature = "anyhow")]
impl From<ReaderError> for anyhow::Error {
    fn from(err: ReaderError) -> Self {
        anyhow::anyhow!("{}", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_error_display() {
        let e = PoolError::InvalidArgument("capacity");
        assert_eq!(e.to_string(), "invalid argument: capacity");
    }

    #[test]
    fn test_reader_error_source() {
        use std::error::Error;
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: ReaderError = io_err.into();
        assert!(e.source().is_some());
    }

    #[test]
    fn test_allocation_failed_display() {
        assert_eq!(PoolError::AllocationFailed.to_string(), "allocation failed");
    }
}
