//! Error types for the segregated pool allocator.
//!
//! Uses thiserror for clean, idiomatic Rust error definitions. Every error
//! is local to the request that produced it: the pool's buckets remain
//! usable after any reported failure.

use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::{error, warn};

// ============================================================================
// Main Error Type
// ============================================================================

/// Errors reported by the pool allocator.
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// No configured size class is large enough for the request.
    #[error("request for {requested} bytes exceeds largest size class ({largest} bytes)")]
    OversizeRequest { requested: usize, largest: usize },

    /// The system allocator refused a growth request.
    #[error("system allocator refused {size} bytes with {align} byte alignment")]
    OutOfMemory { size: usize, align: usize },

    /// A deallocated pointer does not belong to the size class selected
    /// for its stated size.
    #[error("pointer {addr:#x} is not a block of the {block_size}-byte size class")]
    ForeignPointer { addr: usize, block_size: usize },

    /// Element count times element size overflowed `usize`.
    #[error("size overflow: {count} elements of {elem_size} bytes")]
    SizeOverflow { count: usize, elem_size: usize },

    /// Construction-time configuration validation failed.
    #[error("invalid pool configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl PoolError {
    /// Check if the error can succeed on retry after freeing blocks.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }

    /// Stable error code for categorization.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::OversizeRequest { .. } => "POOL:REQUEST:OVERSIZE",
            Self::OutOfMemory { .. } => "POOL:GROW:OOM",
            Self::ForeignPointer { .. } => "POOL:RELEASE:FOREIGN",
            Self::SizeOverflow { .. } => "POOL:REQUEST:OVERFLOW",
            Self::InvalidConfig { .. } => "POOL:CONFIG:INVALID",
        }
    }

    // ------------------------------------------------------------------
    // Convenience constructors
    // ------------------------------------------------------------------

    /// Create an oversize request error.
    pub fn oversize_request(requested: usize, largest: usize) -> Self {
        #[cfg(feature = "logging")]
        warn!(requested, largest, "request exceeds largest size class");

        Self::OversizeRequest { requested, largest }
    }

    /// Create an out of memory error.
    pub fn out_of_memory(size: usize, align: usize) -> Self {
        #[cfg(feature = "logging")]
        error!(size, align, "system allocator refused growth request");

        Self::OutOfMemory { size, align }
    }

    /// Create a foreign pointer error.
    pub fn foreign_pointer(addr: usize, block_size: usize) -> Self {
        #[cfg(feature = "logging")]
        warn!(
            addr,
            block_size, "pointer does not belong to selected size class"
        );

        Self::ForeignPointer { addr, block_size }
    }

    /// Create a size overflow error.
    #[must_use]
    pub fn size_overflow(count: usize, elem_size: usize) -> Self {
        Self::SizeOverflow { count, elem_size }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// Result type for pool operations.
pub type PoolResult<T> = core::result::Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PoolError::oversize_request(512, 256);
        assert!(err.to_string().contains("512"));
        assert!(err.to_string().contains("256"));

        let err = PoolError::foreign_pointer(0xDEAD, 64);
        assert!(err.to_string().contains("0xdead"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            PoolError::oversize_request(512, 256).code(),
            "POOL:REQUEST:OVERSIZE"
        );
        assert_eq!(PoolError::out_of_memory(4096, 16).code(), "POOL:GROW:OOM");
        assert_eq!(
            PoolError::invalid_config("empty class table").code(),
            "POOL:CONFIG:INVALID"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(PoolError::out_of_memory(4096, 16).is_retryable());
        assert!(!PoolError::oversize_request(512, 256).is_retryable());
        assert!(!PoolError::foreign_pointer(0xBEEF, 8).is_retryable());
    }
}
