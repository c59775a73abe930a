//! Pool allocator configuration.

use crate::error::{PoolError, PoolResult};

/// Smallest permitted block size in bytes.
///
/// A free block stores its list link in its first word, so every block must
/// be able to hold (and align) one `usize`.
pub const MIN_BLOCK_SIZE: usize = 8;

/// Alignment of every backing region, in bytes.
pub const REGION_ALIGN: usize = 16;

/// One size class: how many blocks to pre-carve and how large each block is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassConfig {
    /// Blocks carved at construction. Zero makes the class lazy: its first
    /// request triggers growth with a floor of one block.
    pub initial_blocks: usize,
    /// Bytes per block, fixed for the pool's lifetime.
    pub block_size: usize,
}

impl ClassConfig {
    /// Shorthand for `(initial_blocks, block_size)`.
    #[must_use]
    pub const fn new(initial_blocks: usize, block_size: usize) -> Self {
        Self {
            initial_blocks,
            block_size,
        }
    }
}

/// Configuration for a [`SegregatedPool`](crate::pool::SegregatedPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Size classes in ascending block-size order.
    pub classes: Vec<ClassConfig>,

    /// Blocks added per growth event, as a multiple of the class's current
    /// capacity (floor of one block for empty classes). One means each
    /// growth doubles the class.
    pub growth_factor: usize,

    /// Fill pattern byte for newly acquired blocks (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for released blocks (for debugging)
    pub dealloc_pattern: Option<u8>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            classes: vec![
                ClassConfig::new(64, 8),
                ClassConfig::new(64, 16),
                ClassConfig::new(32, 32),
                ClassConfig::new(32, 64),
                ClassConfig::new(16, 128),
                ClassConfig::new(16, 256),
            ],
            growth_factor: 1,
            alloc_pattern: if cfg!(debug_assertions) {
                Some(0xBB)
            } else {
                None
            },
            dealloc_pattern: if cfg!(debug_assertions) {
                Some(0xDD)
            } else {
                None
            },
        }
    }
}

impl PoolConfig {
    /// Default class table with custom classes.
    #[must_use]
    pub fn with_classes(classes: Vec<ClassConfig>) -> Self {
        Self {
            classes,
            ..Default::default()
        }
    }

    /// Production configuration - no fill patterns, default class table.
    #[must_use]
    pub fn production() -> Self {
        Self {
            alloc_pattern: None,
            dealloc_pattern: None,
            ..Default::default()
        }
    }

    /// Debug configuration - fill patterns always on.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            alloc_pattern: Some(0xBB),
            dealloc_pattern: Some(0xDD),
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// Block sizes must be strictly increasing, each at least
    /// [`MIN_BLOCK_SIZE`] and a multiple of it; `growth_factor` must be
    /// non-zero; the class table must be non-empty.
    pub fn validate(&self) -> PoolResult<()> {
        if self.classes.is_empty() {
            return Err(PoolError::invalid_config("class table is empty"));
        }
        if self.growth_factor == 0 {
            return Err(PoolError::invalid_config("growth factor must be non-zero"));
        }

        let mut previous = 0usize;
        for class in &self.classes {
            if class.block_size < MIN_BLOCK_SIZE {
                return Err(PoolError::invalid_config(format!(
                    "block size {} is below the {MIN_BLOCK_SIZE}-byte minimum",
                    class.block_size
                )));
            }
            if class.block_size % MIN_BLOCK_SIZE != 0 {
                return Err(PoolError::invalid_config(format!(
                    "block size {} is not a multiple of {MIN_BLOCK_SIZE}",
                    class.block_size
                )));
            }
            if class.block_size <= previous {
                return Err(PoolError::invalid_config(format!(
                    "block sizes must be strictly increasing ({} after {})",
                    class.block_size, previous
                )));
            }
            previous = class.block_size;
        }

        Ok(())
    }
}
