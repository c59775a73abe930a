//! # segpool
//!
//! Segregated size-class pool allocator with intrusive free lists.
//!
//! Requests are classified into fixed-size buckets queried in ascending
//! order; each bucket recycles freed blocks through an in-place free list
//! and grows by whole backing regions when exhausted. One mutex per pool
//! serializes every free-list and region mutation, so a single pool can be
//! shared across threads by reference.
//!
//! ## Quick Start
//!
//! ```
//! use segpool::SegregatedPool;
//!
//! let pool = SegregatedPool::new()?;
//!
//! // Scoped lease: the block returns to the pool at the end of scope,
//! // on every exit path.
//! let mut buf = pool.lease(100)?;
//! buf[..5].copy_from_slice(b"hello");
//!
//! // Raw contract: the caller pairs allocate with deallocate.
//! let ptr = pool.allocate(16)?;
//! unsafe { pool.deallocate(ptr, 16)? };
//! # Ok::<(), segpool::PoolError>(())
//! ```
//!
//! ## Features
//!
//! - `logging` (default): growth events and rejected requests emitted via
//!   `tracing`
//! - `stats` (default): atomic operation counters on each pool
//!
//! ## Contract
//!
//! Deallocation takes the size originally requested; it is how the owning
//! bucket is rediscovered. Sizes are trusted the way manual allocators
//! trust them: a mismatch that routes to the wrong bucket is caught by the
//! bucket's region-membership check, while a mismatch that still routes to
//! the owning bucket (and any double release) is undefined behavior the
//! pool does not detect. [`SegregatedPool::lease`] wraps the whole contract
//! in RAII for callers that do not need raw pointers.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(clippy::all)]
#![warn(clippy::perf)]
#![warn(rust_2018_idioms)]
// Error conditions are documented on the error type itself
#![allow(clippy::missing_errors_doc)]
// Casting a block pointer to its in-place free-list link is the point of an
// intrusive list; alignment is guaranteed by config validation
#![allow(clippy::cast_ptr_alignment)]

mod class;
mod region;

pub mod config;
pub mod error;
pub mod lease;
pub mod pool;
#[cfg(feature = "stats")]
#[cfg_attr(docsrs, doc(cfg(feature = "stats")))]
pub mod stats;
pub mod utils;

// Re-export the primary types at the crate root
pub use crate::config::{ClassConfig, MIN_BLOCK_SIZE, PoolConfig, REGION_ALIGN};
pub use crate::error::{PoolError, PoolResult};
pub use crate::lease::BlockLease;
pub use crate::pool::{ClassUsage, SegregatedPool};
#[cfg(feature = "stats")]
pub use crate::stats::PoolStats;

pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::config::{ClassConfig, PoolConfig};
    pub use crate::error::{PoolError, PoolResult};
    pub use crate::lease::BlockLease;
    pub use crate::pool::{ClassUsage, SegregatedPool};
    #[cfg(feature = "stats")]
    pub use crate::stats::PoolStats;
}
