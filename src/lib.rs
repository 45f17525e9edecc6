//! # strata-index
//!
//! Embedded single-property schema index with a typed predicate algebra,
//! snapshot-isolated readers, and cancellable statistics sampling.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strata::{Config, IndexAccessor, IndexUpdateMode, Predicate};
//!
//! // Open or create an index
//! let accessor = IndexAccessor::open("./age.idx", Config::default())?;
//!
//! // Apply a transaction's worth of updates atomically
//! let mut updater = accessor.new_updater(IndexUpdateMode::Online)?;
//! updater.add(1, 35.0)?;
//! updater.add(2, 42.0)?;
//! updater.close()?;
//!
//! // Query a pinned snapshot
//! let reader = accessor.new_reader()?;
//! let ids: Vec<_> = reader
//!     .query(&[Predicate::numeric_range(0, Some(30.0), true, Some(40.0), true)])?
//!     .collect();
//! assert_eq!(ids, vec![1]);
//!
//! // Gather statistics
//! let sample = reader.create_sampler()?.sample_index()?;
//!
//! // Tear down: drains samplers, then deletes the store
//! accessor.drop_index()?;
//! ```
//!
//! ## Key Concepts
//!
//! ### Predicates
//!
//! A [`Predicate`] describes one condition over a single indexed
//! property: existence, exact value, numeric or string range, or a
//! literal prefix/suffix/contains match on text. Numeric comparisons use
//! IEEE-754 total order, so `NaN` is a real, queryable value that sorts
//! above every number.
//!
//! ### Snapshots
//!
//! Every [`IndexReader`] pins the committed state at its creation.
//! Repeating a query on one reader always returns the same ids; two
//! readers created around a commit see different generations. Snapshots
//! survive later commits and even [`IndexAccessor::drop_index`].
//!
//! ### Sampling vs. drop
//!
//! An [`IndexSampler`] scans its snapshot in batches and checks a
//! cancellation flag between batches. `drop_index` flips that flag,
//! waits for every sampler to notice, and only then destroys the store.
//! An overtaken sampler fails with
//! [`StrataError::DroppedWhileSampling`].
//!
//! ## Thread Safety
//!
//! [`IndexAccessor`] is `Send + Sync` and can be shared across threads
//! using `Arc`. The backend uses MVCC for concurrent reads with
//! exclusive write locking.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod accessor;
mod config;
mod error;
mod types;

pub mod backend;

// Query path
mod predicate;
mod query;
mod reader;

// Write path and lifecycle
mod sampler;
mod task;
mod updater;

// ============================================================================
// Public API re-exports
// ============================================================================

// Main index interface
pub use accessor::IndexAccessor;

// Configuration
pub use config::{Config, SamplingConfig};

// Error handling
pub use error::{Result, StorageError, StrataError};

// Core types
pub use types::{EntityId, IndexEntry, PropertyKeyId, PropertyValue, Timestamp};

// Query path
pub use predicate::Predicate;
pub use query::BackendQuery;
pub use reader::{EntityIds, IndexReader};

// Write path and lifecycle
pub use sampler::{IndexSample, IndexSampler};
pub use task::{TaskControl, TaskCoordinator};
pub use updater::{EntryUpdate, IndexUpdateMode, IndexUpdater};

// Storage (for advanced users)
pub use backend::IndexMetadata;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common strata usage.
///
/// ```rust
/// use strata::prelude::*;
/// ```
pub mod prelude {
    pub use crate::accessor::IndexAccessor;
    pub use crate::config::Config;
    pub use crate::error::{Result, StrataError};
    pub use crate::predicate::Predicate;
    pub use crate::sampler::IndexSample;
    pub use crate::types::{EntityId, PropertyValue};
    pub use crate::updater::{EntryUpdate, IndexUpdateMode};
}
