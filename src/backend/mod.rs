//! Search backend abstractions for strata-index.
//!
//! This module provides a trait-based abstraction over the engine that
//! physically stores postings and executes translated queries, allowing
//! different backends to be used (redb in production, alternatives for
//! testing).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    IndexAccessor                          │
//! │                         │                                 │
//! │                         ▼                                 │
//! │              ┌─────────────────────┐                     │
//! │              │   SearchBackend     │  ← Trait            │
//! │              └─────────────────────┘                     │
//! │                         │ snapshot()                      │
//! │                         ▼                                 │
//! │              ┌─────────────────────┐                     │
//! │              │   PartitionView     │  ← one immutable    │
//! │              └─────────────────────┘     generation      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`PartitionView`] is immutable for its whole lifetime: commits that
//! happen after `snapshot()` are never visible through it. This is what
//! gives readers their repeatable-read guarantee without copying data.

pub mod redb;
pub mod schema;

pub use self::redb::RedbBackend;
pub use schema::{IndexMetadata, SCHEMA_VERSION};

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::query::BackendQuery;
use crate::types::{EntityId, IndexEntry};
use crate::updater::EntryUpdate;

/// Search backend contract.
///
/// Implementations must be `Send + Sync`; the accessor shares one
/// backend between all readers and updaters.
pub trait SearchBackend: Send + Sync {
    /// Captures an immutable view of the current committed state.
    ///
    /// # Errors
    ///
    /// Fails with `StrataError::IndexDropped` once the backend has been
    /// destroyed.
    fn snapshot(&self) -> Result<Arc<dyn PartitionView>>;

    /// Applies one ordered batch of updates atomically.
    ///
    /// Either every update in the batch becomes visible to snapshots
    /// taken afterwards, or none do. Snapshots taken before the commit
    /// are unaffected.
    fn commit(&self, batch: &[EntryUpdate]) -> Result<()>;

    /// Destroys the backend and deletes its backing storage.
    ///
    /// Safe to call more than once. Snapshots taken before destruction
    /// remain readable; new snapshots and commits fail with
    /// `StrataError::IndexDropped`.
    fn destroy(&self) -> Result<()>;

    /// Returns the path to the index file, if applicable.
    fn path(&self) -> Option<&Path>;
}

/// One immutable generation of the index.
///
/// Views are cheap to share (`Arc`) between a reader and the samplers it
/// creates, and stay readable even after the backend is destroyed.
pub trait PartitionView: Send + Sync {
    /// Executes a translated query, returning matching entity ids.
    ///
    /// An entity id appears once per matching entry, so an entity with
    /// several matching values occurs several times.
    fn search(&self, query: &BackendQuery) -> Result<Vec<EntityId>>;

    /// Total-hit-count collection mode: counts matching entries without
    /// materializing ids.
    fn total_hits(&self, query: &BackendQuery) -> Result<u64>;

    /// Lazily iterates every entry in this view, in storage order.
    ///
    /// Each step does a bounded amount of work, which is what lets a
    /// sampler interleave cancellation checks with the scan.
    fn entries(&self) -> Result<Box<dyn Iterator<Item = Result<IndexEntry>> + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::tempdir;

    #[test]
    fn test_backend_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RedbBackend>();
    }

    #[test]
    fn test_snapshot_is_shareable() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("idx.db"), &Config::default()).unwrap();

        let view = backend.snapshot().unwrap();
        let clone = Arc::clone(&view);
        assert_eq!(clone.total_hits(&BackendQuery::MatchAll).unwrap(), 0);
    }
}
