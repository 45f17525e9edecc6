//! Snapshot-isolated index readers.
//!
//! An [`IndexReader`] wraps one immutable partition view taken at
//! creation time. Every query it serves sees exactly that generation of
//! the index, no matter how many batches are committed afterwards. Two
//! readers created around a commit therefore legitimately disagree, and
//! one reader repeating a query always gets the same answer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::backend::PartitionView;
use crate::config::Config;
use crate::error::{Result, StrataError};
use crate::predicate::Predicate;
use crate::query::{translate, BackendQuery};
use crate::sampler::IndexSampler;
use crate::task::TaskCoordinator;
use crate::types::{EntityId, PropertyValue};

/// Entity ids produced by one query, in storage order.
///
/// A thin iterator over the hit set. `len` reports how many ids remain.
#[derive(Debug)]
pub struct EntityIds {
    inner: std::vec::IntoIter<EntityId>,
}

impl EntityIds {
    fn new(hits: Vec<EntityId>) -> Self {
        Self {
            inner: hits.into_iter(),
        }
    }

    /// Number of ids not yet consumed.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True if no ids remain.
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }
}

impl Iterator for EntityIds {
    type Item = EntityId;

    fn next(&mut self) -> Option<EntityId> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for EntityIds {}

/// Read handle over one pinned index snapshot.
///
/// Created by [`IndexAccessor::new_reader`](crate::IndexAccessor::new_reader).
/// Cheap to create; hold one per logical transaction and close it when
/// the transaction ends.
pub struct IndexReader {
    view: Arc<dyn PartitionView>,
    coordinator: Arc<TaskCoordinator>,
    config: Config,
    closed: AtomicBool,
}

impl IndexReader {
    pub(crate) fn new(
        view: Arc<dyn PartitionView>,
        coordinator: Arc<TaskCoordinator>,
        config: Config,
    ) -> Self {
        Self {
            view,
            coordinator,
            config,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StrataError::ReaderClosed);
        }
        Ok(())
    }

    /// Runs a predicate query against this reader's snapshot.
    ///
    /// Exactly one predicate is supported per query; composite queries
    /// fail with an unsupported-query error before touching storage.
    #[instrument(skip(self, predicates), fields(predicates = predicates.len()))]
    pub fn query(&self, predicates: &[Predicate]) -> Result<EntityIds> {
        self.ensure_open()?;
        let query = translate(predicates)?;
        let hits = self.view.search(&query)?;
        debug!(hits = hits.len(), "Query executed");
        Ok(EntityIds::new(hits))
    }

    /// Counts entries that index the given entity under exactly the
    /// given value. Used for uniqueness verification.
    pub fn count_exact_matches(&self, entity_id: EntityId, value: &PropertyValue) -> Result<u64> {
        self.ensure_open()?;
        let query = BackendQuery::exact_match_count(entity_id, value);
        self.view.total_hits(&query)
    }

    /// Creates a sampler over this reader's snapshot.
    ///
    /// The sampler registers with the accessor's task coordinator, so it
    /// is refused once an index drop has begun draining.
    pub fn create_sampler(&self) -> Result<IndexSampler> {
        self.ensure_open()?;
        let task = self.coordinator.register()?;
        Ok(IndexSampler::new(
            Arc::clone(&self.view),
            task,
            &self.config.sampling,
            self.config.unique,
        ))
    }

    /// Closes the reader. Idempotent; later operations fail with
    /// [`StrataError::ReaderClosed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for IndexReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexReader")
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RedbBackend, SearchBackend};
    use crate::updater::EntryUpdate;
    use tempfile::tempdir;

    fn reader_over(backend: &RedbBackend) -> IndexReader {
        IndexReader::new(
            backend.snapshot().unwrap(),
            Arc::new(TaskCoordinator::new()),
            Config::default(),
        )
    }

    fn seeded_backend(dir: &tempfile::TempDir) -> RedbBackend {
        let backend = RedbBackend::open(dir.path().join("t.db"), &Config::default()).unwrap();
        backend
            .commit(&[
                EntryUpdate::Add {
                    entity_id: 1,
                    value: PropertyValue::text("a"),
                },
                EntryUpdate::Add {
                    entity_id: 2,
                    value: PropertyValue::text("b"),
                },
            ])
            .unwrap();
        backend
    }

    #[test]
    fn test_query_returns_matching_ids() {
        let dir = tempdir().unwrap();
        let backend = seeded_backend(&dir);
        let reader = reader_over(&backend);

        let ids: Vec<_> = reader.query(&[Predicate::exact(0, "a")]).unwrap().collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_composite_query_rejected() {
        let dir = tempdir().unwrap();
        let backend = seeded_backend(&dir);
        let reader = reader_over(&backend);

        let err = reader
            .query(&[Predicate::exists(0), Predicate::exact(0, "a")])
            .unwrap_err();
        assert!(err.is_unsupported_query());
    }

    #[test]
    fn test_closed_reader_refuses_everything() {
        let dir = tempdir().unwrap();
        let backend = seeded_backend(&dir);
        let reader = reader_over(&backend);

        reader.close();
        reader.close();

        assert!(matches!(
            reader.query(&[Predicate::exists(0)]).unwrap_err(),
            StrataError::ReaderClosed
        ));
        assert!(matches!(
            reader
                .count_exact_matches(1, &PropertyValue::text("a"))
                .unwrap_err(),
            StrataError::ReaderClosed
        ));
        assert!(matches!(
            reader.create_sampler().unwrap_err(),
            StrataError::ReaderClosed
        ));
    }

    #[test]
    fn test_count_exact_matches() {
        let dir = tempdir().unwrap();
        let backend = seeded_backend(&dir);
        backend
            .commit(&[EntryUpdate::Add {
                entity_id: 1,
                value: PropertyValue::text("a"),
            }])
            .unwrap();

        let reader = reader_over(&backend);
        assert_eq!(
            reader
                .count_exact_matches(1, &PropertyValue::text("a"))
                .unwrap(),
            2
        );
        assert_eq!(
            reader
                .count_exact_matches(1, &PropertyValue::text("b"))
                .unwrap(),
            0
        );
        assert_eq!(
            reader
                .count_exact_matches(2, &PropertyValue::text("a"))
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_entity_ids_len() {
        let dir = tempdir().unwrap();
        let backend = seeded_backend(&dir);
        let reader = reader_over(&backend);

        let mut ids = reader.query(&[Predicate::exists(0)]).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(!ids.is_empty());
        ids.next();
        assert_eq!(ids.len(), 1);
    }
}
