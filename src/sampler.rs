//! Index statistics sampling.
//!
//! A sampler walks one pinned snapshot of the index and produces an
//! [`IndexSample`]: total size, distinct value count, and how many
//! entries were actually examined. The scan can be long, so every
//! sampler is registered with the accessor's [`TaskCoordinator`] and
//! checks for cancellation between batches. A sampler overtaken by
//! `drop_index` fails with [`StrataError::DroppedWhileSampling`] rather
//! than reporting statistics for an index that no longer exists.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::backend::PartitionView;
use crate::config::SamplingConfig;
use crate::error::{Result, StrataError};
use crate::task::TaskControl;
use crate::types::PropertyValue;

/// Statistics gathered by one sampling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSample {
    /// Total number of entries in the sampled snapshot.
    pub index_size: u64,
    /// Number of distinct indexed values among the sampled entries.
    pub unique_values: u64,
    /// Number of entries examined. Equal to `index_size` for a full scan.
    pub sample_size: u64,
}

/// Single-use sampler over one index snapshot.
///
/// Created by [`IndexReader::create_sampler`](crate::IndexReader::create_sampler).
/// Consumed by [`sample_index`](Self::sample_index).
pub struct IndexSampler {
    view: Arc<dyn PartitionView>,
    task: TaskControl,
    batch_size: usize,
    unique: bool,
}

impl IndexSampler {
    pub(crate) fn new(
        view: Arc<dyn PartitionView>,
        task: TaskControl,
        config: &SamplingConfig,
        unique: bool,
    ) -> Self {
        Self {
            view,
            task,
            // Guarded by Config::validate, but a zero here would skip
            // every cancellation poll.
            batch_size: config.batch_size.max(1),
            unique,
        }
    }

    /// Scans the snapshot and returns its statistics.
    ///
    /// Cancellation is polled once before the scan and then every
    /// `batch_size` entries; a drained coordinator turns into
    /// [`StrataError::DroppedWhileSampling`].
    #[instrument(skip(self), fields(batch_size = self.batch_size, unique = self.unique))]
    pub fn sample_index(mut self) -> Result<IndexSample> {
        if self.task.is_cancelled() {
            return Err(StrataError::DroppedWhileSampling);
        }

        // Unique indexes have one entry per value; no point paying for
        // the distinct-value set.
        let mut seen: HashSet<PropertyValue> = HashSet::new();
        let mut index_size = 0u64;
        let mut unique_values = 0u64;
        let mut since_poll = 0usize;

        for entry in self.view.entries()? {
            since_poll += 1;
            if since_poll >= self.batch_size {
                since_poll = 0;
                if self.task.is_cancelled() {
                    return Err(StrataError::DroppedWhileSampling);
                }
            }

            let entry = entry?;
            index_size += 1;
            if self.unique || seen.insert(entry.value) {
                unique_values += 1;
            }
        }

        self.task.mark_completed();

        let sample = IndexSample {
            index_size,
            unique_values,
            sample_size: index_size,
        };
        debug!(?sample, "Sampling complete");
        Ok(sample)
    }
}

impl std::fmt::Debug for IndexSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSampler")
            .field("batch_size", &self.batch_size)
            .field("unique", &self.unique)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RedbBackend, SearchBackend};
    use crate::config::Config;
    use crate::task::TaskCoordinator;
    use crate::types::EntityId;
    use crate::updater::EntryUpdate;
    use tempfile::tempdir;

    fn add(entity_id: EntityId, value: impl Into<PropertyValue>) -> EntryUpdate {
        EntryUpdate::Add {
            entity_id,
            value: value.into(),
        }
    }

    fn sampler_over(
        backend: &RedbBackend,
        coordinator: &TaskCoordinator,
        config: &Config,
    ) -> IndexSampler {
        IndexSampler::new(
            backend.snapshot().unwrap(),
            coordinator.register().unwrap(),
            &config.sampling,
            config.unique,
        )
    }

    #[test]
    fn test_sample_counts_entries_and_distinct_values() {
        let dir = tempdir().unwrap();
        let config = Config::default();
        let backend = RedbBackend::open(dir.path().join("t.db"), &config).unwrap();
        backend
            .commit(&[add(1, "a"), add(2, "a"), add(3, "b"), add(4, 1.0)])
            .unwrap();

        let coordinator = TaskCoordinator::new();
        let sample = sampler_over(&backend, &coordinator, &config)
            .sample_index()
            .unwrap();

        assert_eq!(
            sample,
            IndexSample {
                index_size: 4,
                unique_values: 3,
                sample_size: 4,
            }
        );
        assert_eq!(coordinator.outstanding(), 0);
    }

    #[test]
    fn test_sample_of_empty_index() {
        let dir = tempdir().unwrap();
        let config = Config::default();
        let backend = RedbBackend::open(dir.path().join("t.db"), &config).unwrap();

        let coordinator = TaskCoordinator::new();
        let sample = sampler_over(&backend, &coordinator, &config)
            .sample_index()
            .unwrap();
        assert_eq!(sample.index_size, 0);
        assert_eq!(sample.unique_values, 0);
    }

    #[test]
    fn test_unique_index_skips_distinct_set() {
        let dir = tempdir().unwrap();
        let config = Config::unique_index();
        let backend = RedbBackend::open(dir.path().join("t.db"), &config).unwrap();
        backend.commit(&[add(1, "a"), add(2, "b")]).unwrap();

        let coordinator = TaskCoordinator::new();
        let sample = sampler_over(&backend, &coordinator, &config)
            .sample_index()
            .unwrap();
        assert_eq!(sample.unique_values, sample.index_size);
    }

    #[test]
    fn test_nan_entries_sample_as_one_distinct_value() {
        let dir = tempdir().unwrap();
        let config = Config::default();
        let backend = RedbBackend::open(dir.path().join("t.db"), &config).unwrap();
        backend
            .commit(&[add(1, f64::NAN), add(2, f64::NAN), add(3, 1.0)])
            .unwrap();

        let coordinator = TaskCoordinator::new();
        let sample = sampler_over(&backend, &coordinator, &config)
            .sample_index()
            .unwrap();
        assert_eq!(sample.index_size, 3);
        assert_eq!(sample.unique_values, 2);
    }

    #[test]
    fn test_cancelled_sampler_fails() {
        let dir = tempdir().unwrap();
        let config = Config::default();
        let backend = RedbBackend::open(dir.path().join("t.db"), &config).unwrap();
        backend.commit(&[add(1, "a")]).unwrap();

        let coordinator = std::sync::Arc::new(TaskCoordinator::new());
        let sampler = sampler_over(&backend, &coordinator, &config);

        let drainer = {
            let coordinator = std::sync::Arc::clone(&coordinator);
            std::thread::spawn(move || coordinator.await_completion())
        };

        // Wait until the drain has actually begun
        while coordinator.register().is_ok() {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        let err = sampler.sample_index().unwrap_err();
        assert!(err.is_dropped_while_sampling());
        drainer.join().unwrap();
    }
}
