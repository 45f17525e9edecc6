//! Write path: batched index updates.
//!
//! An [`IndexUpdater`] collects entry updates for one logical
//! transaction and hands the whole batch to the backend in a single
//! atomic commit when closed. Snapshots taken before the close never see
//! a partial batch.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::backend::SearchBackend;
use crate::error::Result;
use crate::types::{EntityId, PropertyValue};

/// One change to the indexed entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryUpdate {
    /// Index `value` for `entity_id`.
    Add {
        /// Entity gaining an indexed value.
        entity_id: EntityId,
        /// The value to index.
        value: PropertyValue,
    },
    /// Remove the entry indexing `value` for `entity_id`.
    Remove {
        /// Entity losing an indexed value.
        entity_id: EntityId,
        /// The previously indexed value.
        value: PropertyValue,
    },
    /// Replace `value_before` with `value_after` for `entity_id`.
    Change {
        /// Entity whose indexed value changed.
        entity_id: EntityId,
        /// The previously indexed value.
        value_before: PropertyValue,
        /// The new value to index.
        value_after: PropertyValue,
    },
}

/// How updates reaching the index should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexUpdateMode {
    /// Normal operation: updates are applied as given.
    #[default]
    Online,
    /// Crash recovery replay: adds may repeat updates that already made
    /// it to disk, so each add first clears any identical entry.
    Recovery,
}

/// Batching write handle for one transaction's worth of updates.
///
/// Created by [`IndexAccessor::new_updater`](crate::IndexAccessor::new_updater).
/// Call [`close`](Self::close) to commit; an updater dropped without
/// closing still attempts the commit but cannot report failure, so the
/// explicit close is the supported path.
pub struct IndexUpdater {
    backend: Arc<dyn SearchBackend>,
    mode: IndexUpdateMode,
    batch: Vec<EntryUpdate>,
    committed: bool,
}

impl IndexUpdater {
    pub(crate) fn new(backend: Arc<dyn SearchBackend>, mode: IndexUpdateMode) -> Self {
        Self {
            backend,
            mode,
            batch: Vec::new(),
            committed: false,
        }
    }

    /// Queues one update.
    pub fn process(&mut self, update: EntryUpdate) -> Result<()> {
        if self.mode == IndexUpdateMode::Recovery {
            if let EntryUpdate::Add { entity_id, value } = &update {
                // Replayed adds must not double-index an entry that
                // survived the crash.
                self.batch.push(EntryUpdate::Remove {
                    entity_id: *entity_id,
                    value: value.clone(),
                });
            }
        }
        self.batch.push(update);
        Ok(())
    }

    /// Queues an add for `entity_id` with `value`.
    pub fn add(&mut self, entity_id: EntityId, value: impl Into<PropertyValue>) -> Result<()> {
        self.process(EntryUpdate::Add {
            entity_id,
            value: value.into(),
        })
    }

    /// Queues a removal of `value` for `entity_id`.
    pub fn remove(&mut self, entity_id: EntityId, value: impl Into<PropertyValue>) -> Result<()> {
        self.process(EntryUpdate::Remove {
            entity_id,
            value: value.into(),
        })
    }

    /// Queues a value change for `entity_id`.
    pub fn change(
        &mut self,
        entity_id: EntityId,
        value_before: impl Into<PropertyValue>,
        value_after: impl Into<PropertyValue>,
    ) -> Result<()> {
        self.process(EntryUpdate::Change {
            entity_id,
            value_before: value_before.into(),
            value_after: value_after.into(),
        })
    }

    /// Number of queued updates, including recovery-mode clears.
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Commits the batch atomically.
    #[instrument(skip(self), fields(updates = self.batch.len(), mode = ?self.mode))]
    pub fn close(mut self) -> Result<()> {
        self.commit_once()?;
        debug!("Updater closed");
        Ok(())
    }

    fn commit_once(&mut self) -> Result<()> {
        if self.committed {
            return Ok(());
        }
        self.committed = true;
        if self.batch.is_empty() {
            return Ok(());
        }
        self.backend.commit(&self.batch)
    }
}

impl Drop for IndexUpdater {
    fn drop(&mut self) {
        if !self.committed && !self.batch.is_empty() {
            warn!(
                updates = self.batch.len(),
                "Updater dropped without close; committing batch"
            );
            if let Err(err) = self.commit_once() {
                warn!(%err, "Commit of dropped updater failed");
            }
        }
    }
}

impl std::fmt::Debug for IndexUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexUpdater")
            .field("mode", &self.mode)
            .field("pending", &self.batch.len())
            .field("committed", &self.committed)
            .finish()
    }
}
