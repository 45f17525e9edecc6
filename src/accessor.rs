//! The index accessor: lifecycle owner of one index.
//!
//! An [`IndexAccessor`] opens (or creates) the backing store, hands out
//! readers and updaters, and owns the drop protocol. Dropping an index
//! is a three-step sequence: refuse new work, drain in-flight tasks
//! through the [`TaskCoordinator`], then destroy the store. Readers
//! created before the drop keep serving their pinned snapshots.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, instrument};

use crate::backend::{RedbBackend, SearchBackend};
use crate::config::Config;
use crate::error::{Result, StrataError};
use crate::reader::IndexReader;
use crate::task::TaskCoordinator;
use crate::updater::{IndexUpdateMode, IndexUpdater};

/// Entry point for all index operations.
///
/// ```rust,no_run
/// use strata::{Config, IndexAccessor, Predicate};
///
/// # fn main() -> strata::Result<()> {
/// let accessor = IndexAccessor::open("./names.idx", Config::default())?;
///
/// let mut updater = accessor.new_updater(Default::default())?;
/// updater.add(42, "zergling")?;
/// updater.close()?;
///
/// let reader = accessor.new_reader()?;
/// let ids: Vec<_> = reader.query(&[Predicate::exact(0, "zergling")])?.collect();
/// assert_eq!(ids, vec![42]);
/// # Ok(())
/// # }
/// ```
pub struct IndexAccessor {
    backend: Arc<dyn SearchBackend>,
    coordinator: Arc<TaskCoordinator>,
    config: Config,
    dropped: AtomicBool,
}

impl IndexAccessor {
    /// Opens or creates an index at the given path.
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        config.validate()?;
        let backend = RedbBackend::open(path, &config)?;
        Self::with_backend(Arc::new(backend), config)
    }

    /// Builds an accessor over an already constructed backend.
    pub fn with_backend(backend: Arc<dyn SearchBackend>, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backend,
            coordinator: Arc::new(TaskCoordinator::new()),
            config,
            dropped: AtomicBool::new(false),
        })
    }

    fn ensure_not_dropped(&self) -> Result<()> {
        if self.dropped.load(Ordering::Acquire) {
            return Err(StrataError::IndexDropped);
        }
        Ok(())
    }

    /// Creates a reader pinned to the current committed state.
    pub fn new_reader(&self) -> Result<IndexReader> {
        self.ensure_not_dropped()?;
        let view = self.backend.snapshot()?;
        Ok(IndexReader::new(
            view,
            Arc::clone(&self.coordinator),
            self.config.clone(),
        ))
    }

    /// Creates an updater that commits its batch atomically on close.
    pub fn new_updater(&self, mode: IndexUpdateMode) -> Result<IndexUpdater> {
        self.ensure_not_dropped()?;
        Ok(IndexUpdater::new(Arc::clone(&self.backend), mode))
    }

    /// Drops the index: cancels and drains in-flight tasks, then
    /// destroys the backing store. Idempotent.
    ///
    /// Existing readers keep their snapshots; new readers, updaters, and
    /// samplers are refused from the moment this is called.
    #[instrument(skip(self))]
    pub fn drop_index(&self) -> Result<()> {
        if self.dropped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("Dropping index");
        self.coordinator.await_completion();
        self.backend.destroy()?;
        info!("Index dropped");
        Ok(())
    }

    /// Shuts the accessor down without destroying the store.
    ///
    /// Waits for in-flight tasks, so the index file is quiescent when
    /// this returns. The index can be reopened later.
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        if !self.dropped.load(Ordering::Acquire) {
            self.coordinator.await_completion();
        }
        info!("Accessor closed");
        Ok(())
    }

    /// Whether the index is unique-valued.
    pub fn is_unique(&self) -> bool {
        self.config.unique
    }

    /// Path of the backing store, if it has one.
    pub fn path(&self) -> Option<&Path> {
        self.backend.path()
    }
}

impl std::fmt::Debug for IndexAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexAccessor")
            .field("config", &self.config)
            .field("dropped", &self.dropped.load(Ordering::Acquire))
            .finish()
    }
}
