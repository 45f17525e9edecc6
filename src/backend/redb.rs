//! redb search backend implementation.
//!
//! This module provides the primary backend for strata-index using
//! [redb](https://docs.rs/redb), a pure Rust embedded key-value store.
//!
//! # Why redb fits this engine
//!
//! - MVCC: a read transaction pins one committed generation, which is
//!   exactly the immutable partition view a reader needs. Repeatable
//!   reads fall out of the storage engine instead of data copying.
//! - Single-writer transactions make an updater's batch atomic.
//! - Pages referenced by live read transactions survive both later
//!   commits and file deletion, so snapshots outlive `destroy()`.
//!
//! # File Layout
//!
//! When you open an index at `./index.db`, redb creates:
//! - `./index.db` - Main index file

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use ::redb::{Database, ReadableTable, ReadOnlyTable, Table};
use tracing::{debug, info, instrument, warn};

use super::schema::{
    IndexMetadata, ENTRIES_TABLE, METADATA_KEY, METADATA_TABLE, NEXT_SEQ_KEY, SCHEMA_VERSION,
};
use super::{PartitionView, SearchBackend};
use crate::config::Config;
use crate::error::{Result, StorageError, StrataError};
use crate::query::BackendQuery;
use crate::types::{EntityId, IndexEntry, PropertyValue};
use crate::updater::EntryUpdate;

/// redb search backend.
///
/// Holds the redb database handle and cached metadata. The handle lives
/// inside an `RwLock<Option<..>>` so `destroy()` can take it out while
/// concurrent snapshot/commit attempts get a defined `IndexDropped`
/// error instead of racing.
pub struct RedbBackend {
    /// The redb database handle; `None` once destroyed.
    db: RwLock<Option<Database>>,

    /// Cached index metadata.
    metadata: IndexMetadata,

    /// Path to the index file.
    path: PathBuf,
}

impl RedbBackend {
    /// Opens or creates an index file at the given path.
    ///
    /// If the index doesn't exist, it will be created and initialized
    /// from the configuration. If it exists, the configuration is
    /// validated against the stored metadata (schema version and the
    /// unique flag must match).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The index file is corrupted
    /// - The index file is locked by another process
    /// - Schema version doesn't match
    /// - The unique flag doesn't match an existing index
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref();
        let index_exists = path.exists();

        debug!(index_exists = index_exists, "Opening search backend");

        let db = Self::create_database(path)?;

        if index_exists {
            Self::open_existing(db, path.to_path_buf(), config)
        } else {
            Self::initialize_new(db, path.to_path_buf(), config)
        }
    }

    /// Creates the redb database with appropriate settings.
    fn create_database(path: &Path) -> Result<Database> {
        // Note: redb doesn't expose a typed error variant for lock
        // conflicts, so we detect them via error message string matching.
        let db = Database::builder().create(path).map_err(|e| {
            if e.to_string().contains("locked") {
                StorageError::IndexLocked
            } else {
                StorageError::Redb(e.to_string())
            }
        })?;

        debug!("Index file opened successfully");
        Ok(db)
    }

    /// Initializes a new index with tables and metadata.
    #[instrument(skip(db, config), fields(path = %path.display()))]
    fn initialize_new(db: Database, path: PathBuf, config: &Config) -> Result<Self> {
        info!("Initializing new index");

        let metadata = IndexMetadata::new(config.unique);

        // Create both tables and write metadata in a single transaction
        let write_txn = db.begin_write().map_err(StorageError::from)?;
        {
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let metadata_bytes =
                bincode::serialize(&metadata).map_err(StorageError::from)?;
            meta_table.insert(METADATA_KEY, metadata_bytes.as_slice())?;

            let seq_bytes = bincode::serialize(&0u64).map_err(StorageError::from)?;
            meta_table.insert(NEXT_SEQ_KEY, seq_bytes.as_slice())?;

            let _ = write_txn.open_table(ENTRIES_TABLE)?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        info!(
            schema_version = SCHEMA_VERSION,
            unique = config.unique,
            "Index initialized"
        );

        Ok(Self {
            db: RwLock::new(Some(db)),
            metadata,
            path,
        })
    }

    /// Opens and validates an existing index.
    #[instrument(skip(db, config), fields(path = %path.display()))]
    fn open_existing(db: Database, path: PathBuf, config: &Config) -> Result<Self> {
        info!("Opening existing index");

        let read_txn = db.begin_read().map_err(StorageError::from)?;
        let metadata = {
            let meta_table = read_txn
                .open_table(METADATA_TABLE)
                .map_err(|e| StorageError::corrupted(format!("Cannot open metadata table: {}", e)))?;

            let metadata_bytes = meta_table
                .get(METADATA_KEY)
                .map_err(StorageError::from)?
                .ok_or_else(|| StorageError::corrupted("Missing index metadata"))?;

            bincode::deserialize::<IndexMetadata>(metadata_bytes.value())
                .map_err(|e| StorageError::corrupted(format!("Invalid metadata format: {}", e)))?
        };
        drop(read_txn);

        if metadata.schema_version != SCHEMA_VERSION {
            warn!(
                expected = SCHEMA_VERSION,
                found = metadata.schema_version,
                "Schema version mismatch"
            );
            return Err(StrataError::Storage(StorageError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found: metadata.schema_version,
            }));
        }

        if metadata.unique != config.unique {
            warn!(
                expected = config.unique,
                found = metadata.unique,
                "Unique flag mismatch"
            );
            return Err(StrataError::config(format!(
                "index at {} was created with unique={}, cannot reopen with unique={}",
                path.display(),
                metadata.unique,
                config.unique
            )));
        }

        // Update last_opened_at timestamp
        let mut metadata = metadata;
        metadata.touch();

        let write_txn = db.begin_write().map_err(StorageError::from)?;
        {
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let metadata_bytes =
                bincode::serialize(&metadata).map_err(StorageError::from)?;
            meta_table.insert(METADATA_KEY, metadata_bytes.as_slice())?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        info!(
            schema_version = metadata.schema_version,
            unique = metadata.unique,
            "Index opened successfully"
        );

        Ok(Self {
            db: RwLock::new(Some(db)),
            metadata,
            path,
        })
    }

    /// Returns the cached index metadata.
    #[inline]
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }
}

impl std::fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBackend")
            .field("path", &self.path)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Removes every stored entry with the given entity id and a term-equal
/// value. Stored entries that no longer decode are skipped with a
/// warning; a removal referring to them must not block commit.
fn remove_matching(
    entries: &mut Table<'_, u64, &'static [u8]>,
    entity_id: EntityId,
    value: &PropertyValue,
) -> Result<()> {
    let mut stale = Vec::new();
    for item in entries.iter().map_err(StorageError::from)? {
        let (seq, bytes) = item.map_err(StorageError::from)?;
        match bincode::deserialize::<IndexEntry>(bytes.value()) {
            Ok(entry) => {
                if entry.entity_id == entity_id && entry.value.term_eq(value) {
                    stale.push(seq.value());
                }
            }
            Err(err) => {
                warn!(seq = seq.value(), %err, "Skipping undecodable entry during removal");
            }
        }
    }
    for seq in stale {
        entries.remove(seq).map_err(StorageError::from)?;
    }
    Ok(())
}

/// Inserts one entry under the next sequence number.
fn insert_entry(
    entries: &mut Table<'_, u64, &'static [u8]>,
    next_seq: &mut u64,
    entity_id: EntityId,
    value: &PropertyValue,
) -> Result<()> {
    let entry = IndexEntry {
        entity_id,
        value: value.clone(),
    };
    let bytes = bincode::serialize(&entry).map_err(StorageError::from)?;
    entries
        .insert(*next_seq, bytes.as_slice())
        .map_err(StorageError::from)?;
    *next_seq += 1;
    Ok(())
}

impl SearchBackend for RedbBackend {
    fn snapshot(&self) -> Result<Arc<dyn PartitionView>> {
        let guard = self
            .db
            .read()
            .map_err(|_| StorageError::corrupted("backend lock poisoned"))?;
        let db = guard.as_ref().ok_or(StrataError::IndexDropped)?;

        let read_txn = db.begin_read().map_err(StorageError::from)?;
        // The read-only table is self-contained: it pins the generation
        // even after the transaction handle goes out of scope here.
        let table = read_txn
            .open_table(ENTRIES_TABLE)
            .map_err(StorageError::from)?;

        Ok(Arc::new(RedbPartitionView { table }))
    }

    #[instrument(skip(self, batch), fields(updates = batch.len()))]
    fn commit(&self, batch: &[EntryUpdate]) -> Result<()> {
        let guard = self
            .db
            .read()
            .map_err(|_| StorageError::corrupted("backend lock poisoned"))?;
        let db = guard.as_ref().ok_or(StrataError::IndexDropped)?;

        let write_txn = db.begin_write().map_err(StorageError::from)?;
        {
            let mut entries = write_txn.open_table(ENTRIES_TABLE)?;
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;

            let mut next_seq: u64 = {
                let stored = meta_table.get(NEXT_SEQ_KEY).map_err(StorageError::from)?;
                match stored {
                    Some(bytes) => {
                        bincode::deserialize(bytes.value()).map_err(StorageError::from)?
                    }
                    None => 0,
                }
            };

            for update in batch {
                match update {
                    EntryUpdate::Add { entity_id, value } => {
                        insert_entry(&mut entries, &mut next_seq, *entity_id, value)?;
                    }
                    EntryUpdate::Remove { entity_id, value } => {
                        remove_matching(&mut entries, *entity_id, value)?;
                    }
                    EntryUpdate::Change {
                        entity_id,
                        value_before,
                        value_after,
                    } => {
                        remove_matching(&mut entries, *entity_id, value_before)?;
                        insert_entry(&mut entries, &mut next_seq, *entity_id, value_after)?;
                    }
                }
            }

            let seq_bytes = bincode::serialize(&next_seq).map_err(StorageError::from)?;
            meta_table
                .insert(NEXT_SEQ_KEY, seq_bytes.as_slice())
                .map_err(StorageError::from)?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        debug!("Batch committed");
        Ok(())
    }

    #[instrument(skip(self))]
    fn destroy(&self) -> Result<()> {
        let mut guard = self
            .db
            .write()
            .map_err(|_| StorageError::corrupted("backend lock poisoned"))?;

        if let Some(db) = guard.take() {
            info!("Destroying index");
            // Live snapshots hold their own references to the mapped
            // pages; dropping the handle and unlinking the file does not
            // invalidate them.
            drop(db);
            match std::fs::remove_file(&self.path) {
                Ok(()) => info!("Index file deleted"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// One immutable generation of a redb-backed index.
///
/// Wraps a read-only table pinned to the transaction it was opened in.
struct RedbPartitionView {
    table: ReadOnlyTable<u64, &'static [u8]>,
}

impl PartitionView for RedbPartitionView {
    fn search(&self, query: &BackendQuery) -> Result<Vec<EntityId>> {
        let mut hits = Vec::new();
        for entry in self.entries()? {
            let entry = entry?;
            if query.matches(&entry) {
                hits.push(entry.entity_id);
            }
        }
        Ok(hits)
    }

    fn total_hits(&self, query: &BackendQuery) -> Result<u64> {
        let mut count = 0;
        for entry in self.entries()? {
            if query.matches(&entry?) {
                count += 1;
            }
        }
        Ok(count)
    }

    fn entries(&self) -> Result<Box<dyn Iterator<Item = Result<IndexEntry>> + '_>> {
        let range = self.table.iter().map_err(StorageError::from)?;
        Ok(Box::new(range.map(|item| {
            let (_, bytes) = item.map_err(StorageError::from)?;
            let entry =
                bincode::deserialize::<IndexEntry>(bytes.value()).map_err(StorageError::from)?;
            Ok(entry)
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn add(entity_id: EntityId, value: impl Into<PropertyValue>) -> EntryUpdate {
        EntryUpdate::Add {
            entity_id,
            value: value.into(),
        }
    }

    #[test]
    fn test_open_creates_new_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        assert!(!path.exists());
        let backend = RedbBackend::open(&path, &Config::default()).unwrap();

        assert!(path.exists());
        assert_eq!(backend.metadata().schema_version, SCHEMA_VERSION);
        assert!(!backend.metadata().unique);
    }

    #[test]
    fn test_open_existing_preserves_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let backend = RedbBackend::open(&path, &Config::unique_index()).unwrap();
        let created_at = backend.metadata().created_at;
        drop(backend);

        std::thread::sleep(std::time::Duration::from_millis(10));
        let backend = RedbBackend::open(&path, &Config::unique_index()).unwrap();
        assert_eq!(backend.metadata().created_at, created_at);
        assert!(backend.metadata().last_opened_at > created_at);
    }

    #[test]
    fn test_unique_flag_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let backend = RedbBackend::open(&path, &Config::unique_index()).unwrap();
        drop(backend);

        let result = RedbBackend::open(&path, &Config::default());
        assert!(matches!(result.unwrap_err(), StrataError::Config { .. }));
    }

    #[test]
    fn test_commit_and_search() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("t.db"), &Config::default()).unwrap();

        backend.commit(&[add(1, "a"), add(2, "b")]).unwrap();

        let view = backend.snapshot().unwrap();
        assert_eq!(view.search(&BackendQuery::MatchAll).unwrap(), vec![1, 2]);
        assert_eq!(
            view.search(&BackendQuery::Term(PropertyValue::text("a")))
                .unwrap(),
            vec![1]
        );
    }

    #[test]
    fn test_remove_deletes_matching_entries_only() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("t.db"), &Config::default()).unwrap();

        backend
            .commit(&[add(1, "a"), add(1, "b"), add(2, "a")])
            .unwrap();
        backend
            .commit(&[EntryUpdate::Remove {
                entity_id: 1,
                value: PropertyValue::text("a"),
            }])
            .unwrap();

        let view = backend.snapshot().unwrap();
        let term_a = BackendQuery::Term(PropertyValue::text("a"));
        assert_eq!(view.search(&term_a).unwrap(), vec![2]);
        assert_eq!(view.total_hits(&BackendQuery::MatchAll).unwrap(), 2);
    }

    #[test]
    fn test_remove_of_absent_entry_is_a_noop() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("t.db"), &Config::default()).unwrap();

        backend
            .commit(&[EntryUpdate::Remove {
                entity_id: 9,
                value: PropertyValue::text("missing"),
            }])
            .unwrap();
        assert_eq!(
            backend
                .snapshot()
                .unwrap()
                .total_hits(&BackendQuery::MatchAll)
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_snapshot_pins_generation() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("t.db"), &Config::default()).unwrap();

        backend.commit(&[add(1, "a")]).unwrap();
        let old = backend.snapshot().unwrap();
        backend.commit(&[add(2, "b")]).unwrap();

        assert_eq!(old.total_hits(&BackendQuery::MatchAll).unwrap(), 1);
        let new = backend.snapshot().unwrap();
        assert_eq!(new.total_hits(&BackendQuery::MatchAll).unwrap(), 2);
    }

    #[test]
    fn test_snapshot_survives_destroy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        let backend = RedbBackend::open(&path, &Config::default()).unwrap();

        backend.commit(&[add(1, "a")]).unwrap();
        let view = backend.snapshot().unwrap();

        backend.destroy().unwrap();
        assert!(!path.exists());

        // The pinned view still reads its generation
        assert_eq!(view.search(&BackendQuery::MatchAll).unwrap(), vec![1]);
        // But new snapshots and commits are refused
        assert!(matches!(backend.snapshot(), Err(e) if e.is_index_dropped()));
        assert!(backend.commit(&[add(2, "b")]).unwrap_err().is_index_dropped());
    }

    #[test]
    fn test_destroy_twice_is_harmless() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("t.db"), &Config::default()).unwrap();
        backend.destroy().unwrap();
        backend.destroy().unwrap();
    }

    #[test]
    fn test_change_replaces_value() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("t.db"), &Config::default()).unwrap();

        backend.commit(&[add(1, "old")]).unwrap();
        backend
            .commit(&[EntryUpdate::Change {
                entity_id: 1,
                value_before: PropertyValue::text("old"),
                value_after: PropertyValue::text("new"),
            }])
            .unwrap();

        let view = backend.snapshot().unwrap();
        assert_eq!(
            view.search(&BackendQuery::Term(PropertyValue::text("new")))
                .unwrap(),
            vec![1]
        );
        assert!(view
            .search(&BackendQuery::Term(PropertyValue::text("old")))
            .unwrap()
            .is_empty());
    }
}
