//! Index file schema definitions and versioning.
//!
//! This module defines the table structure for the redb backend. All
//! table definitions are compile-time constants to ensure consistency.
//!
//! # Table Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ METADATA_TABLE                                               │
//! │   Key: &str                                                  │
//! │   Value: &[u8] (bincode)                                     │
//! │   Entries: "index_metadata" -> IndexMetadata                 │
//! │            "next_entry_seq" -> u64                           │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ ENTRIES_TABLE                                                │
//! │   Key: u64 (monotonically increasing entry sequence)         │
//! │   Value: &[u8] (bincode-serialized IndexEntry)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sequence key gives entries a stable storage order without
//! implying any value ordering; queries always filter, never seek.

use redb::TableDefinition;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Current schema version.
///
/// Increment this when making breaking changes to the layout.
/// The index will refuse to open if versions don't match.
pub const SCHEMA_VERSION: u32 = 1;

/// Metadata table for index-level information.
pub const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

/// Postings table.
///
/// Key: entry sequence number (assigned at commit, never reused)
/// Value: bincode-serialized [`crate::types::IndexEntry`]
pub const ENTRIES_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("entries");

/// Metadata key for the [`IndexMetadata`] record.
pub const METADATA_KEY: &str = "index_metadata";

/// Metadata key for the entry sequence counter.
pub const NEXT_SEQ_KEY: &str = "next_entry_seq";

/// Index metadata stored in the metadata table.
///
/// Serialized with bincode under [`METADATA_KEY`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Schema version for compatibility checking.
    pub schema_version: u32,

    /// Whether this index is unique.
    ///
    /// Once set, this cannot be changed without recreating the index.
    pub unique: bool,

    /// Timestamp when the index was created.
    pub created_at: Timestamp,

    /// Last time the index was opened (updated on each open).
    pub last_opened_at: Timestamp,
}

impl IndexMetadata {
    /// Creates new metadata for a fresh index.
    pub fn new(unique: bool) -> Self {
        let now = Timestamp::now();
        Self {
            schema_version: SCHEMA_VERSION,
            unique,
            created_at: now,
            last_opened_at: now,
        }
    }

    /// Updates the last_opened_at timestamp.
    pub fn touch(&mut self) {
        self.last_opened_at = Timestamp::now();
    }

    /// Checks if this metadata is compatible with the current schema.
    pub fn is_compatible(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version() {
        assert_eq!(SCHEMA_VERSION, 1);
    }

    #[test]
    fn test_index_metadata_new() {
        let meta = IndexMetadata::new(true);
        assert_eq!(meta.schema_version, SCHEMA_VERSION);
        assert!(meta.unique);
        assert!(meta.is_compatible());
    }

    #[test]
    fn test_index_metadata_touch() {
        let mut meta = IndexMetadata::new(false);
        let original = meta.last_opened_at;
        std::thread::sleep(std::time::Duration::from_millis(1));
        meta.touch();
        assert!(meta.last_opened_at > original);
    }

    #[test]
    fn test_index_metadata_serialization() {
        let meta = IndexMetadata::new(true);
        let bytes = bincode::serialize(&meta).unwrap();
        let restored: IndexMetadata = bincode::deserialize(&bytes).unwrap();
        assert_eq!(meta.schema_version, restored.schema_version);
        assert_eq!(meta.unique, restored.unique);
    }
}
