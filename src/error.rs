//! Error types for strata-index.
//!
//! The crate uses a hierarchical error system:
//! - `StrataError` is the top-level error returned by all public APIs
//! - `StorageError` provides backend-level detail
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use strata::{Config, IndexAccessor, Result};
//!
//! fn example() -> Result<()> {
//!     let accessor = IndexAccessor::open("./index.db", Config::default())?;
//!     // ... operations that may fail ...
//!     accessor.close()?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for strata-index operations.
pub type Result<T> = std::result::Result<T, StrataError>;

/// Top-level error enum for all strata-index operations.
///
/// This is the only error type returned by public APIs.
/// Use pattern matching to handle specific error cases.
#[derive(Debug, Error)]
pub enum StrataError {
    /// The query shape cannot be executed by this version of the engine,
    /// e.g. more than one predicate passed to a single-predicate call.
    #[error("Unsupported index query: {0}")]
    UnsupportedQuery(String),

    /// The reader was closed before this operation was attempted.
    #[error("Index reader is closed")]
    ReaderClosed,

    /// The index was dropped (or a drop is in progress), so this
    /// operation can no longer be served.
    #[error("Index has been dropped")]
    IndexDropped,

    /// Sampling was aborted because the index was dropped mid-scan.
    ///
    /// Distinct from ordinary storage failure so callers can tell
    /// intentional teardown from a genuine fault.
    #[error("Index dropped while sampling.")]
    DroppedWhileSampling,

    /// Storage layer error (I/O, corruption, transactions).
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what's wrong with the configuration.
        reason: String,
    },

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StrataError {
    /// Creates an unsupported-query error with the given message.
    pub fn unsupported_query(msg: impl Into<String>) -> Self {
        Self::UnsupportedQuery(msg.into())
    }

    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Returns true if this error reports an unsupported query shape.
    pub fn is_unsupported_query(&self) -> bool {
        matches!(self, Self::UnsupportedQuery(_))
    }

    /// Returns true if this error reports use of a dropped index.
    pub fn is_index_dropped(&self) -> bool {
        matches!(self, Self::IndexDropped)
    }

    /// Returns true if this error reports a sampling pass aborted by drop.
    pub fn is_dropped_while_sampling(&self) -> bool {
        matches!(self, Self::DroppedWhileSampling)
    }

    /// Returns true if this is a storage error.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Storage-related errors.
///
/// These errors indicate problems with the underlying search backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Index file or data is corrupted.
    #[error("Index corrupted: {0}")]
    Corrupted(String),

    /// Index file not found at expected path.
    #[error("Index not found: {0}")]
    IndexNotFound(PathBuf),

    /// Index file is locked by another process.
    #[error("Index is locked by another writer")]
    IndexLocked,

    /// Transaction failed (commit, rollback, etc.).
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from the redb storage engine.
    #[error("Storage engine error: {0}")]
    Redb(String),

    /// Index schema version doesn't match expected version.
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version.
        expected: u32,
        /// Actual schema version found in the index file.
        found: u32,
    },
}

impl StorageError {
    /// Creates a corruption error with the given message.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Creates a transaction error with the given message.
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// Creates a serialization error with the given message.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates a redb error with the given message.
    pub fn redb(msg: impl Into<String>) -> Self {
        Self::Redb(msg.into())
    }
}

// Conversions from redb error types
impl From<redb::Error> for StorageError {
    fn from(err: redb::Error) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        StorageError::Transaction(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        StorageError::Transaction(format!("Commit failed: {}", err))
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        StorageError::Redb(format!("Table error: {}", err))
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        StorageError::Redb(format!("Storage error: {}", err))
    }
}

// Convert bincode errors to StorageError
impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

// Also allow direct conversion to StrataError for convenience
impl From<redb::Error> for StrataError {
    fn from(err: redb::Error) -> Self {
        StrataError::Storage(StorageError::from(err))
    }
}

impl From<redb::DatabaseError> for StrataError {
    fn from(err: redb::DatabaseError) -> Self {
        StrataError::Storage(StorageError::from(err))
    }
}

impl From<redb::TransactionError> for StrataError {
    fn from(err: redb::TransactionError) -> Self {
        StrataError::Storage(StorageError::from(err))
    }
}

impl From<redb::CommitError> for StrataError {
    fn from(err: redb::CommitError) -> Self {
        StrataError::Storage(StorageError::from(err))
    }
}

impl From<redb::TableError> for StrataError {
    fn from(err: redb::TableError) -> Self {
        StrataError::Storage(StorageError::from(err))
    }
}

impl From<redb::StorageError> for StrataError {
    fn from(err: redb::StorageError) -> Self {
        StrataError::Storage(StorageError::from(err))
    }
}

impl From<bincode::Error> for StrataError {
    fn from(err: bincode::Error) -> Self {
        StrataError::Storage(StorageError::from(err))
    }
}
