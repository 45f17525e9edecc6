//! Configuration types for strata-index.
//!
//! The [`Config`] struct controls index behavior:
//! - Whether the index enforces at most one entry per value (`unique`)
//! - Sampling behavior ([`SamplingConfig`])
//!
//! # Example
//! ```rust
//! use strata::{Config, SamplingConfig};
//!
//! // Use defaults (non-unique, batch size 1000)
//! let config = Config::default();
//!
//! // Tighter cancellation checks for very slow storage
//! let config = Config {
//!     sampling: SamplingConfig { batch_size: 64 },
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

use crate::error::StrataError;

/// Index configuration options.
///
/// All fields have sensible defaults. Use struct update syntax to
/// override specific settings.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Whether this index is unique (at most one entity per value).
    ///
    /// Locked on index creation; reopening with a different value fails.
    /// Unique indexes get a cheaper sampling pass since every entry is
    /// known to carry a distinct value.
    pub unique: bool,

    /// Sampling behavior shared by all samplers created from this index.
    pub sampling: SamplingConfig,
}

impl Config {
    /// Creates a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a Config for a unique index.
    pub fn unique_index() -> Self {
        Self {
            unique: true,
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// Called automatically by `IndexAccessor::open()`. You can also call
    /// this explicitly to check configuration before attempting to open.
    ///
    /// # Errors
    /// Returns an error if `sampling.batch_size` is 0.
    pub fn validate(&self) -> Result<(), StrataError> {
        if self.sampling.batch_size == 0 {
            return Err(StrataError::config(
                "sampling.batch_size must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Sampling configuration shared by every sampler created from one index.
///
/// Samplers poll their cancellation token once per `batch_size` entries,
/// so this value bounds how much work a sampler does between checks and
/// therefore how promptly a concurrent `drop` unblocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Number of entries scanned between cancellation checks.
    ///
    /// Must be at least 1. Default: 1000.
    pub batch_size: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { batch_size: 1000 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.unique);
        assert_eq!(config.sampling.batch_size, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unique_index_config() {
        let config = Config::unique_index();
        assert!(config.unique);
    }

    #[test]
    fn test_validate_zero_batch_size() {
        let config = Config {
            sampling: SamplingConfig { batch_size: 0 },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, StrataError::Config { .. }));
    }

    #[test]
    fn test_sampling_config_serialization() {
        let sampling = SamplingConfig { batch_size: 64 };
        let bytes = bincode::serialize(&sampling).unwrap();
        let restored: SamplingConfig = bincode::deserialize(&bytes).unwrap();
        assert_eq!(sampling, restored);
    }
}
