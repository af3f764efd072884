//! Runtime settings
//!
//! Loaded from an optional JSON file; every key has a default so an empty
//! document (or no file at all) is valid.
//!
//! ```json
//! { "event_pool_size": 64, "table_capacity": 16384, "send_signal": true,
//!   "offsets": "/etc/procache/offsets.json" }
//! ```

use std::path::{Path, PathBuf};

use procache_common::{KernelOffsets, EVENT_GEN_SIZE};
use serde::{Deserialize, Serialize};

use crate::domain::ConfigError;
use crate::offsets::OffsetTable;

/// Default per-table entry limit, matching the eBPF map sizes
pub const DEFAULT_TABLE_CAPACITY: usize = 16384;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Number of slots in the event buffer pool
    pub event_pool_size: u32,
    /// Maximum entries per cache table
    pub table_capacity: usize,
    /// Whether signal dispatch may use `bpf_send_signal`
    pub send_signal: bool,
    /// Kernel structure offset table
    pub offsets: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            event_pool_size: EVENT_GEN_SIZE,
            table_capacity: DEFAULT_TABLE_CAPACITY,
            send_signal: true,
            offsets: None,
        }
    }
}

impl Settings {
    /// Read and validate a settings file
    ///
    /// # Errors
    /// Returns an error if the file is unreadable, malformed or invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    /// # Errors
    /// Returns [`ConfigError::Invalid`] for a zero-sized pool or table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_pool_size == 0 {
            return Err(ConfigError::Invalid {
                key: "event_pool_size",
                reason: "the event pool needs at least one slot".to_string(),
            });
        }
        if self.table_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "table_capacity",
                reason: "cache tables need room for at least one entry".to_string(),
            });
        }
        Ok(())
    }

    /// Load the configured offset table, all zeroes when none is configured
    ///
    /// # Errors
    /// Returns an error if the configured table cannot be loaded.
    pub fn kernel_offsets(&self) -> Result<KernelOffsets, ConfigError> {
        match &self.offsets {
            Some(path) => Ok(OffsetTable::from_file(path)?.to_kernel_offsets()?),
            None => Ok(KernelOffsets::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.event_pool_size, EVENT_GEN_SIZE);
    }

    #[test]
    fn test_zero_pool_rejected() {
        let settings = Settings { event_pool_size: 0, ..Settings::default() };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("event_pool_size"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(serde_json::from_str::<Settings>(r#"{ "pool": 3 }"#).is_err());
    }

    #[test]
    fn test_no_offsets_means_zeroes() {
        let offsets = Settings::default().kernel_offsets().unwrap();
        assert_eq!(offsets, KernelOffsets::default());
    }
}
