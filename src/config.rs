//! Configuration for SimpleStore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, StoreError};

/// Main configuration for a SimpleStore instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path of the append log file.
    /// `None` builds a cached-only store with no backing file.
    pub path: Option<PathBuf>,

    /// Sync strategy: how often to fsync the log
    pub sync_strategy: SyncStrategy,

    /// Largest size the log may grow to; `None` is unbounded.
    /// Appends past it fail with `LogFull` and leave the store unchanged.
    pub max_log_bytes: Option<u64>,

    // -------------------------------------------------------------------------
    // Record Configuration
    // -------------------------------------------------------------------------
    /// Values at least this long are compressed before they are logged.
    /// `None` never compresses.
    pub compression_threshold: Option<usize>,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Run compaction on close when the log is sparse enough
    pub compact_on_close: bool,

    /// Compact when `live records / total records` falls below this ratio
    pub compaction_ratio: f64,

    /// Logs with fewer frames than this are never compacted on close
    pub compaction_min_records: u64,
}

/// Log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced records (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: None,
            sync_strategy: SyncStrategy::EveryNEntries { count: 100 },
            max_log_bytes: None,
            compression_threshold: Some(4 * 1024), // 4 KB
            compact_on_close: true,
            compaction_ratio: 0.5,
            compaction_min_records: 64,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Config for a store that keeps everything in memory
    pub fn cached_only() -> Self {
        Self::default()
    }

    /// Whether this config describes a cached-only store
    pub fn is_cached_only(&self) -> bool {
        self.path.is_none()
    }

    /// Check the config for values the store cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.compaction_ratio) {
            return Err(StoreError::Config(format!(
                "compaction_ratio must be within 0.0..=1.0, got {}",
                self.compaction_ratio
            )));
        }

        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(StoreError::Config(
                "EveryNEntries sync count must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the log file path (makes the store persistent)
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = Some(path.into());
        self
    }

    /// Set the log sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Cap the log size (in bytes), `None` removes the cap
    pub fn max_log_bytes(mut self, limit: Option<u64>) -> Self {
        self.config.max_log_bytes = limit;
        self
    }

    /// Set the compression threshold (in bytes), `None` disables compression
    pub fn compression_threshold(mut self, threshold: Option<usize>) -> Self {
        self.config.compression_threshold = threshold;
        self
    }

    /// Enable or disable compaction on close
    pub fn compact_on_close(mut self, enabled: bool) -> Self {
        self.config.compact_on_close = enabled;
        self
    }

    /// Set the live/total ratio below which close compacts
    pub fn compaction_ratio(mut self, ratio: f64) -> Self {
        self.config.compaction_ratio = ratio;
        self
    }

    /// Set the minimum log record count before close compacts
    pub fn compaction_min_records(mut self, count: u64) -> Self {
        self.config.compaction_min_records = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
