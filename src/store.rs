//! Store Module
//!
//! The public store handle that coordinates the index and the append log.
//!
//! ## Responsibilities
//! - Resolve reads through the index (dereferencing log frames)
//! - Write through to the log before updating the index
//! - Skip persistence entirely in cached-only mode
//! - Decide when to compact, and release everything on close

use std::fs;
use std::mem;
use std::path::Path;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::index::{try_copy, Index, IndexSlot};
use crate::log::{AppendLog, ReplayedRecord};
use crate::record::{Record, RecordRef};

/// Handle to a key-value store
///
/// ## Lifecycle: Created → Open → Closed
///
/// A handle is open as soon as a constructor returns. `close` moves it to
/// `Closed` for good; every later call fails with `HandleClosed`.
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/flush/compact/close): hold the exclusive lock
///   for the whole operation, so the log append and the index update are
///   seen together or not at all
/// - **Reads** (get/contains_key/len/keys/stats): share the lock; log frames
///   are read through the log's own read handle mutex
pub struct Store {
    /// Store configuration
    config: Config,

    /// Handle state, guarding index and log together
    state: RwLock<HandleState>,
}

enum HandleState {
    Open(StoreInner),
    Closed,
}

impl HandleState {
    fn inner(&self) -> Result<&StoreInner> {
        match self {
            HandleState::Open(inner) => Ok(inner),
            HandleState::Closed => Err(StoreError::HandleClosed),
        }
    }

    fn inner_mut(&mut self) -> Result<&mut StoreInner> {
        match self {
            HandleState::Open(inner) => Ok(inner),
            HandleState::Closed => Err(StoreError::HandleClosed),
        }
    }
}

/// Everything an open handle owns
struct StoreInner {
    index: Index,

    /// Absent in cached-only mode
    log: Option<AppendLog>,
}

/// Point-in-time counters for a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Keys with a live value
    pub live_keys: usize,

    /// Approximate bytes held by the index
    pub index_bytes: usize,

    /// Frames in the log (0 when cached-only)
    pub log_records: u64,

    /// Log file size (0 when cached-only)
    pub log_bytes: u64,

    pub cached_only: bool,
}

impl Store {
    /// Create a store with no backing file
    ///
    /// All data lives in memory until `close`.
    pub fn create_cached_only() -> Self {
        debug!("created cached-only store");
        Self::from_parts(
            Config::cached_only(),
            StoreInner {
                index: Index::new(),
                log: None,
            },
        )
    }

    /// Open or create a store with the given config
    ///
    /// With a path, the log is replayed into the index: later records for a
    /// key supersede earlier ones and tombstones remove the key. A corrupt
    /// frame aborts the open. Without a path the store is cached-only.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let Some(path) = config.path.clone() else {
            debug!("opened cached-only store");
            return Ok(Self::from_parts(
                config,
                StoreInner {
                    index: Index::new(),
                    log: None,
                },
            ));
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut index = Index::new();
        let log = AppendLog::open(&path, config.sync_strategy, |replayed: ReplayedRecord| {
            match replayed.record {
                Record::Put { key, .. } => {
                    index.insert(&key, IndexSlot::Logged(replayed.location))?;
                }
                Record::Tombstone { key } => {
                    index.remove(&key);
                }
            }
            Ok(())
        })?
        .with_size_limit(config.max_log_bytes);

        info!(
            path = %path.display(),
            live_keys = index.len(),
            log_records = log.record_count(),
            "opened store"
        );

        Ok(Self::from_parts(
            config,
            StoreInner {
                index,
                log: Some(log),
            },
        ))
    }

    /// Open a persistent store at `path` with default settings
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().path(path).build())
    }

    fn from_parts(config: Config, inner: StoreInner) -> Self {
        Self {
            config,
            state: RwLock::new(HandleState::Open(inner)),
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Get the value for a key, `None` if absent or deleted
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let state = self.state.read();
        state.inner()?.get(key)
    }

    /// Insert or replace the value for a key
    ///
    /// Persistent stores append the record before touching the index; if the
    /// append fails the index is left as it was.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut state = self.state.write();
        let compression_threshold = self.config.compression_threshold;
        state.inner_mut()?.put(key, value, compression_threshold)
    }

    /// Delete a key
    ///
    /// Returns whether the key had a value. Deleting an absent key is a
    /// successful no-op and writes nothing to the log.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        let mut state = self.state.write();
        state.inner_mut()?.delete(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        let state = self.state.read();
        Ok(state.inner()?.index.contains_key(key))
    }

    /// Number of live keys
    pub fn len(&self) -> Result<usize> {
        let state = self.state.read();
        Ok(state.inner()?.index.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All live keys, in no particular order
    pub fn keys(&self) -> Result<Vec<Vec<u8>>> {
        let state = self.state.read();
        let index = &state.inner()?.index;

        let mut keys = Vec::new();
        keys.try_reserve_exact(index.len())?;
        for key in index.keys() {
            keys.push(try_copy(key)?);
        }
        Ok(keys)
    }

    /// Sync pending log writes to disk (no-op when cached-only)
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.write();
        match state.inner_mut()?.log.as_mut() {
            Some(log) => log.sync(),
            None => Ok(()),
        }
    }

    /// Rewrite the log to hold only live records (no-op when cached-only)
    pub fn compact(&self) -> Result<()> {
        let mut state = self.state.write();
        state.inner_mut()?.compact()
    }

    /// Close the store
    ///
    /// Syncs the log, compacts it if it has become sparse, then releases
    /// everything the handle owns. Release happens even when syncing or
    /// compacting fails; the first such error is returned.
    pub fn close(&self) -> Result<()> {
        let inner = {
            let mut state = self.state.write();
            match mem::replace(&mut *state, HandleState::Closed) {
                HandleState::Open(inner) => inner,
                HandleState::Closed => return Err(StoreError::HandleClosed),
            }
        };

        inner.shutdown(&self.config)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn is_cached_only(&self) -> bool {
        self.config.is_cached_only()
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.state.read(), HandleState::Closed)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let state = self.state.read();
        let inner = state.inner()?;

        Ok(StoreStats {
            live_keys: inner.index.len(),
            index_bytes: inner.index.size(),
            log_records: inner.log.as_ref().map_or(0, AppendLog::record_count),
            log_bytes: inner.log.as_ref().map_or(0, AppendLog::size_bytes),
            cached_only: inner.log.is_none(),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let HandleState::Open(inner) = mem::replace(self.state.get_mut(), HandleState::Closed) {
            if let Err(e) = inner.shutdown(&self.config) {
                warn!(error = %e, "error while closing dropped store");
            }
        }
    }
}

impl StoreInner {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(slot) = self.index.get(key) else {
            return Ok(None);
        };

        match slot {
            IndexSlot::Resident(value) => Ok(Some(try_copy(value)?)),
            IndexSlot::Logged(location) => {
                let log = self.log.as_ref().ok_or_else(|| {
                    StoreError::CorruptRecord("index refers to a log the store does not have".to_string())
                })?;
                match log.read(*location)? {
                    Record::Put { value, .. } => Ok(Some(value)),
                    Record::Tombstone { .. } => Err(StoreError::CorruptRecord(format!(
                        "index points at a tombstone at offset {}",
                        location.offset
                    ))),
                }
            }
        }
    }

    fn put(&mut self, key: &[u8], value: &[u8], compression_threshold: Option<usize>) -> Result<()> {
        // Reserve index memory first so a logged record never goes unindexed
        let reserved = self.index.reserve(key)?;

        let slot = match self.log.as_mut() {
            Some(log) => {
                let compress = compression_threshold.is_some_and(|min| value.len() >= min);
                IndexSlot::Logged(log.append(RecordRef::Put { key, value }, compress)?)
            }
            None => IndexSlot::Resident(try_copy(value)?),
        };

        self.index.insert_reserved(key, reserved, slot);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        if !self.index.contains_key(key) {
            return Ok(false);
        }

        if let Some(log) = self.log.as_mut() {
            log.append(RecordRef::Tombstone { key }, false)?;
        }

        Ok(self.index.remove(key))
    }

    fn compact(&mut self) -> Result<()> {
        let Some(log) = self.log.as_mut() else {
            return Ok(());
        };

        let live = self.index.logged_entries()?;
        let locations: Vec<_> = live.iter().map(|(_, location)| *location).collect();

        let relocated = log.compact(&locations)?;
        for ((key, _), location) in live.iter().zip(relocated) {
            self.index.relocate(key, location);
        }

        Ok(())
    }

    /// Whether the log has enough dead frames to be worth compacting
    fn should_compact(&self, config: &Config) -> bool {
        let Some(log) = self.log.as_ref() else {
            return false;
        };

        let total = log.record_count();
        if !config.compact_on_close || total == 0 || total < config.compaction_min_records {
            return false;
        }

        let live_ratio = self.index.len() as f64 / total as f64;
        live_ratio < config.compaction_ratio
    }

    /// Sync, maybe compact, and release everything
    fn shutdown(mut self, config: &Config) -> Result<()> {
        let mut first_error = None;

        if let Some(log) = self.log.as_mut() {
            if let Err(e) = log.sync() {
                first_error = Some(e);
            }
        }

        if first_error.is_none() && self.should_compact(config) {
            if let Err(e) = self.compact() {
                first_error = Some(e);
            }
        }

        let live_keys = self.index.len();
        self.index.clear();
        drop(self.log.take());

        match first_error {
            None => {
                info!(live_keys, "closed store");
                Ok(())
            }
            Some(e) => {
                warn!(error = %e, live_keys, "closed store with error");
                Err(e)
            }
        }
    }
}
