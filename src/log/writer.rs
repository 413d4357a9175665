//! Append Log
//!
//! Owns the log file: replay on open, appends, positioned reads.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::SyncStrategy;
use crate::error::{Result, StoreError};
use crate::record::{self, Record, RecordRef};

use super::reader::{read_frame_at, LogReader};
use super::{RecordLocation, ReplayedRecord};

/// Append-only log of record frames
///
/// ## Concurrency:
/// - Appends, sync and compaction take `&mut self`; the owner serializes them
/// - `read` takes `&self`; the read handle sits behind its own Mutex so
///   lookups can run while the owner holds only a shared lock
pub struct AppendLog {
    /// Path of the log file
    pub(super) path: PathBuf,

    /// Write handle, always positioned by explicit seeks
    pub(super) file: File,

    /// Separate read handle for positioned lookups
    pub(super) reader: Mutex<File>,

    /// Offset one past the last complete frame
    pub(super) end: u64,

    /// Frames in the file (replayed + appended)
    pub(super) record_count: u64,

    /// Frames appended since the last fsync
    pub(super) unsynced: usize,

    pub(super) sync_strategy: SyncStrategy,

    /// Appends that would grow the file past this fail with `LogFull`
    pub(super) max_bytes: Option<u64>,
}

impl AppendLog {
    /// Open or create a log file, replaying every frame through `replay`
    ///
    /// Frames are delivered in file order, so a later record for a key
    /// supersedes an earlier one. Any corrupt or truncated frame aborts the
    /// open; nothing is skipped.
    pub fn open<F>(path: &Path, sync_strategy: SyncStrategy, mut replay: F) -> Result<Self>
    where
        F: FnMut(ReplayedRecord) -> Result<()>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut record_count = 0u64;
        let mut log_reader = LogReader::open(path)?;
        for item in &mut log_reader {
            let (location, decoded) = item?;
            record_count += 1;
            replay(ReplayedRecord {
                location,
                record: decoded.record,
            })?;
        }
        let end = log_reader.position();

        let file_len = file.metadata()?.len();
        if file_len != end {
            return Err(StoreError::CorruptRecord(format!(
                "log length {} does not match replayed length {}",
                file_len, end
            )));
        }

        info!(path = %path.display(), records = record_count, bytes = end, "opened append log");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            reader: Mutex::new(File::open(path)?),
            end,
            record_count,
            unsynced: 0,
            sync_strategy,
            max_bytes: None,
        })
    }

    /// Cap the size the log may grow to
    pub fn with_size_limit(mut self, max_bytes: Option<u64>) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Append a record at the end of the log
    ///
    /// On any failure (write or sync) the file is cut back to its previous
    /// length so no partial frame survives.
    pub fn append(&mut self, record: RecordRef<'_>, compress: bool) -> Result<RecordLocation> {
        let frame = record::encode(record, compress)?;
        let offset = self.end;

        if let Some(limit) = self.max_bytes {
            let needed = frame.len() as u64;
            if offset + needed > limit {
                return Err(StoreError::LogFull {
                    size: offset,
                    needed,
                    limit,
                });
            }
        }

        if let Err(e) = self.write_frame(offset, &frame) {
            if let Err(rollback) = self.file.set_len(offset) {
                warn!(error = %rollback, offset, "failed to roll back partial append");
            }
            return Err(e);
        }

        self.end += frame.len() as u64;
        self.record_count += 1;

        Ok(RecordLocation {
            offset,
            len: frame.len() as u64,
        })
    }

    fn write_frame(&mut self, offset: u64, frame: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(frame)?;

        self.unsynced += 1;
        let should_sync = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if should_sync {
            self.sync()?;
        }

        Ok(())
    }

    /// Read and verify the record at `location`
    pub fn read(&self, location: RecordLocation) -> Result<Record> {
        let frame = {
            let mut reader = self.reader.lock();
            read_frame_at(&mut *reader, location)?
        };

        let decoded = record::decode(&frame)?;
        if decoded.frame_len as u64 != location.len {
            return Err(StoreError::CorruptRecord(format!(
                "frame at offset {} is {} bytes, index expected {}",
                location.offset, decoded.frame_len, location.len
            )));
        }

        Ok(decoded.record)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        if self.unsynced > 0 {
            self.file.sync_data()?;
            debug!(records = self.unsynced, "synced append log");
            self.unsynced = 0;
        }
        Ok(())
    }

    /// Number of frames in the log
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Size of the log file in bytes
    pub fn size_bytes(&self) -> u64 {
        self.end
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
