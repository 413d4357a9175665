//! Log Compaction
//!
//! Rewrites the log so it holds only the frames still referenced by the
//! index. Frames are copied verbatim (compressed bytes stay compressed) after
//! being verified.
//!
//! ## Steps
//! 1. Copy each live frame into `<log>.compact`
//! 2. fsync the temp file
//! 3. Open the write and read handles on the temp file
//! 4. Rename it over the log
//!
//! If steps 1-4 fail the temp file is removed and the original log is left
//! exactly as it was.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::record;

use super::reader::read_frame_at;
use super::{AppendLog, RecordLocation};

impl AppendLog {
    /// Rewrite the log to contain only the frames at `live`
    ///
    /// Returns the new location of each frame, in the same order as `live`.
    pub fn compact(&mut self, live: &[RecordLocation]) -> Result<Vec<RecordLocation>> {
        let temp_path = Self::compaction_path(&self.path);
        let old_size = self.end;
        let old_records = self.record_count;

        let (relocated, new_size, file, reader) = match self.prepare_compacted(&temp_path, live) {
            Ok(prepared) => prepared,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&temp_path) {
                    debug!(error = %cleanup, path = %temp_path.display(), "no compaction temp file to remove");
                }
                warn!(error = %e, path = %self.path.display(), "compaction failed, log left untouched");
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                warn!(error = %cleanup, path = %temp_path.display(), "failed to remove compaction temp file");
            }
            return Err(e.into());
        }

        // Nothing fallible past the rename: the handles were opened on the
        // temp file and follow it to its new name
        self.file = file;
        self.reader = Mutex::new(reader);
        self.end = new_size;
        self.record_count = live.len() as u64;
        self.unsynced = 0;
        sync_parent_dir(&self.path);

        info!(
            path = %self.path.display(),
            records_before = old_records,
            records_after = self.record_count,
            bytes_before = old_size,
            bytes_after = new_size,
            "compacted append log"
        );

        Ok(relocated)
    }

    /// Write the compacted log to `temp_path` and open both handles on it
    fn prepare_compacted(
        &self,
        temp_path: &Path,
        live: &[RecordLocation],
    ) -> Result<(Vec<RecordLocation>, u64, File, File)> {
        let (relocated, new_size, file) = self.write_compacted(temp_path, live)?;
        let reader = File::open(temp_path)?;
        Ok((relocated, new_size, file, reader))
    }

    /// Copy the live frames into `temp_path` and fsync it
    ///
    /// Returns the file so it can become the log's write handle.
    fn write_compacted(
        &self,
        temp_path: &Path,
        live: &[RecordLocation],
    ) -> Result<(Vec<RecordLocation>, u64, File)> {
        let file = OpenOptions::new()
            .read(true)
            .create(true)
            .write(true)
            .truncate(true)
            .open(temp_path)?;
        let mut writer = BufWriter::new(file);

        let mut relocated = Vec::new();
        relocated.try_reserve_exact(live.len())?;
        let mut offset = 0u64;

        {
            let mut reader = self.reader.lock();
            for location in live {
                let frame = read_frame_at(&mut *reader, *location)?;
                // Never carry a corrupt frame into the new log
                record::decode(&frame)?;

                writer.write_all(&frame)?;
                relocated.push(RecordLocation {
                    offset,
                    len: location.len,
                });
                offset += location.len;
            }
        }

        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        Ok((relocated, offset, file))
    }

    /// Path of the temp file used while compacting
    pub fn compaction_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".compact");
        PathBuf::from(name)
    }
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return;
    };
    if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
        warn!(error = %e, dir = %parent.display(), "failed to sync log directory after compaction");
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}
