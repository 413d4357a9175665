//! Append Log Module
//!
//! On-disk sequence of record frames.
//!
//! ## Responsibilities
//! - Append frames at the end of the file (the only mutation)
//! - Replay every frame on open, in file order
//! - Random-access reads of a single frame for index lookups
//! - Compaction into a fresh file via write-to-temp-then-rename
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Frame 1 (header + key + value)          │
//! ├─────────────────────────────────────────┤
//! │ Frame 2                                 │
//! ├─────────────────────────────────────────┤
//! │ ...                                     │
//! └─────────────────────────────────────────┘
//! ```
//! There is no file header; an empty file is an empty log.

mod compaction;
mod reader;
mod writer;

pub use reader::LogReader;
pub use writer::AppendLog;

use crate::record::Record;

/// Where a frame lives in the log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordLocation {
    /// Byte offset of the frame header
    pub offset: u64,

    /// Length of the whole frame
    pub len: u64,
}

/// A record handed to the replay callback on open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayedRecord {
    pub location: RecordLocation,
    pub record: Record,
}
