//! Record Module
//!
//! The persisted unit of the append log.
//!
//! ## Responsibilities
//! - Encode a put or a tombstone into a self-describing frame
//! - CRC32C checksum over the stored value bytes
//! - Optional per-record value compression
//!
//! ## Frame Format
//! ```text
//! ┌────────────┬──────────────┬───────────┬──────────────┬───────┬─────────┐
//! │ KeyLen (4) │ ValueLen (4) │ Flags (1) │ Checksum (4) │  Key  │  Value  │
//! └────────────┴──────────────┴───────────┴──────────────┴───────┴─────────┘
//! ```
//! Flags: bit0 = compressed, bit1 = tombstone. Integers are little-endian.
//! A compressed value section holds `[OriginalLen (4)][payload]`.

mod codec;
mod compression;

pub use codec::{decode, decode_header, encode, DecodedRecord, RecordHeader};

/// Fixed size of the frame header
pub const HEADER_SIZE: usize = 13;

/// Flag bit: value bytes are compressed
pub const FLAG_COMPRESSED: u8 = 0b01;

/// Flag bit: record is a tombstone
pub const FLAG_TOMBSTONE: u8 = 0b10;

/// A single owned record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A key bound to a value
    Put { key: Vec<u8>, value: Vec<u8> },

    /// A deleted key
    Tombstone { key: Vec<u8> },
}

impl Record {
    pub fn key(&self) -> &[u8] {
        match self {
            Record::Put { key, .. } | Record::Tombstone { key } => key,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Record::Tombstone { .. })
    }
}

/// A borrowed record, so callers can encode without copying key and value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRef<'a> {
    Put { key: &'a [u8], value: &'a [u8] },
    Tombstone { key: &'a [u8] },
}

impl<'a> RecordRef<'a> {
    pub fn key(&self) -> &'a [u8] {
        match self {
            RecordRef::Put { key, .. } | RecordRef::Tombstone { key } => key,
        }
    }
}
