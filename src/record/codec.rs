//! Record codec
//!
//! Encoding and decoding of single log frames. Pure transforms, no I/O.

use std::borrow::Cow;

use bytes::{Buf, BufMut};

use crate::error::{Result, StoreError};

use super::compression;
use super::{Record, RecordRef, FLAG_COMPRESSED, FLAG_TOMBSTONE, HEADER_SIZE};

/// Parsed fixed-size frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub key_len: u32,
    /// Length of the stored (possibly compressed) value section
    pub value_len: u32,
    pub flags: u8,
    pub checksum: u32,
}

impl RecordHeader {
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    pub fn is_tombstone(&self) -> bool {
        self.flags & FLAG_TOMBSTONE != 0
    }

    /// Total frame length: header + key + stored value
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.key_len as usize + self.value_len as usize
    }
}

/// A record decoded from a frame, with its frame metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    pub record: Record,
    pub compressed: bool,
    pub checksum: u32,
    /// Bytes consumed from the input buffer
    pub frame_len: usize,
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a record into a frame
///
/// When `compress` is set the value is compressed before checksumming, unless
/// compression does not shrink it, in which case the raw value is stored and
/// the compressed flag stays clear. Tombstones never carry a value.
pub fn encode(record: RecordRef<'_>, compress: bool) -> Result<Vec<u8>> {
    let key = record.key();

    let (flags, stored): (u8, Cow<'_, [u8]>) = match record {
        RecordRef::Tombstone { .. } => (FLAG_TOMBSTONE, Cow::Borrowed(&[][..])),
        RecordRef::Put { value, .. } if compress => match compression::compress(value) {
            Some(packed) => (FLAG_COMPRESSED, Cow::Owned(packed)),
            None => (0, Cow::Borrowed(value)),
        },
        RecordRef::Put { value, .. } => (0, Cow::Borrowed(value)),
    };

    let key_len = length_u32("key", key.len())?;
    let value_len = length_u32("value", stored.len())?;
    let checksum = crc32c::crc32c(&stored);

    let mut frame = Vec::new();
    frame.try_reserve_exact(HEADER_SIZE + key.len() + stored.len())?;
    frame.put_u32_le(key_len);
    frame.put_u32_le(value_len);
    frame.put_u8(flags);
    frame.put_u32_le(checksum);
    frame.put_slice(key);
    frame.put_slice(&stored);

    Ok(frame)
}

fn length_u32(what: &str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        StoreError::RecordTooLarge(format!("{} length {} exceeds u32::MAX", what, len))
    })
}

// =============================================================================
// Decoding
// =============================================================================

/// Parse just the fixed header at the start of `buf`
pub fn decode_header(buf: &[u8]) -> Result<RecordHeader> {
    if buf.len() < HEADER_SIZE {
        return Err(StoreError::CorruptRecord(format!(
            "truncated header: {} of {} bytes",
            buf.len(),
            HEADER_SIZE
        )));
    }

    let mut cursor = &buf[..HEADER_SIZE];
    let header = RecordHeader {
        key_len: cursor.get_u32_le(),
        value_len: cursor.get_u32_le(),
        flags: cursor.get_u8(),
        checksum: cursor.get_u32_le(),
    };

    if header.flags & !(FLAG_COMPRESSED | FLAG_TOMBSTONE) != 0 {
        return Err(StoreError::CorruptRecord(format!(
            "unknown flag bits {:#04x}",
            header.flags
        )));
    }

    if header.is_tombstone() && (header.value_len != 0 || header.is_compressed()) {
        return Err(StoreError::CorruptRecord(
            "tombstone frame declares a value".to_string(),
        ));
    }

    Ok(header)
}

/// Decode the frame at the start of `buf`
///
/// Trailing bytes after the frame are ignored; `frame_len` reports how many
/// were consumed. A short buffer or checksum mismatch is `CorruptRecord`.
pub fn decode(buf: &[u8]) -> Result<DecodedRecord> {
    let header = decode_header(buf)?;
    let frame_len = header.frame_len();

    if buf.len() < frame_len {
        return Err(StoreError::CorruptRecord(format!(
            "truncated frame: {} of {} bytes",
            buf.len(),
            frame_len
        )));
    }

    let key_end = HEADER_SIZE + header.key_len as usize;
    let key = &buf[HEADER_SIZE..key_end];
    let stored = &buf[key_end..frame_len];

    let actual = crc32c::crc32c(stored);
    if actual != header.checksum {
        return Err(StoreError::CorruptRecord(format!(
            "checksum mismatch: expected {:#010x}, got {:#010x}",
            header.checksum, actual
        )));
    }

    let record = if header.is_tombstone() {
        Record::Tombstone { key: key.to_vec() }
    } else {
        let value = if header.is_compressed() {
            compression::decompress(stored)?
        } else {
            stored.to_vec()
        };
        Record::Put {
            key: key.to_vec(),
            value,
        }
    };

    Ok(DecodedRecord {
        record,
        compressed: header.is_compressed(),
        checksum: header.checksum,
        frame_len,
    })
}
