//! Value compression
//!
//! Compresses with zstd's bulk API and inflates through its streaming
//! decoder. A compressed value section is prefixed with the original length
//! so decompression can be checked against it.

use std::io::Read;

use bytes::{Buf, BufMut};
use tracing::debug;

use crate::error::{Result, StoreError};

/// zstd compression level (favors speed, values are small)
const ZSTD_LEVEL: i32 = 3;

/// Size of the original-length prefix
const LEN_PREFIX: usize = 4;

/// Most output reserved up front; the declared length is not trusted
const INFLATE_RESERVE: usize = 64 * 1024;

/// Compress a value into `[original_len][payload]`
///
/// Returns `None` when compression fails or would not shrink the value;
/// the caller then stores the raw bytes with the compressed flag clear.
pub(super) fn compress(value: &[u8]) -> Option<Vec<u8>> {
    let original_len = u32::try_from(value.len()).ok()?;

    let payload = match zstd::bulk::compress(value, ZSTD_LEVEL) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(error = %e, len = value.len(), "compression failed, storing raw value");
            return None;
        }
    };

    if payload.len() + LEN_PREFIX >= value.len() {
        return None;
    }

    let mut stored = Vec::with_capacity(LEN_PREFIX + payload.len());
    stored.put_u32_le(original_len);
    stored.put_slice(&payload);
    Some(stored)
}

/// Reverse `compress`, failing unless exactly the declared length comes back
pub(super) fn decompress(stored: &[u8]) -> Result<Vec<u8>> {
    if stored.len() < LEN_PREFIX {
        return Err(StoreError::CorruptRecord(
            "compressed value is missing its length prefix".to_string(),
        ));
    }

    let mut cursor = stored;
    let expected = cursor.get_u32_le() as usize;

    let failed = |e: std::io::Error| StoreError::DecompressionFailed {
        expected,
        reason: e.to_string(),
    };

    let decoder = zstd::stream::read::Decoder::with_buffer(cursor).map_err(failed)?;

    // One byte past the declared length is enough to detect an overrun
    let mut value = Vec::new();
    value.try_reserve_exact(expected.min(INFLATE_RESERVE))?;
    decoder
        .take(expected as u64 + 1)
        .read_to_end(&mut value)
        .map_err(failed)?;

    if value.len() != expected {
        return Err(StoreError::DecompressionFailed {
            expected,
            reason: if value.len() > expected {
                "inflated past the declared length".to_string()
            } else {
                format!("inflated to {} bytes", value.len())
            },
        });
    }

    Ok(value)
}
