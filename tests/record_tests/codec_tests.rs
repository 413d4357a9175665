//! Tests for the record codec
//!
//! These tests verify:
//! - Round-trips for puts, tombstones and empty values
//! - Compression flag handling and fallback to raw values
//! - CRC32C corruption detection
//! - Truncated frames never decode
//! - Decompression failures

use simplestore::record::{
    decode, decode_header, encode, Record, RecordRef, FLAG_COMPRESSED, FLAG_TOMBSTONE, HEADER_SIZE,
};
use simplestore::StoreError;

// =============================================================================
// Helper Functions
// =============================================================================

fn put(key: &[u8], value: &[u8]) -> Record {
    Record::Put {
        key: key.to_vec(),
        value: value.to_vec(),
    }
}

/// Build a frame by hand with a valid checksum over `stored`
fn raw_frame(key: &[u8], stored: &[u8], flags: u8) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&(key.len() as u32).to_le_bytes());
    frame.extend_from_slice(&(stored.len() as u32).to_le_bytes());
    frame.push(flags);
    frame.extend_from_slice(&crc32c::crc32c(stored).to_le_bytes());
    frame.extend_from_slice(key);
    frame.extend_from_slice(stored);
    frame
}

fn compressible_value(len: usize) -> Vec<u8> {
    b"http://proxy-0:8080;".iter().copied().cycle().take(len).collect()
}

// =============================================================================
// Round-Trip Tests
// =============================================================================

#[test]
fn test_encode_decode_put() {
    let record = put(b"hello", b"world");

    let bytes = encode(RecordRef::Put { key: b"hello", value: b"world" }, false).unwrap();
    let decoded = decode(&bytes).unwrap();

    assert_eq!(decoded.record, record);
    assert!(!decoded.compressed);
    assert_eq!(decoded.frame_len, bytes.len());
    assert_eq!(decoded.checksum, crc32c::crc32c(b"world"));
}

#[test]
fn test_encode_decode_tombstone() {
    let bytes = encode(RecordRef::Tombstone { key: b"gone" }, false).unwrap();
    let decoded = decode(&bytes).unwrap();

    assert_eq!(decoded.record, Record::Tombstone { key: b"gone".to_vec() });
    assert!(decoded.record.is_tombstone());
    assert_eq!(bytes.len(), HEADER_SIZE + 4);
}

#[test]
fn test_encode_decode_empty_value() {
    let record = put(b"key_with_empty_value", b"");

    let bytes = encode(RecordRef::Put { key: b"key_with_empty_value", value: b"" }, false).unwrap();
    let decoded = decode(&bytes).unwrap();

    assert_eq!(decoded.record, record);
}

#[test]
fn test_header_layout() {
    let bytes = encode(RecordRef::Put { key: b"abc", value: b"12345" }, false).unwrap();
    let header = decode_header(&bytes).unwrap();

    assert_eq!(header.key_len, 3);
    assert_eq!(header.value_len, 5);
    assert_eq!(header.flags, 0);
    assert_eq!(header.frame_len(), HEADER_SIZE + 3 + 5);
    assert_eq!(&bytes[HEADER_SIZE..HEADER_SIZE + 3], b"abc");
    assert_eq!(&bytes[HEADER_SIZE + 3..], b"12345");
}

#[test]
fn test_decode_ignores_trailing_bytes() {
    let mut bytes = encode(RecordRef::Put { key: b"k", value: b"v" }, false).unwrap();
    let frame_len = bytes.len();
    bytes.extend_from_slice(b"next frame starts here");

    let decoded = decode(&bytes).unwrap();
    assert_eq!(decoded.frame_len, frame_len);
    assert_eq!(decoded.record, put(b"k", b"v"));
}

// =============================================================================
// Compression Tests
// =============================================================================

#[test]
fn test_compressed_round_trip() {
    let value = compressible_value(8 * 1024);
    let record = put(b"big", &value);

    let bytes = encode(RecordRef::Put { key: b"big", value: &value }, true).unwrap();
    let decoded = decode(&bytes).unwrap();

    assert!(decoded.compressed);
    assert!(bytes.len() < value.len());
    assert_eq!(decoded.record, record);
}

#[test]
fn test_compressed_round_trip_empty_value() {
    let record = put(b"empty", b"");

    let bytes = encode(RecordRef::Put { key: b"empty", value: b"" }, true).unwrap();
    let decoded = decode(&bytes).unwrap();

    assert_eq!(decoded.record, record);
    assert!(!decoded.compressed);
}

#[test]
fn test_incompressible_value_stored_raw() {
    // Short values never shrink once the length prefix is added
    let record = put(b"short", b"xyz");

    let bytes = encode(RecordRef::Put { key: b"short", value: b"xyz" }, true).unwrap();
    let header = decode_header(&bytes).unwrap();

    assert_eq!(header.flags & FLAG_COMPRESSED, 0);
    assert_eq!(decode(&bytes).unwrap().record, record);
}

#[test]
fn test_checksum_covers_compressed_bytes() {
    let value = compressible_value(4096);
    let bytes = encode(RecordRef::Put { key: b"k", value: &value }, true).unwrap();
    let header = decode_header(&bytes).unwrap();

    let stored = &bytes[HEADER_SIZE + 1..];
    assert_eq!(header.checksum, crc32c::crc32c(stored));
    assert_ne!(header.checksum, crc32c::crc32c(&value));
}

#[test]
fn test_decompression_garbage_payload() {
    let mut stored = 100u32.to_le_bytes().to_vec();
    stored.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x11]);
    let frame = raw_frame(b"k", &stored, FLAG_COMPRESSED);

    let result = decode(&frame);
    assert!(matches!(
        result,
        Err(StoreError::DecompressionFailed { expected: 100, .. })
    ));
}

#[test]
fn test_decompression_declared_length_too_large() {
    let value = compressible_value(1000);
    let payload = zstd::bulk::compress(&value, 3).unwrap();

    let mut stored = 2000u32.to_le_bytes().to_vec();
    stored.extend_from_slice(&payload);
    let frame = raw_frame(b"k", &stored, FLAG_COMPRESSED);

    assert!(matches!(
        decode(&frame),
        Err(StoreError::DecompressionFailed { expected: 2000, .. })
    ));
}

#[test]
fn test_decompression_declared_length_too_small() {
    let value = compressible_value(1000);
    let payload = zstd::bulk::compress(&value, 3).unwrap();

    let mut stored = 500u32.to_le_bytes().to_vec();
    stored.extend_from_slice(&payload);
    let frame = raw_frame(b"k", &stored, FLAG_COMPRESSED);

    assert!(matches!(
        decode(&frame),
        Err(StoreError::DecompressionFailed { expected: 500, .. })
    ));
}

#[test]
fn test_decompression_huge_declared_length() {
    // A tiny payload claiming a 4 GiB value must fail without reserving it
    let payload = zstd::bulk::compress(b"tiny", 3).unwrap();

    let mut stored = u32::MAX.to_le_bytes().to_vec();
    stored.extend_from_slice(&payload);
    let frame = raw_frame(b"k", &stored, FLAG_COMPRESSED);

    match decode(&frame) {
        Err(StoreError::DecompressionFailed { expected, reason }) => {
            assert_eq!(expected, u32::MAX as usize);
            assert!(reason.contains("inflated to 4 bytes"), "reason: {}", reason);
        }
        other => panic!("expected DecompressionFailed, got {:?}", other),
    }
}

// =============================================================================
// Corruption Detection Tests
// =============================================================================

#[test]
fn test_checksum_mismatch_detected() {
    let mut bytes = encode(RecordRef::Put { key: b"key", value: b"value" }, false).unwrap();

    if let Some(byte) = bytes.last_mut() {
        *byte ^= 0xFF;
    }

    assert!(matches!(decode(&bytes), Err(StoreError::CorruptRecord(_))));
}

#[test]
fn test_corrupted_checksum_field_detected() {
    let mut bytes = encode(RecordRef::Put { key: b"key", value: b"value" }, false).unwrap();

    // Checksum occupies bytes 9..13
    bytes[9] ^= 0xFF;

    assert!(matches!(decode(&bytes), Err(StoreError::CorruptRecord(_))));
}

#[test]
fn test_every_truncation_is_corrupt() {
    let bytes = encode(RecordRef::Put { key: b"WebProxy", value: b"http://proxy-1:8080" }, false).unwrap();

    for len in 0..bytes.len() {
        let result = decode(&bytes[..len]);
        assert!(
            matches!(result, Err(StoreError::CorruptRecord(_))),
            "prefix of {} bytes decoded: {:?}",
            len,
            result
        );
    }
}

#[test]
fn test_truncated_compressed_frame_is_corrupt() {
    let value = compressible_value(8 * 1024);
    let bytes = encode(RecordRef::Put { key: b"k", value: &value }, true).unwrap();

    let result = decode(&bytes[..bytes.len() - 1]);
    assert!(matches!(result, Err(StoreError::CorruptRecord(_))));
}

#[test]
fn test_unknown_flags_rejected() {
    let frame = raw_frame(b"k", b"v", 0b100);
    assert!(matches!(decode(&frame), Err(StoreError::CorruptRecord(_))));
}

#[test]
fn test_tombstone_with_value_rejected() {
    let frame = raw_frame(b"k", b"v", FLAG_TOMBSTONE);
    assert!(matches!(decode(&frame), Err(StoreError::CorruptRecord(_))));
}

#[test]
fn test_empty_buffer_is_corrupt() {
    assert!(matches!(decode(&[]), Err(StoreError::CorruptRecord(_))));
    assert!(matches!(decode_header(&[0u8; 5]), Err(StoreError::CorruptRecord(_))));
}
