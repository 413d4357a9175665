//! Log Reader
//!
//! Sequential frame reader used for replay, plus the positioned frame read
//! shared by lookups and compaction.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};

use crate::error::{Result, StoreError};
use crate::record::{self, DecodedRecord, HEADER_SIZE};

use super::RecordLocation;

/// Upfront buffer reservation when reading a frame body
const READ_CHUNK: usize = 64 * 1024;

/// Reads frames from the start of a log file to its end
pub struct LogReader<R: Read> {
    reader: R,
    position: u64,
    /// Set once the iterator has yielded an error
    failed: bool,
}

impl LogReader<BufReader<File>> {
    /// Open a log file for sequential reading
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> LogReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            position: 0,
            failed: false,
        }
    }

    /// Offset of the next frame
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read and verify the next frame
    ///
    /// Returns `Ok(None)` at a clean end of file. A partial header or body
    /// at the tail is a truncated frame and fails with `CorruptRecord`.
    pub fn next_record(&mut self) -> Result<Option<(RecordLocation, DecodedRecord)>> {
        let mut header = [0u8; HEADER_SIZE];
        let filled = read_fully(&mut self.reader, &mut header)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < HEADER_SIZE {
            return Err(StoreError::CorruptRecord(format!(
                "truncated header at offset {}: {} of {} bytes",
                self.position, filled, HEADER_SIZE
            )));
        }

        let parsed = record::decode_header(&header)?;
        let frame_len = parsed.frame_len();

        // Grow with the bytes actually present; a corrupt header must not
        // drive a huge allocation
        let body_len = frame_len - HEADER_SIZE;
        let mut frame = Vec::new();
        frame.try_reserve(HEADER_SIZE + body_len.min(READ_CHUNK))?;
        frame.extend_from_slice(&header);

        let body_filled = (&mut self.reader).take(body_len as u64).read_to_end(&mut frame)?;
        if body_filled < body_len {
            return Err(StoreError::CorruptRecord(format!(
                "truncated frame at offset {}: {} of {} bytes",
                self.position,
                HEADER_SIZE + body_filled,
                frame_len
            )));
        }

        let decoded = record::decode(&frame)?;
        let location = RecordLocation {
            offset: self.position,
            len: frame_len as u64,
        };
        self.position += frame_len as u64;

        Ok(Some((location, decoded)))
    }
}

impl<R: Read> Iterator for LogReader<R> {
    type Item = Result<(RecordLocation, DecodedRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_record().transpose();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}

/// Read the raw bytes of the frame at `location`
pub(super) fn read_frame_at<F: Read + Seek>(file: &mut F, location: RecordLocation) -> Result<Vec<u8>> {
    let len = usize::try_from(location.len).map_err(|_| {
        StoreError::CorruptRecord(format!("frame length {} does not fit in memory", location.len))
    })?;

    let mut frame = Vec::new();
    frame.try_reserve_exact(len)?;
    frame.resize(len, 0);

    file.seek(SeekFrom::Start(location.offset))?;
    file.read_exact(&mut frame).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => StoreError::CorruptRecord(format!(
            "frame at offset {} runs past the end of the log",
            location.offset
        )),
        _ => StoreError::Io(e),
    })?;

    Ok(frame)
}

/// Fill `buf` as far as the reader allows, returning the bytes read
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
