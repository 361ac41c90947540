// rust/ranking-data/src/record/tfrecord.rs

//! TFRecord framing.

use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;

use crate::error::{DataError, Result};

/// Size of the length prefix plus its checksum.
const HEADER_SIZE: usize = 12;

/// Size of the payload checksum.
const FOOTER_SIZE: usize = 4;

const MASK_DELTA: u32 = 0xa282_ead8;

/// CRC32C of `data`, rotated and offset the way TFRecord stores it.
pub fn masked_crc32c(data: &[u8]) -> u32 {
    let crc = crc32c::crc32c(data);
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

/// Reads framed records from a byte stream.
///
/// Iteration stops after the first error; a stream that ends exactly on a
/// frame boundary ends cleanly.
pub struct TfRecordReader<R> {
    reader: R,
    path: PathBuf,
    records_read: u64,
    done: bool,
}

impl<R: Read> TfRecordReader<R> {
    /// Creates a reader. `path` is only used in error messages.
    pub fn new(reader: R, path: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            path: path.into(),
            records_read: 0,
            done: false,
        }
    }

    /// Reads the next record payload.
    ///
    /// Returns `Ok(None)` at a clean end of stream.
    ///
    /// # Errors
    ///
    /// Returns a `Record` error for truncated frames or checksum mismatches,
    /// and a `Storage` error if the underlying read fails.
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_SIZE];
        let filled = self.read_fully(&mut header)?;
        if filled == 0 {
            self.done = true;
            return Ok(None);
        }
        if filled < HEADER_SIZE {
            return Err(self.fail(format!(
                "truncated record header after {} records ({filled} of {HEADER_SIZE} bytes)",
                self.records_read
            )));
        }

        let length_bytes = &header[..8];
        let length = u64::from_le_bytes([
            header[0], header[1], header[2], header[3], header[4], header[5], header[6], header[7],
        ]);
        let length_crc = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
        if masked_crc32c(length_bytes) != length_crc {
            return Err(self.fail(format!(
                "length checksum mismatch at record {}",
                self.records_read
            )));
        }

        // The buffer grows with the bytes actually read, never with the
        // length claimed by the header
        let mut data = Vec::new();
        let read = (&mut self.reader).take(length).read_to_end(&mut data);
        if let Err(e) = read {
            return Err(self.read_error(e));
        }
        if (data.len() as u64) < length {
            return Err(self.fail(format!(
                "truncated record payload at record {} ({} of {length} bytes)",
                self.records_read,
                data.len()
            )));
        }

        let mut footer = [0u8; FOOTER_SIZE];
        let filled = self.read_fully(&mut footer)?;
        if filled < FOOTER_SIZE {
            return Err(self.fail(format!(
                "truncated record checksum at record {}",
                self.records_read
            )));
        }
        let data_crc = u32::from_le_bytes(footer);
        if masked_crc32c(&data) != data_crc {
            return Err(self.fail(format!(
                "payload checksum mismatch at record {}",
                self.records_read
            )));
        }

        self.records_read += 1;
        Ok(Some(data))
    }

    /// Fills `buf` until it is full or the stream ends, returning the number
    /// of bytes read.
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.read_error(e)),
            }
        }
        Ok(filled)
    }

    fn read_error(&mut self, e: std::io::Error) -> DataError {
        self.done = true;
        DataError::storage_with_source(&self.path, "failed to read record", e)
    }

    fn fail(&mut self, message: String) -> DataError {
        self.done = true;
        DataError::record(&self.path, message)
    }
}

impl<R: Read> Iterator for TfRecordReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Writes framed records to a byte sink.
pub struct TfRecordWriter<W> {
    writer: W,
    path: PathBuf,
    records_written: u64,
}

impl<W: Write> TfRecordWriter<W> {
    /// Creates a writer. `path` is only used in error messages.
    pub fn new(writer: W, path: impl Into<PathBuf>) -> Self {
        Self {
            writer,
            path: path.into(),
            records_written: 0,
        }
    }

    /// Appends one record.
    pub fn write_record(&mut self, data: &[u8]) -> Result<()> {
        let length_bytes = (data.len() as u64).to_le_bytes();
        let length_crc = masked_crc32c(&length_bytes).to_le_bytes();
        let data_crc = masked_crc32c(data).to_le_bytes();

        self.writer
            .write_all(&length_bytes)
            .and_then(|_| self.writer.write_all(&length_crc))
            .and_then(|_| self.writer.write_all(data))
            .and_then(|_| self.writer.write_all(&data_crc))
            .map_err(|e| DataError::storage_with_source(&self.path, "failed to write record", e))?;

        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer
            .flush()
            .map_err(|e| DataError::storage_with_source(&self.path, "failed to flush records", e))?;
        Ok(self.writer)
    }
}
