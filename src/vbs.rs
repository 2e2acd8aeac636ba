//! VBS (variable blocked stream) record framing.
//!
//! Each record is preceded by a 4-byte big-endian length; a zero length is
//! the end-of-stream sentinel:
//!
//! ```text
//! len: u32 big-endian
//! payload: len bytes
//! ...
//! 0u32 sentinel
//! ```
//!
//! Readers and writers optionally compose with the 1014-byte blocking layer
//! for files in mainframe transport form.

use crate::blocking::{read_full, BlockedWriter, UnblockReader};
use crate::error::{Error, Result};
use std::io::{Read, Write};

/// Largest record length accepted by the reader. Anything bigger (or
/// negative) means the stream is out of sync.
const MAX_RECORD_LEN: i32 = 3000;

#[derive(Debug)]
enum Source<R: Read> {
    Plain(R),
    Unblocked(UnblockReader<R>),
}

impl<R: Read> Read for Source<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(inner) => inner.read(buf),
            Self::Unblocked(inner) => inner.read(buf),
        }
    }
}

/// Iterator over the records of a VBS stream.
///
/// Tracks the record number and retains the last complete raw record
/// (header plus payload) so framing and codec errors can carry binary
/// context for a hex-dump diagnostic.
#[derive(Debug)]
pub struct VbsReader<R: Read> {
    source: Source<R>,
    record_number: usize,
    last_record: Vec<u8>,
    done: bool,
}

impl<R: Read> VbsReader<R> {
    /// Read records from a plain VBS stream.
    pub fn new(inner: R) -> Self {
        Self::from_source(Source::Plain(inner))
    }

    /// Read records from a 1014-blocked VBS stream.
    pub fn new_blocked(inner: R) -> Self {
        Self::from_source(Source::Unblocked(UnblockReader::new(inner)))
    }

    fn from_source(source: Source<R>) -> Self {
        Self {
            source,
            record_number: 0,
            last_record: Vec::new(),
            done: false,
        }
    }

    /// Number of complete records read so far.
    pub fn record_number(&self) -> usize {
        self.record_number
    }

    /// The last complete raw record, header included.
    pub fn last_record(&self) -> &[u8] {
        &self.last_record
    }

    fn next_record(&mut self) -> Result<Option<Vec<u8>>> {
        let mut header = [0u8; 4];
        let got = read_full(&mut self.source, &mut header)?;
        if got < 4 {
            // end of stream; a missing zero-length sentinel is tolerated
            return Ok(None);
        }

        let length = i32::from_be_bytes(header);
        log::debug!("record_length={length}");
        if length == 0 {
            return Ok(None);
        }
        if !(1..=MAX_RECORD_LEN).contains(&length) {
            let mut context = self.last_record.clone();
            context.extend_from_slice(&header);
            return Err(Error::framing_at(
                format!("invalid record length {length}"),
                self.record_number + 1,
                context,
            ));
        }

        let mut payload = vec![0u8; length as usize];
        let got = read_full(&mut self.source, &mut payload)?;
        if got < payload.len() {
            let mut context = header.to_vec();
            context.extend_from_slice(&payload[..got]);
            return Err(Error::framing_at(
                format!("record data ended early: wanted {length} bytes, read {got}"),
                self.record_number + 1,
                context,
            ));
        }

        self.record_number += 1;
        self.last_record.clear();
        self.last_record.extend_from_slice(&header);
        self.last_record.extend_from_slice(&payload);
        Ok(Some(payload))
    }
}

impl<R: Read> Iterator for VbsReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

enum Sink<W: Write> {
    Plain(W),
    Blocked(BlockedWriter<W>),
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(inner) => inner.write(buf),
            Self::Blocked(inner) => inner.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(inner) => inner.flush(),
            Self::Blocked(inner) => inner.flush(),
        }
    }
}

/// Writer producing a VBS stream, optionally 1014-blocked.
///
/// [`close`](Self::close) writes the zero-length sentinel and finalises the
/// blocking layer; dropping an unclosed writer closes it on a best-effort
/// basis, so error-checking callers should close explicitly.
pub struct VbsWriter<W: Write> {
    sink: Sink<W>,
    closed: bool,
}

impl<W: Write> VbsWriter<W> {
    /// Write a plain VBS stream.
    pub fn new(inner: W) -> Self {
        Self {
            sink: Sink::Plain(inner),
            closed: false,
        }
    }

    /// Write a 1014-blocked VBS stream.
    pub fn new_blocked(inner: W) -> Self {
        Self {
            sink: Sink::Blocked(BlockedWriter::new(inner)),
            closed: false,
        }
    }

    /// Append one record.
    pub fn write(&mut self, record: &[u8]) -> Result<()> {
        if record.len() > i32::MAX as usize {
            return Err(Error::framing(format!(
                "record of {} bytes cannot be framed",
                record.len()
            )));
        }
        self.sink.write_all(&(record.len() as u32).to_be_bytes())?;
        self.sink.write_all(record)?;
        Ok(())
    }

    /// Write the end-of-stream sentinel and flush every layer.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.sink.write_all(&0u32.to_be_bytes())?;
        match &mut self.sink {
            Sink::Plain(inner) => inner.flush()?,
            Sink::Blocked(inner) => inner.finish()?,
        }
        self.closed = true;
        Ok(())
    }
}

impl<W: Write> Drop for VbsWriter<W> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(reader: VbsReader<Cursor<Vec<u8>>>) -> Result<Vec<Vec<u8>>> {
        reader.collect()
    }

    #[test]
    fn test_write_read_round_trip() {
        let records = vec![b"12345678901234567890".to_vec(); 5];
        let mut out = Vec::new();
        let mut writer = VbsWriter::new(&mut out);
        for record in &records {
            writer.write(record).unwrap();
        }
        writer.close().unwrap();
        drop(writer);
        assert_eq!(out.len(), 5 * 24 + 4);

        let result = collect(VbsReader::new(Cursor::new(out))).unwrap();
        assert_eq!(result, records);
    }

    #[test]
    fn test_reader_tolerates_missing_sentinel() {
        let mut data = Vec::new();
        data.extend_from_slice(&5u32.to_be_bytes());
        data.extend_from_slice(b"hello");
        data.extend_from_slice(&5u32.to_be_bytes());
        data.extend_from_slice(b"world");
        let result = collect(VbsReader::new(Cursor::new(data))).unwrap();
        assert_eq!(result, vec![b"hello".to_vec(), b"world".to_vec()]);
    }

    #[test]
    fn test_negative_length_is_a_framing_error() {
        let data = vec![0xff, 0xff, 0x00, 0x00];
        let err = collect(VbsReader::new(Cursor::new(data))).unwrap_err();
        assert_eq!(err.record_number(), Some(1));
        assert_eq!(err.binary_context(), Some(&[0xff, 0xff, 0x00, 0x00][..]));
    }

    #[test]
    fn test_oversized_length_is_a_framing_error() {
        let mut data = Vec::new();
        data.extend_from_slice(&3001u32.to_be_bytes());
        data.extend_from_slice(&vec![0u8; 3001]);
        assert!(collect(VbsReader::new(Cursor::new(data))).is_err());
    }

    #[test]
    fn test_short_payload_is_a_framing_error() {
        let mut data = Vec::new();
        data.extend_from_slice(&10u32.to_be_bytes());
        data.extend_from_slice(b"abc");
        let err = collect(VbsReader::new(Cursor::new(data))).unwrap_err();
        assert_eq!(err.record_number(), Some(1));
        let context = err.binary_context().unwrap();
        assert_eq!(&context[4..], b"abc");
    }

    #[test]
    fn test_error_context_carries_previous_record() {
        let mut data = Vec::new();
        data.extend_from_slice(&2u32.to_be_bytes());
        data.extend_from_slice(b"ok");
        data.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);
        let mut reader = VbsReader::new(Cursor::new(data));
        assert_eq!(reader.next().unwrap().unwrap(), b"ok".to_vec());
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.record_number(), Some(2));
        let context = err.binary_context().unwrap();
        assert_eq!(&context[..6], &[0x00, 0x00, 0x00, 0x02, b'o', b'k']);
        assert_eq!(&context[6..], &[0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_blocked_round_trip() {
        let records = vec![vec![0x31u8; 2000], vec![0x32u8; 28], vec![0x33u8; 34]];
        let mut out = Vec::new();
        let mut writer = VbsWriter::new_blocked(&mut out);
        for record in &records {
            writer.write(record).unwrap();
        }
        writer.close().unwrap();
        drop(writer);
        assert_eq!(out.len() % crate::blocking::BLOCK_SIZE, 0);

        let result = collect(VbsReader::new_blocked(Cursor::new(out))).unwrap();
        assert_eq!(result, records);
    }

    #[test]
    fn test_blocked_two_small_records_fit_one_block() {
        let mut out = Vec::new();
        let mut writer = VbsWriter::new_blocked(&mut out);
        writer.write(&vec![0x31u8; 28]).unwrap();
        writer.write(&vec![0x32u8; 34]).unwrap();
        writer.close().unwrap();
        drop(writer);

        assert_eq!(out.len(), crate::blocking::BLOCK_SIZE);
        assert_eq!(&out[..4], &28u32.to_be_bytes());
        assert_eq!(&out[32..36], &34u32.to_be_bytes());
        assert_eq!(&out[70..74], &0u32.to_be_bytes());
        assert!(out[74..].iter().all(|&b| b == 0x40));
    }
}
