//! IPM file reading and writing.
//!
//! An IPM clearing file is a VBS stream of ISO 8583 messages, usually
//! 1014-blocked when it has been through mainframe transport. [`IpmReader`]
//! and [`IpmWriter`] bind the framing layer to a [`MessageCodec`]; any codec
//! failure is wrapped with the record number and the raw record so the
//! caller can hex-dump the offending bytes.

use crate::config::{default_bit_config, BitConfig};
use crate::encoding::Encoding;
use crate::error::Result;
use crate::iso8583::{MessageCodec, Record};
use crate::vbs::{VbsReader, VbsWriter};
use std::io::{Read, Write};

/// Iterator over the decoded records of an IPM file.
pub struct IpmReader<R: Read> {
    vbs: VbsReader<R>,
    codec: MessageCodec,
}

impl<R: Read> IpmReader<R> {
    /// Read a plain VBS file with the default Mastercard bit configuration.
    pub fn new(inner: R, encoding: Encoding) -> Result<Self> {
        Ok(Self {
            vbs: VbsReader::new(inner),
            codec: MessageCodec::new(default_bit_config(), encoding)?,
        })
    }

    /// Read a 1014-blocked file with the default Mastercard bit
    /// configuration.
    pub fn new_blocked(inner: R, encoding: Encoding) -> Result<Self> {
        Ok(Self {
            vbs: VbsReader::new_blocked(inner),
            codec: MessageCodec::new(default_bit_config(), encoding)?,
        })
    }

    /// Read with a custom bit configuration.
    pub fn with_config(inner: R, encoding: Encoding, config: BitConfig, blocked: bool) -> Result<Self> {
        let vbs = if blocked {
            VbsReader::new_blocked(inner)
        } else {
            VbsReader::new(inner)
        };
        Ok(Self {
            vbs,
            codec: MessageCodec::new(config, encoding)?,
        })
    }

    /// Number of complete records read so far.
    pub fn record_number(&self) -> usize {
        self.vbs.record_number()
    }
}

impl<R: Read> Iterator for IpmReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = match self.vbs.next()? {
            Ok(raw) => raw,
            Err(e) => return Some(Err(e)),
        };
        Some(self.codec.decode(&raw).map_err(|e| {
            e.in_record(
                self.vbs.record_number(),
                Some(self.vbs.last_record().to_vec()),
            )
        }))
    }
}

/// Writer producing an IPM file from decoded records.
pub struct IpmWriter<W: Write> {
    vbs: VbsWriter<W>,
    codec: MessageCodec,
}

impl<W: Write> IpmWriter<W> {
    /// Write a plain VBS file with the default Mastercard bit configuration.
    pub fn new(inner: W, encoding: Encoding) -> Result<Self> {
        Ok(Self {
            vbs: VbsWriter::new(inner),
            codec: MessageCodec::new(default_bit_config(), encoding)?,
        })
    }

    /// Write a 1014-blocked file with the default Mastercard bit
    /// configuration.
    pub fn new_blocked(inner: W, encoding: Encoding) -> Result<Self> {
        Ok(Self {
            vbs: VbsWriter::new_blocked(inner),
            codec: MessageCodec::new(default_bit_config(), encoding)?,
        })
    }

    /// Write with a custom bit configuration.
    pub fn with_config(inner: W, encoding: Encoding, config: BitConfig, blocked: bool) -> Result<Self> {
        let vbs = if blocked {
            VbsWriter::new_blocked(inner)
        } else {
            VbsWriter::new(inner)
        };
        Ok(Self {
            vbs,
            codec: MessageCodec::new(config, encoding)?,
        })
    }

    /// Encode and append one record.
    pub fn write(&mut self, record: &Record) -> Result<()> {
        let message = self.codec.encode(record)?;
        self.vbs.write(&message)
    }

    /// Write the end-of-stream sentinel and flush every layer.
    pub fn close(&mut self) -> Result<()> {
        self.vbs.close()
    }
}

/// Re-encode a 1014-blocked IPM file from one text encoding to another.
///
/// Records are decoded under `in_encoding` and written back out under
/// `out_encoding`, blocked, with the default bit configuration.
pub fn change_encoding<R: Read, W: Write>(
    input: R,
    output: W,
    in_encoding: Encoding,
    out_encoding: Encoding,
) -> Result<()> {
    let reader = IpmReader::new_blocked(input, in_encoding)?;
    let mut writer = IpmWriter::new_blocked(output, out_encoding)?;
    for record in reader {
        writer.write(&record?)?;
    }
    writer.close()
}

/// Re-encode a 1014-blocked parameter file from one text encoding to
/// another.
///
/// Parameter records are plain text, so each is decoded and re-encoded
/// without message-level interpretation.
pub fn change_param_encoding<R: Read, W: Write>(
    input: R,
    output: W,
    in_encoding: Encoding,
    out_encoding: Encoding,
) -> Result<()> {
    let reader = VbsReader::new_blocked(input);
    let mut writer = VbsWriter::new_blocked(output);
    for record in reader {
        let text = in_encoding.decode(&record?)?;
        writer.write(&out_encoding.encode(&text)?)?;
    }
    writer.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iso8583::FieldValue;
    use std::io::Cursor;

    fn sample_record() -> Record {
        let mut record = Record::new();
        record.insert("MTI".to_string(), FieldValue::Text("1111".to_string()));
        record.insert(
            "DE2".to_string(),
            FieldValue::Text("8888999988889999".to_string()),
        );
        record
    }

    #[test]
    fn test_vbs_file_round_trip() {
        let records = vec![sample_record(); 5];
        let mut out = Vec::new();
        let mut writer = IpmWriter::new(&mut out, Encoding::Ascii).unwrap();
        for record in &records {
            writer.write(record).unwrap();
        }
        writer.close().unwrap();
        drop(writer);

        let reader = IpmReader::new(Cursor::new(out), Encoding::Ascii).unwrap();
        let result: Result<Vec<Record>> = reader.collect();
        assert_eq!(result.unwrap(), records);
    }

    #[test]
    fn test_blocked_file_round_trip() {
        let records = vec![sample_record(); 5];
        let mut out = Vec::new();
        let mut writer = IpmWriter::new_blocked(&mut out, Encoding::Cp500).unwrap();
        for record in &records {
            writer.write(record).unwrap();
        }
        writer.close().unwrap();
        drop(writer);
        assert_eq!(out.len() % crate::blocking::BLOCK_SIZE, 0);

        let reader = IpmReader::new_blocked(Cursor::new(out), Encoding::Cp500).unwrap();
        let result: Result<Vec<Record>> = reader.collect();
        assert_eq!(result.unwrap(), records);
    }

    #[test]
    fn test_codec_error_carries_record_context() {
        // a record that is valid VBS framing but not a valid message
        let mut out = Vec::new();
        let mut writer = VbsWriter::new(&mut out);
        writer.write(b"too short").unwrap();
        writer.close().unwrap();
        drop(writer);

        let mut reader = IpmReader::new(Cursor::new(out), Encoding::Ascii).unwrap();
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.record_number(), Some(1));
        let context = err.binary_context().unwrap();
        assert_eq!(&context[4..], b"too short");
    }
}
