//! ISO 8583 message codec.
//!
//! Message layout on the wire:
//!
//! ```text
//! MTI: 4 text-encoded characters
//! bitmap: 16 binary bytes, or 32 hex characters in hex-bitmap mode
//! fields: concatenated in ascending bit order
//! ```
//!
//! Decoding produces a [`Record`]: a map holding `MTI`, `DE<n>` data
//! elements, and the expanded sub-fields contributed by field processors
//! (`PDSxxxx`, `TAGxx`/`ICC_DATA`, `DE43_*`). Encoding inverts the mapping,
//! reassembling PDS keys into data-element fragments.

pub mod field;
pub mod processors;
pub mod value;

pub use processors::TlvErrorPolicy;
pub use value::FieldValue;

use crate::bitmap::{Bitmap, BITMAP_LEN};
use crate::config::{BitConfig, FieldProcessor};
use crate::encoding::Encoding;
use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use field::{decode_field, encode_field};
use processors::build_pds_fragments;
use regex::Regex;
use std::collections::BTreeMap;

/// A decoded message: field values keyed by `MTI`, `DE<n>`, `PDSxxxx`,
/// `TAGxx`, `ICC_DATA` and `DE43_*`.
pub type Record = BTreeMap<String, FieldValue>;

/// Bidirectional codec between [`Record`]s and ISO 8583 wire messages.
#[derive(Debug)]
pub struct MessageCodec {
    config: BitConfig,
    encoding: Encoding,
    hex_bitmap: bool,
    de43_regex: BTreeMap<u8, Regex>,
}

impl MessageCodec {
    /// Create a codec for the given bit configuration and text encoding.
    ///
    /// DE43 splitter regexes are compiled here; an invalid pattern is a
    /// configuration error.
    pub fn new(config: BitConfig, encoding: Encoding) -> Result<Self> {
        let mut de43_regex = BTreeMap::new();
        for (&bit, field) in &config {
            if field.processor == Some(FieldProcessor::De43) {
                let pattern = field
                    .processor_config
                    .as_deref()
                    .unwrap_or(crate::config::DEFAULT_DE43_REGEX);
                let regex = Regex::new(pattern).map_err(|e| {
                    Error::config(format!("invalid DE43 regex for bit {bit}: {e}"))
                })?;
                de43_regex.insert(bit, regex);
            }
        }
        Ok(Self {
            config,
            encoding,
            hex_bitmap: false,
            de43_regex,
        })
    }

    /// Switch the bitmap between 16 binary bytes and 32 hex characters.
    pub fn with_hex_bitmap(mut self, hex_bitmap: bool) -> Self {
        self.hex_bitmap = hex_bitmap;
        self
    }

    /// The text encoding this codec reads and writes.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Encode a record into an ISO 8583 message.
    ///
    /// Bitmap bit 1 is always set. `PDSxxxx` keys are reassembled into
    /// fragments and assigned to the PDS-capable data elements in ascending
    /// bit order.
    pub fn encode(&self, record: &Record) -> Result<Bytes> {
        let mut record = record.clone();

        let fragments = build_pds_fragments(&record)?;
        if !fragments.is_empty() {
            let slots: Vec<u8> = self
                .config
                .iter()
                .filter(|(_, f)| f.processor == Some(FieldProcessor::Pds))
                .map(|(&bit, _)| bit)
                .collect();
            if fragments.len() > slots.len() {
                return Err(Error::structure(format!(
                    "{} PDS fragments exceed the {} PDS-capable data elements",
                    fragments.len(),
                    slots.len()
                )));
            }
            for (slot, fragment) in slots.into_iter().zip(fragments) {
                record.insert(format!("DE{slot}"), FieldValue::Text(fragment));
            }
        }

        let mut bitmap = Bitmap::new();
        bitmap.set(1, true);
        let mut payload = BytesMut::new();
        for bit in 2u8..=127 {
            let Some(value) = record.get(&format!("DE{bit}")) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            let field = self.config.get(&bit).ok_or_else(|| {
                Error::structure(format!("no bit configuration for DE{bit}"))
            })?;
            log::debug!("encoding bit {bit}");
            bitmap.set(bit as usize, true);
            payload.put_slice(&encode_field(bit, field, value, self.encoding)?);
        }

        let mut output = BytesMut::new();
        if let Some(mti) = record.get("MTI") {
            output.put_slice(&self.encoding.encode(&mti.to_string())?);
        }
        let bitmap_bytes = bitmap.to_bytes();
        if self.hex_bitmap {
            output.put_slice(&self.encoding.encode(&hex::encode(bitmap_bytes))?);
        } else {
            output.put_slice(&bitmap_bytes);
        }
        output.put_slice(&payload);
        Ok(output.freeze())
    }

    /// Decode an ISO 8583 message into a record.
    pub fn decode(&self, data: &[u8]) -> Result<Record> {
        let bitmap_size = if self.hex_bitmap {
            2 * BITMAP_LEN
        } else {
            BITMAP_LEN
        };
        if data.len() < 4 + bitmap_size {
            return Err(Error::structure_with(
                format!(
                    "message of {} bytes is too short for an MTI and bitmap",
                    data.len()
                ),
                data.to_vec(),
            ));
        }

        let mti = self.encoding.decode(&data[..4])?;
        let mut bitmap_bytes = [0u8; BITMAP_LEN];
        if self.hex_bitmap {
            let text = self.encoding.decode(&data[4..4 + bitmap_size])?;
            let decoded = hex::decode(&text).map_err(|_| {
                Error::structure_with(format!("bitmap {text:?} is not valid hex"), data.to_vec())
            })?;
            bitmap_bytes.copy_from_slice(&decoded);
        } else {
            bitmap_bytes.copy_from_slice(&data[4..4 + BITMAP_LEN]);
        }
        let bitmap = Bitmap::from_bytes(&bitmap_bytes);
        let body = &data[4 + bitmap_size..];

        let mut record = Record::new();
        record.insert("MTI".to_string(), FieldValue::Text(mti));

        let mut pos = 0;
        for bit in 2..=127usize {
            if !bitmap.get(bit) {
                continue;
            }
            log::debug!("processing bit {bit}");
            let field = self.config.get(&(bit as u8)).ok_or_else(|| {
                Error::structure_with(
                    format!("no bit configuration for set bit {bit}"),
                    data.to_vec(),
                )
            })?;
            pos += decode_field(
                bit as u8,
                field,
                &body[pos..],
                self.encoding,
                self.de43_regex.get(&(bit as u8)),
                &mut record,
            )?;
        }

        if pos != body.len() {
            return Err(Error::structure_with(
                format!(
                    "message data not correct length: bitmap indicates {pos} bytes, message has {}",
                    body.len()
                ),
                body.to_vec(),
            ));
        }
        Ok(record)
    }
}
