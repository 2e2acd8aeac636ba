//! Error types for the IPM codec.
//!
//! Every data error carries a human-readable message; framing and record
//! errors additionally carry the 1-based record number and a binary context
//! buffer holding the raw bytes around the failure, suitable for rendering
//! with [`hexdump`].

use std::io;
use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for IPM codec operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error on the underlying byte stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Record framing error: bad record length, short read, or an invalid
    /// 1014-byte block.
    #[error("framing error: {message}")]
    Framing {
        message: String,
        record_number: Option<usize>,
        context: Option<Vec<u8>>,
    },

    /// Bytes that do not decode, or characters that do not encode, under the
    /// configured text encoding.
    #[error("encoding error: {message}")]
    Encoding { message: String },

    /// Message structure error: bitmap and payload disagree, or a set bit has
    /// no configuration.
    #[error("structural error: {message}")]
    Structure {
        message: String,
        context: Option<Vec<u8>>,
    },

    /// A field value cannot be interpreted as its configured native type.
    #[error("type conversion error: {message}")]
    TypeConversion { message: String },

    /// Incomplete ICC tag or length while parsing TLV data.
    #[error("TLV error: {message}")]
    Tlv { message: String },

    /// Parameter extract error: missing trailer or unknown table.
    #[error("parameter error: {message}")]
    Parameter { message: String },

    /// Invalid codec configuration, such as an unparseable DE43 regex.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A lower-level error wrapped with the record it occurred in.
    #[error("error processing record {record_number}: {source}")]
    Record {
        record_number: usize,
        context: Option<Vec<u8>>,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a framing error with no positional context.
    pub fn framing(message: impl Into<String>) -> Self {
        Self::Framing {
            message: message.into(),
            record_number: None,
            context: None,
        }
    }

    /// Create a framing error carrying the record number and raw bytes.
    pub fn framing_at(
        message: impl Into<String>,
        record_number: usize,
        context: Vec<u8>,
    ) -> Self {
        Self::Framing {
            message: message.into(),
            record_number: Some(record_number),
            context: Some(context),
        }
    }

    /// Create an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create a structural error.
    pub fn structure(message: impl Into<String>) -> Self {
        Self::Structure {
            message: message.into(),
            context: None,
        }
    }

    /// Create a structural error carrying the offending bytes.
    pub fn structure_with(message: impl Into<String>, context: Vec<u8>) -> Self {
        Self::Structure {
            message: message.into(),
            context: Some(context),
        }
    }

    /// Create a type conversion error.
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion {
            message: message.into(),
        }
    }

    /// Create a TLV error.
    pub fn tlv(message: impl Into<String>) -> Self {
        Self::Tlv {
            message: message.into(),
        }
    }

    /// Create a parameter extract error.
    pub fn parameter(message: impl Into<String>) -> Self {
        Self::Parameter {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Wrap this error with the record number and raw record it occurred in.
    pub fn in_record(self, record_number: usize, context: Option<Vec<u8>>) -> Self {
        Self::Record {
            record_number,
            context,
            source: Box::new(self),
        }
    }

    /// The 1-based record number the error occurred in, if known.
    pub fn record_number(&self) -> Option<usize> {
        match self {
            Self::Framing { record_number, .. } => *record_number,
            Self::Record { record_number, .. } => Some(*record_number),
            _ => None,
        }
    }

    /// The raw bytes around the failure, if retained.
    pub fn binary_context(&self) -> Option<&[u8]> {
        match self {
            Self::Framing { context, .. }
            | Self::Structure { context, .. }
            | Self::Record { context, .. } => context.as_deref(),
            _ => None,
        }
    }
}

/// Render a byte buffer as a classic hex dump.
///
/// One line per 16 bytes: offset, hex columns, printable-ASCII column.
/// Intended for displaying [`Error::binary_context`] buffers.
pub fn hexdump(data: &[u8]) -> String {
    let mut out = String::new();
    for (i, chunk) in data.chunks(16).enumerate() {
        let mut hex_col = String::with_capacity(49);
        for (j, byte) in chunk.iter().enumerate() {
            if j == 8 {
                hex_col.push(' ');
            }
            hex_col.push_str(&format!("{:02X} ", byte));
        }
        let text_col: String = chunk
            .iter()
            .map(|&b| {
                if (0x20..0x7f).contains(&b) {
                    b as char
                } else {
                    '.'
                }
            })
            .collect();
        out.push_str(&format!("{:08X}  {:<49} {}\n", i * 16, hex_col, text_col));
    }
    out
}
