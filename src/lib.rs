//! Mastercard IPM clearing-file codec.
//!
//! A bidirectional codec stack for the files exchanged with the Mastercard
//! clearing system, built from three composable layers:
//!
//! 1. an ISO 8583 message codec driven by a bit-configuration table, with
//!    the scheme-specific sub-field processors (PDS subelements, EMV ICC
//!    tags, DE43 merchant location, PAN masking),
//! 2. VBS record framing (4-byte big-endian length prefixes with a
//!    zero-length sentinel), and
//! 3. optional 1014-byte fixed blocking for files in mainframe transport
//!    form.
//!
//! Files are processed as streams: readers are iterators over records,
//! writers consume them one at a time, and neither materialises the whole
//! file. EBCDIC (cp500), Latin-1 and ASCII text encodings are supported.
//!
//! # Example
//!
//! ```no_run
//! use ipm_codec::{Encoding, IpmReader, Result};
//! use std::fs::File;
//!
//! fn main() -> Result<()> {
//!     let file = File::open("MCI.AR.T112.M.E0073222.D231231")?;
//!     let reader = IpmReader::new_blocked(file, Encoding::Cp500)?;
//!     for record in reader {
//!         let record = record?;
//!         println!("{:?} {:?}", record.get("MTI"), record.get("DE2"));
//!     }
//!     Ok(())
//! }
//! ```

pub mod bitmap;
pub mod blocking;
pub mod config;
pub mod encoding;
pub mod error;
pub mod ipm;
pub mod iso8583;
pub mod params;
pub mod vbs;

// Re-export main types
pub use bitmap::Bitmap;
pub use blocking::{block_1014, unblock_1014, BlockedWriter, UnblockReader};
pub use config::{
    default_bit_config, default_parameter_tables, BitConfig, FieldConfig, FieldProcessor,
    FieldSpan, FieldType, ParamTables, ValueType, OUTPUT_DATA_ELEMENTS,
};
pub use encoding::Encoding;
pub use error::{hexdump, Error, Result};
pub use ipm::{change_encoding, change_param_encoding, IpmReader, IpmWriter};
pub use iso8583::{FieldValue, MessageCodec, Record, TlvErrorPolicy};
pub use params::ParamReader;
pub use vbs::{VbsReader, VbsWriter};
