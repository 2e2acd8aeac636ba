//! Text encodings used by IPM clearing files.
//!
//! Files arrive either in EBCDIC (code page 500, the mainframe interchange
//! set) or in Latin-1/ASCII. All three are single-byte encodings, so one
//! character always occupies one byte on the wire. Binary-typed fields
//! bypass text encoding entirely.

use crate::error::{Error, Result};
use std::sync::OnceLock;

/// Code page 500 to Latin-1, indexed by the EBCDIC byte.
///
/// cp500 is a permutation of the Latin-1 repertoire, so both directions are
/// total byte-to-byte maps.
#[rustfmt::skip]
const CP500_TO_LATIN1: [u8; 256] = [
    0x00, 0x01, 0x02, 0x03, 0x9c, 0x09, 0x86, 0x7f, 0x97, 0x8d, 0x8e, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
    0x10, 0x11, 0x12, 0x13, 0x9d, 0x85, 0x08, 0x87, 0x18, 0x19, 0x92, 0x8f, 0x1c, 0x1d, 0x1e, 0x1f,
    0x80, 0x81, 0x82, 0x83, 0x84, 0x0a, 0x17, 0x1b, 0x88, 0x89, 0x8a, 0x8b, 0x8c, 0x05, 0x06, 0x07,
    0x90, 0x91, 0x16, 0x93, 0x94, 0x95, 0x96, 0x04, 0x98, 0x99, 0x9a, 0x9b, 0x14, 0x15, 0x9e, 0x1a,
    0x20, 0xa0, 0xe2, 0xe4, 0xe0, 0xe1, 0xe3, 0xe5, 0xe7, 0xf1, 0x5b, 0x2e, 0x3c, 0x28, 0x2b, 0x21,
    0x26, 0xe9, 0xea, 0xeb, 0xe8, 0xed, 0xee, 0xef, 0xec, 0xdf, 0x5d, 0x24, 0x2a, 0x29, 0x3b, 0x5e,
    0x2d, 0x2f, 0xc2, 0xc4, 0xc0, 0xc1, 0xc3, 0xc5, 0xc7, 0xd1, 0xa6, 0x2c, 0x25, 0x5f, 0x3e, 0x3f,
    0xf8, 0xc9, 0xca, 0xcb, 0xc8, 0xcd, 0xce, 0xcf, 0xcc, 0x60, 0x3a, 0x23, 0x40, 0x27, 0x3d, 0x22,
    0xd8, 0x61, 0x62, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0xab, 0xbb, 0xf0, 0xfd, 0xfe, 0xb1,
    0xb0, 0x6a, 0x6b, 0x6c, 0x6d, 0x6e, 0x6f, 0x70, 0x71, 0x72, 0xaa, 0xba, 0xe6, 0xb8, 0xc6, 0xa4,
    0xb5, 0x7e, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0xa1, 0xbf, 0xd0, 0xdd, 0xde, 0xae,
    0xa2, 0xa3, 0xa5, 0xb7, 0xa9, 0xa7, 0xb6, 0xbc, 0xbd, 0xbe, 0xac, 0x7c, 0xaf, 0xa8, 0xb4, 0xd7,
    0x7b, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0xad, 0xf4, 0xf6, 0xf2, 0xf3, 0xf5,
    0x7d, 0x4a, 0x4b, 0x4c, 0x4d, 0x4e, 0x4f, 0x50, 0x51, 0x52, 0xb9, 0xfb, 0xfc, 0xf9, 0xfa, 0xff,
    0x5c, 0xf7, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0xb2, 0xd4, 0xd6, 0xd2, 0xd3, 0xd5,
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0xb3, 0xdb, 0xdc, 0xd9, 0xda, 0x9f,
];

fn cp500_from_latin1() -> &'static [u8; 256] {
    static TABLE: OnceLock<[u8; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u8; 256];
        for (ebcdic, &latin1) in CP500_TO_LATIN1.iter().enumerate() {
            table[latin1 as usize] = ebcdic as u8;
        }
        table
    })
}

/// A supported text encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// EBCDIC code page 500.
    Cp500,
    /// ISO 8859-1.
    #[default]
    Latin1,
    /// 7-bit ASCII.
    Ascii,
}

impl Encoding {
    /// Look up an encoding by its conventional name.
    ///
    /// Accepts `cp500`, `latin-1`/`latin1`, and `ascii`, case-insensitively.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "cp500" | "ebcdic" => Ok(Self::Cp500),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            "ascii" => Ok(Self::Ascii),
            other => Err(Error::encoding(format!("unknown encoding: {other}"))),
        }
    }

    /// The conventional name of this encoding.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cp500 => "cp500",
            Self::Latin1 => "latin-1",
            Self::Ascii => "ascii",
        }
    }

    /// Decode bytes into a string.
    pub fn decode(&self, data: &[u8]) -> Result<String> {
        match self {
            Self::Cp500 => Ok(data
                .iter()
                .map(|&b| CP500_TO_LATIN1[b as usize] as char)
                .collect()),
            Self::Latin1 => Ok(data.iter().map(|&b| b as char).collect()),
            Self::Ascii => data
                .iter()
                .map(|&b| {
                    if b < 0x80 {
                        Ok(b as char)
                    } else {
                        Err(Error::encoding(format!(
                            "byte 0x{b:02x} is not valid ascii"
                        )))
                    }
                })
                .collect(),
        }
    }

    /// Encode a string into bytes.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        text.chars()
            .map(|c| {
                let code = c as u32;
                match self {
                    Self::Cp500 if code <= 0xff => Ok(cp500_from_latin1()[code as usize]),
                    Self::Latin1 if code <= 0xff => Ok(code as u8),
                    Self::Ascii if code <= 0x7f => Ok(code as u8),
                    _ => Err(Error::encoding(format!(
                        "character {c:?} is not representable in {}",
                        self.name()
                    ))),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cp500_known_bytes() {
        // space is 0x40 and digits sit at 0xF0..=0xF9 in EBCDIC
        assert_eq!(Encoding::Cp500.encode(" 0129").unwrap(), vec![0x40, 0xf0, 0xf1, 0xf2, 0xf9]);
        assert_eq!(Encoding::Cp500.decode(&[0xc1, 0x81, 0x5c]).unwrap(), "Aa*");
    }

    #[test]
    fn test_cp500_round_trip_all_bytes() {
        let all: Vec<u8> = (0..=255u8).collect();
        let text = Encoding::Cp500.decode(&all).unwrap();
        assert_eq!(Encoding::Cp500.encode(&text).unwrap(), all);
    }

    #[test]
    fn test_latin1_round_trip() {
        let data = b"BIG BOBS\\70 FERNDALE ST\xfc".to_vec();
        let text = Encoding::Latin1.decode(&data).unwrap();
        assert_eq!(Encoding::Latin1.encode(&text).unwrap(), data);
    }

    #[test]
    fn test_ascii_rejects_high_bytes() {
        assert!(Encoding::Ascii.decode(&[0x31, 0xf0]).is_err());
        assert!(Encoding::Ascii.encode("café").is_err());
        assert_eq!(Encoding::Ascii.encode("1144").unwrap(), b"1144");
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Encoding::from_name("CP500").unwrap(), Encoding::Cp500);
        assert_eq!(Encoding::from_name("latin-1").unwrap(), Encoding::Latin1);
        assert_eq!(Encoding::from_name("ascii").unwrap(), Encoding::Ascii);
        assert!(Encoding::from_name("utf-32").is_err());
    }
}
