//! Field value types and native-type coercion.

use crate::config::{FieldConfig, ValueType};
use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// A single field value in a decoded record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Text value.
    Text(String),
    /// Integer value.
    Int(i64),
    /// Decimal value as a normalised string (preserves precision).
    Decimal(String),
    /// Date/time value.
    Date(NaiveDateTime),
    /// Raw binary value (ICC data and other non-text fields).
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Try to get the value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Try to convert to i64.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            FieldValue::Text(s) | FieldValue::Decimal(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to get the value as a date.
    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::Date(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Try to get the value as raw bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Whether the value is an empty text or byte string.
    ///
    /// Empty values are treated as absent when building a message.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Bytes(b) => b.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Int(n) => write!(f, "{}", n),
            FieldValue::Decimal(s) => write!(f, "{}", s),
            FieldValue::Date(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            FieldValue::Bytes(b) => write!(f, "{}", hex::encode(b)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Bytes(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::Date(value)
    }
}

/// Coerce a decoded text value to the field's configured native type.
pub(crate) fn decode_typed(text: String, config: &FieldConfig) -> Result<FieldValue> {
    match config.value_type {
        ValueType::Text => Ok(FieldValue::Text(text)),
        ValueType::Int => {
            let n = text.trim().parse::<i64>().map_err(|_| {
                Error::type_conversion(format!("cannot interpret {text:?} as an integer"))
            })?;
            Ok(FieldValue::Int(n))
        }
        ValueType::Decimal => Ok(FieldValue::Decimal(normalize_decimal(&text)?)),
        ValueType::Date => Ok(FieldValue::Date(parse_date(
            text.trim(),
            config.date_format(),
        )?)),
    }
}

/// Render a value as the string to be laid on the wire, applying the
/// configured type's padding rules.
///
/// Integer and decimal values are zero-padded to the fixed field length;
/// dates are rendered with the field's date format. Text values destined for
/// typed fields are coerced first, so records populated from flat string
/// sources still encode correctly.
pub(crate) fn encode_typed(value: &FieldValue, config: &FieldConfig) -> Result<String> {
    match config.value_type {
        ValueType::Text => Ok(value.to_string()),
        ValueType::Int => {
            let n = value.to_i64().ok_or_else(|| {
                Error::type_conversion(format!("cannot interpret {value} as an integer"))
            })?;
            Ok(pad_numeric(&n.to_string(), config.length))
        }
        ValueType::Decimal => {
            let s = match value {
                FieldValue::Decimal(s) => s.clone(),
                FieldValue::Text(s) => normalize_decimal(s)?,
                FieldValue::Int(n) => n.to_string(),
                other => {
                    return Err(Error::type_conversion(format!(
                        "cannot interpret {other} as a decimal"
                    )))
                }
            };
            Ok(pad_numeric(&s, config.length))
        }
        ValueType::Date => {
            let dt = match value {
                FieldValue::Date(dt) => *dt,
                FieldValue::Text(s) => parse_date_flexible(s.trim())?,
                other => {
                    return Err(Error::type_conversion(format!(
                        "cannot interpret {other} as a date"
                    )))
                }
            };
            Ok(dt.format(config.date_format()).to_string())
        }
    }
}

/// Zero-pad a numeric string to `width`, keeping any sign in front.
fn pad_numeric(value: &str, width: usize) -> String {
    let (sign, digits) = match value.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", value),
    };
    let pad = width.saturating_sub(sign.len() + digits.len());
    format!("{sign}{}{digits}", "0".repeat(pad))
}

/// Validate a decimal string and strip redundant leading zeros.
fn normalize_decimal(text: &str) -> Result<String> {
    let trimmed = text.trim();
    let (sign, body) = match trimmed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", trimmed),
    };
    let valid = !body.is_empty()
        && body.chars().filter(|&c| c == '.').count() <= 1
        && body.chars().any(|c| c.is_ascii_digit())
        && body.chars().all(|c| c.is_ascii_digit() || c == '.');
    if !valid {
        return Err(Error::type_conversion(format!(
            "cannot interpret {text:?} as a decimal"
        )));
    }
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (body, None),
    };
    let int_part = int_part.trim_start_matches('0');
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    Ok(match frac_part {
        Some(frac) => format!("{sign}{int_part}.{frac}"),
        None => format!("{sign}{int_part}"),
    })
}

/// Parse a date/time string with a strftime-style pattern.
///
/// Patterns without time components (such as the default `%y%m%d`) produce
/// midnight timestamps.
pub(crate) fn parse_date(text: &str, format: &str) -> Result<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
        return Ok(dt);
    }
    NaiveDate::parse_from_str(text, format)
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|_| {
            Error::type_conversion(format!(
                "cannot interpret {text:?} as a date with format {format:?}"
            ))
        })
}

/// Parse a date/time string from common ISO-style renderings.
const FLEXIBLE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

pub(crate) fn parse_date_flexible(text: &str) -> Result<NaiveDateTime> {
    for format in FLEXIBLE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|_| Error::type_conversion(format!("cannot interpret {text:?} as a date")))
}
