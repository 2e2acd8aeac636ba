//! Single-field wire codec.
//!
//! Field layout is `[length prefix][value]`: LLVAR carries a 2-digit decimal
//! length, LLLVAR a 3-digit one, FIXED has no prefix and occupies exactly
//! the configured width. Text values are laid down in the message encoding;
//! binary values bypass it and are measured in bytes.

use crate::config::{FieldConfig, FieldProcessor};
use crate::encoding::Encoding;
use crate::error::{Error, Result};
use crate::iso8583::processors::{
    mask_pan, pan_prefix, parse_de43, parse_icc, parse_pds, TlvErrorPolicy,
};
use crate::iso8583::value::{decode_typed, encode_typed};
use crate::iso8583::{FieldValue, Record};
use regex::Regex;

/// Encode one field, including its length prefix.
pub(crate) fn encode_field(
    bit: u8,
    config: &FieldConfig,
    value: &FieldValue,
    encoding: Encoding,
) -> Result<Vec<u8>> {
    let data = match value {
        FieldValue::Bytes(bytes) => bytes.clone(),
        _ => {
            let mut text = encode_typed(value, config)?;
            if config.field_type == crate::config::FieldType::Fixed {
                text = fix_width(&text, config.length);
            }
            encoding.encode(&text)?
        }
    };

    let prefix_digits = config.field_type.length_prefix_digits();
    let mut output = Vec::with_capacity(prefix_digits + data.len());
    if prefix_digits > 0 {
        let max = 10usize.pow(prefix_digits as u32) - 1;
        if data.len() > max {
            return Err(Error::structure(format!(
                "DE{bit} value of {} bytes does not fit a {prefix_digits}-digit length prefix",
                data.len()
            )));
        }
        output.extend(encoding.encode(&format!("{:0width$}", data.len(), width = prefix_digits))?);
    }
    output.extend(data);
    Ok(output)
}

/// Truncate to `width` characters, then pad right with spaces.
fn fix_width(text: &str, width: usize) -> String {
    let truncated: String = text.chars().take(width).collect();
    let pad = width.saturating_sub(truncated.chars().count());
    format!("{truncated}{}", " ".repeat(pad))
}

/// Decode one field from the head of `data` into `record`.
///
/// Returns the number of bytes consumed. `de43_regex` is the compiled
/// splitter for fields carrying the DE43 processor.
pub(crate) fn decode_field(
    bit: u8,
    config: &FieldConfig,
    data: &[u8],
    encoding: Encoding,
    de43_regex: Option<&Regex>,
    record: &mut Record,
) -> Result<usize> {
    let prefix_digits = config.field_type.length_prefix_digits();
    let field_length = if prefix_digits > 0 {
        if data.len() < prefix_digits {
            return Err(Error::structure(format!(
                "message ends inside the length prefix of DE{bit}"
            )));
        }
        let prefix = encoding.decode(&data[..prefix_digits])?;
        prefix.parse::<usize>().map_err(|_| {
            Error::structure(format!("invalid length prefix {prefix:?} for DE{bit}"))
        })?
    } else {
        config.length
    };

    let total = prefix_digits + field_length;
    if data.len() < total {
        return Err(Error::structure_with(
            format!(
                "DE{bit} needs {field_length} bytes but only {} remain",
                data.len() - prefix_digits
            ),
            data.to_vec(),
        ));
    }
    let raw = &data[prefix_digits..total];

    if config.processor == Some(FieldProcessor::Icc) {
        record.insert(format!("DE{bit}"), FieldValue::Bytes(raw.to_vec()));
        let policy = TlvErrorPolicy::from_processor_config(config.processor_config.as_deref());
        parse_icc(raw, policy, record)?;
        return Ok(total);
    }

    let mut text = encoding.decode(raw)?;
    match config.processor {
        Some(FieldProcessor::Pan) => text = mask_pan(&text),
        Some(FieldProcessor::PanPrefix) => text = pan_prefix(&text),
        _ => {}
    }
    let value = decode_typed(text.clone(), config)?;
    record.insert(format!("DE{bit}"), value);

    match config.processor {
        Some(FieldProcessor::Pds) => parse_pds(&text, record)?,
        Some(FieldProcessor::De43) => {
            if let Some(regex) = de43_regex {
                parse_de43(&text, regex, record);
            }
        }
        _ => {}
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldType, ValueType};

    fn field(field_type: FieldType, length: usize) -> FieldConfig {
        FieldConfig::new("test", field_type, length)
    }

    #[test]
    fn test_encode_variable_and_fixed() {
        let value = FieldValue::Text("4564320012321122".to_string());
        assert_eq!(
            encode_field(2, &field(FieldType::LlVar, 0), &value, Encoding::Latin1).unwrap(),
            b"164564320012321122"
        );
        assert_eq!(
            encode_field(2, &field(FieldType::LllVar, 0), &value, Encoding::Latin1).unwrap(),
            b"0164564320012321122"
        );
        assert_eq!(
            encode_field(2, &field(FieldType::Fixed, 20), &value, Encoding::Latin1).unwrap(),
            b"4564320012321122    "
        );
    }

    #[test]
    fn test_encode_typed_values() {
        let config = field(FieldType::Fixed, 20).with_value_type(ValueType::Int);
        assert_eq!(
            encode_field(4, &config, &FieldValue::Int(1234), Encoding::Latin1).unwrap(),
            b"00000000000000001234"
        );
        let config = field(FieldType::LlVar, 0).with_value_type(ValueType::Int);
        assert_eq!(
            encode_field(4, &config, &FieldValue::Int(1234), Encoding::Latin1).unwrap(),
            b"041234"
        );
        let config = field(FieldType::Fixed, 20).with_value_type(ValueType::Decimal);
        assert_eq!(
            encode_field(
                4,
                &config,
                &FieldValue::Decimal("123.432".to_string()),
                Encoding::Latin1
            )
            .unwrap(),
            b"0000000000000123.432"
        );
    }

    #[test]
    fn test_encode_length_prefix_overflow() {
        let value = FieldValue::Text("x".repeat(100));
        assert!(encode_field(2, &field(FieldType::LlVar, 0), &value, Encoding::Latin1).is_err());
    }

    #[test]
    fn test_decode_variable_and_fixed() {
        let mut record = Record::new();
        let used = decode_field(
            2,
            &field(FieldType::LlVar, 0),
            b"164564320012321122",
            Encoding::Latin1,
            None,
            &mut record,
        )
        .unwrap();
        assert_eq!(used, 18);
        assert_eq!(record["DE2"], FieldValue::Text("4564320012321122".to_string()));

        let mut record = Record::new();
        let used = decode_field(
            2,
            &field(FieldType::Fixed, 20),
            b"4564320012321122    ",
            Encoding::Latin1,
            None,
            &mut record,
        )
        .unwrap();
        assert_eq!(used, 20);
        assert_eq!(record["DE2"], FieldValue::Text("4564320012321122    ".to_string()));
    }

    #[test]
    fn test_decode_typed() {
        let config = field(FieldType::LlVar, 0).with_value_type(ValueType::Int);
        let mut record = Record::new();
        let used = decode_field(4, &config, b"041234", Encoding::Latin1, None, &mut record).unwrap();
        assert_eq!(used, 6);
        assert_eq!(record["DE4"], FieldValue::Int(1234));
    }

    #[test]
    fn test_decode_pan_processors() {
        let config = field(FieldType::LlVar, 0).with_processor(FieldProcessor::Pan);
        let mut record = Record::new();
        decode_field(2, &config, b"164564320012321122", Encoding::Latin1, None, &mut record)
            .unwrap();
        assert_eq!(record["DE2"], FieldValue::Text("456432******1122".to_string()));

        let config = field(FieldType::LlVar, 0).with_processor(FieldProcessor::PanPrefix);
        let mut record = Record::new();
        decode_field(2, &config, b"164564320012321122", Encoding::Latin1, None, &mut record)
            .unwrap();
        assert_eq!(record["DE2"], FieldValue::Text("456432001".to_string()));
    }

    #[test]
    fn test_decode_icc_field() {
        let config = field(FieldType::LlVar, 0).with_processor(FieldProcessor::Icc);
        let mut record = Record::new();
        let used = decode_field(
            55,
            &config,
            b"\x30\x33\x01\x01\xff",
            Encoding::Latin1,
            None,
            &mut record,
        )
        .unwrap();
        assert_eq!(used, 5);
        assert_eq!(record["DE55"], FieldValue::Bytes(vec![0x01, 0x01, 0xff]));
        assert_eq!(record["ICC_DATA"], FieldValue::Text("0101ff".to_string()));
        assert_eq!(record["TAG01"], FieldValue::Text("ff".to_string()));
    }

    #[test]
    fn test_decode_short_field_is_an_error() {
        let mut record = Record::new();
        let err = decode_field(
            2,
            &field(FieldType::LlVar, 0),
            b"16456432",
            Encoding::Latin1,
            None,
            &mut record,
        )
        .unwrap_err();
        assert!(err.binary_context().is_some());
    }

    #[test]
    fn test_decode_bad_length_prefix() {
        let mut record = Record::new();
        assert!(decode_field(
            2,
            &field(FieldType::LlVar, 0),
            b"ab456432",
            Encoding::Latin1,
            None,
            &mut record,
        )
        .is_err());
    }
}
