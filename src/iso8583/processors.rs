//! Scheme-specific sub-field processors.
//!
//! These run after a field has been pulled off the wire: PAN masking, the
//! Mastercard PDS tag-length-value breakdown, EMV ICC tags (BER-TLV), and
//! the DE43 merchant name/location split.

use crate::error::{Error, Result};
use crate::iso8583::{FieldValue, Record};
use regex::Regex;

/// How ICC TLV parsing reacts to truncated data.
///
/// Partial EMV data still has forensic value, so the default keeps whatever
/// tags were collected before the truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlvErrorPolicy {
    /// Stop parsing, keep the tags collected so far.
    #[default]
    Warn,
    /// Surface a TLV error.
    Error,
}

impl TlvErrorPolicy {
    /// Read the policy from a field's `on_error=...` processor config.
    pub fn from_processor_config(config: Option<&str>) -> Self {
        let Some(config) = config else {
            return Self::default();
        };
        for item in config.split(',') {
            if let Some((key, value)) = item.split_once('=') {
                if key.trim().eq_ignore_ascii_case("on_error") {
                    return match value.trim().to_ascii_uppercase().as_str() {
                        "ERROR" => Self::Error,
                        _ => Self::Warn,
                    };
                }
            }
        }
        Self::default()
    }
}

/// Mask a card number to `first6 + '*'... + last4`.
///
/// Values of 10 characters or fewer pass through unmasked.
pub fn mask_pan(pan: &str) -> String {
    let chars: Vec<char> = pan.chars().collect();
    if chars.len() <= 10 {
        return pan.to_string();
    }
    let first: String = chars[..6].iter().collect();
    let last: String = chars[chars.len() - 4..].iter().collect();
    format!("{first}{}{last}", "*".repeat(chars.len() - 10))
}

/// Truncate a card number to its 9-character prefix.
pub fn pan_prefix(pan: &str) -> String {
    pan.chars().take(9).collect()
}

/// Parse a PDS field into `PDSxxxx` record keys.
///
/// The field is a run of `tag(4) length(3) value(length)` items; the run
/// ends when the field is exhausted.
pub fn parse_pds(data: &str, record: &mut Record) -> Result<()> {
    let chars: Vec<char> = data.chars().collect();
    let mut pos = 0;
    while pos < chars.len() {
        if pos + 7 > chars.len() {
            return Err(Error::structure(format!(
                "PDS data truncated mid-header at position {pos}"
            )));
        }
        let tag: String = chars[pos..pos + 4].iter().collect();
        let length: usize = chars[pos + 4..pos + 7]
            .iter()
            .collect::<String>()
            .parse()
            .map_err(|_| {
                Error::structure(format!("invalid PDS length for tag {tag} at position {pos}"))
            })?;
        if pos + 7 + length > chars.len() {
            return Err(Error::structure(format!(
                "PDS value for tag {tag} runs past end of field"
            )));
        }
        let value: String = chars[pos + 7..pos + 7 + length].iter().collect();
        log::debug!("pds tag={tag} length={length}");
        record.insert(format!("PDS{tag}"), FieldValue::Text(value));
        pos += 7 + length;
    }
    Ok(())
}

/// Longest PDS run that fits a single data element.
const PDS_FRAGMENT_MAX: usize = 999;

/// Collect the `PDSxxxx` keys of a record into wire fragments.
///
/// Tags are laid out in ascending numeric order as `tag(4) length(3)
/// value`; a new fragment starts whenever the next item would push the
/// current one past 999 characters. Returns an empty list when the record
/// has no PDS keys.
pub fn build_pds_fragments(record: &Record) -> Result<Vec<String>> {
    let mut tags: Vec<(u32, &str, &FieldValue)> = Vec::new();
    for (key, value) in record {
        if let Some(tag_text) = key.strip_prefix("PDS") {
            let tag = tag_text.parse::<u32>().map_err(|_| {
                Error::type_conversion(format!("PDS key {key} does not carry a numeric tag"))
            })?;
            tags.push((tag, key.as_str(), value));
        }
    }
    tags.sort_by_key(|(tag, ..)| *tag);

    let mut fragments = Vec::new();
    let mut current = String::new();
    for (tag, key, value) in tags {
        let text = match value {
            FieldValue::Text(s) => s,
            other => {
                return Err(Error::type_conversion(format!(
                    "{key} must be a text value, got {other}"
                )))
            }
        };
        let length = text.chars().count();
        let item = format!("{tag:04}{length:03}{text}");
        if item.chars().count() > PDS_FRAGMENT_MAX {
            return Err(Error::structure(format!(
                "{key} value is too long to carry in a single data element"
            )));
        }
        if current.chars().count() + item.chars().count() > PDS_FRAGMENT_MAX {
            fragments.push(std::mem::take(&mut current));
        }
        current.push_str(&item);
    }
    if !current.is_empty() {
        fragments.push(current);
    }
    Ok(fragments)
}

/// Tag prefixes that start a two-byte EMV tag.
const TWO_BYTE_TAG_PREFIXES: [u8; 2] = [0x9f, 0x5f];

/// Parse ICC (EMV chip) data into `TAGxx` record keys.
///
/// Tags are one byte, or two when the first byte is 0x9F or 0x5F; a 0x00
/// byte (low-values filler) terminates the run. `ICC_DATA` always carries
/// the full field as hex. Truncated data is handled per `policy`.
pub fn parse_icc(data: &[u8], policy: TlvErrorPolicy, record: &mut Record) -> Result<()> {
    record.insert(
        "ICC_DATA".to_string(),
        FieldValue::Text(hex::encode(data)),
    );

    let mut pos = 0;
    while pos < data.len() {
        if data[pos] == 0x00 {
            break;
        }
        let tag_len = if TWO_BYTE_TAG_PREFIXES.contains(&data[pos]) {
            2
        } else {
            1
        };
        if pos + tag_len + 1 > data.len() {
            return truncated(policy, pos);
        }
        let tag = &data[pos..pos + tag_len];
        let length = data[pos + tag_len] as usize;
        let value_start = pos + tag_len + 1;
        if value_start + length > data.len() {
            return truncated(policy, pos);
        }
        let value = &data[value_start..value_start + length];
        record.insert(
            format!("TAG{}", hex::encode_upper(tag)),
            FieldValue::Text(hex::encode(value)),
        );
        pos = value_start + length;
    }
    Ok(())
}

fn truncated(policy: TlvErrorPolicy, pos: usize) -> Result<()> {
    match policy {
        TlvErrorPolicy::Warn => {
            log::warn!("ICC data truncated at offset {pos}; keeping tags collected so far");
            Ok(())
        }
        TlvErrorPolicy::Error => Err(Error::tlv(format!("ICC data truncated at offset {pos}"))),
    }
}

/// Split a DE43 merchant name/location value with the configured regex.
///
/// Named groups become record keys; a non-matching value contributes no
/// sub-fields. Trailing whitespace is trimmed from the postcode.
pub fn parse_de43(value: &str, regex: &Regex, record: &mut Record) {
    let Some(captures) = regex.captures(value) else {
        return;
    };
    for name in regex.capture_names().flatten() {
        if let Some(group) = captures.name(name) {
            let text = if name == "DE43_POSTCODE" {
                group.as_str().trim_end()
            } else {
                group.as_str()
            };
            record.insert(name.to_string(), FieldValue::Text(text.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_DE43_REGEX;

    #[test]
    fn test_mask_pan() {
        assert_eq!(mask_pan("4564320012321122"), "456432******1122");
        assert_eq!(mask_pan("123456789"), "123456789");
    }

    #[test]
    fn test_pan_prefix() {
        assert_eq!(pan_prefix("4564320012321122"), "456432001");
    }

    #[test]
    fn test_parse_pds() {
        let mut record = Record::new();
        parse_pds("0001003123" , &mut record).unwrap();
        assert_eq!(record["PDS0001"], FieldValue::Text("123".to_string()));

        let mut record = Record::new();
        parse_pds("00010031239999006ABCDEF", &mut record).unwrap();
        assert_eq!(record["PDS0001"], FieldValue::Text("123".to_string()));
        assert_eq!(record["PDS9999"], FieldValue::Text("ABCDEF".to_string()));
    }

    #[test]
    fn test_parse_pds_truncated() {
        let mut record = Record::new();
        assert!(parse_pds("000100512", &mut record).is_err());
        assert!(parse_pds("0001", &mut record).is_err());
    }

    #[test]
    fn test_build_pds_fragments_orders_by_tag() {
        let mut record = Record::new();
        record.insert("PDS9999".to_string(), FieldValue::Text("ABCDEF".to_string()));
        record.insert("PDS0001".to_string(), FieldValue::Text("123".to_string()));
        let fragments = build_pds_fragments(&record).unwrap();
        assert_eq!(fragments, vec!["00010031239999006ABCDEF".to_string()]);
    }

    #[test]
    fn test_build_pds_fragments_splits_at_capacity() {
        let mut record = Record::new();
        record.insert("PDS0001".to_string(), FieldValue::Text("*".repeat(900)));
        record.insert("PDS9999".to_string(), FieldValue::Text("!".repeat(900)));
        let fragments = build_pds_fragments(&record).unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0], format!("0001900{}", "*".repeat(900)));
        assert_eq!(fragments[1], format!("9999900{}", "!".repeat(900)));
    }

    #[test]
    fn test_build_pds_fragments_empty() {
        let mut record = Record::new();
        record.insert("DE2".to_string(), FieldValue::Text("123".to_string()));
        assert!(build_pds_fragments(&record).unwrap().is_empty());
    }

    #[test]
    fn test_parse_icc_single_byte_tag() {
        let mut record = Record::new();
        parse_icc(&[0x01, 0x01, 0xff], TlvErrorPolicy::Warn, &mut record).unwrap();
        assert_eq!(record["ICC_DATA"], FieldValue::Text("0101ff".to_string()));
        assert_eq!(record["TAG01"], FieldValue::Text("ff".to_string()));
    }

    #[test]
    fn test_parse_icc_two_byte_tag_and_terminator() {
        let data = [0x9f, 0x26, 0x02, 0xaa, 0xbb, 0x00, 0x55, 0x55];
        let mut record = Record::new();
        parse_icc(&data, TlvErrorPolicy::Warn, &mut record).unwrap();
        assert_eq!(record["TAG9F26"], FieldValue::Text("aabb".to_string()));
        // parsing stops at the 0x00 filler; the trailing bytes are ignored
        assert_eq!(record.keys().filter(|k| k.starts_with("TAG")).count(), 1);
    }

    #[test]
    fn test_parse_icc_truncated_warn_keeps_tags() {
        let data = [0x01, 0x01, 0xff, 0x9f];
        let mut record = Record::new();
        parse_icc(&data, TlvErrorPolicy::Warn, &mut record).unwrap();
        assert_eq!(record["TAG01"], FieldValue::Text("ff".to_string()));
        assert_eq!(record["ICC_DATA"], FieldValue::Text("0101ff9f".to_string()));
    }

    #[test]
    fn test_parse_icc_truncated_error() {
        let data = [0x01, 0x05, 0xff];
        let mut record = Record::new();
        assert!(parse_icc(&data, TlvErrorPolicy::Error, &mut record).is_err());
    }

    #[test]
    fn test_tlv_policy_from_config() {
        assert_eq!(TlvErrorPolicy::from_processor_config(None), TlvErrorPolicy::Warn);
        assert_eq!(
            TlvErrorPolicy::from_processor_config(Some("on_error=ERROR")),
            TlvErrorPolicy::Error
        );
        assert_eq!(
            TlvErrorPolicy::from_processor_config(Some("on_error=WARN")),
            TlvErrorPolicy::Warn
        );
    }

    #[test]
    fn test_parse_de43() {
        let regex = Regex::new(DEFAULT_DE43_REGEX).unwrap();
        let mut record = Record::new();
        parse_de43(
            r"BOBS BURGERS\100 MAIN ST\WOOLLOONGABBA\4102      QLDAUS",
            &regex,
            &mut record,
        );
        assert_eq!(record["DE43_NAME"], FieldValue::Text("BOBS BURGERS".to_string()));
        assert_eq!(record["DE43_ADDRESS"], FieldValue::Text("100 MAIN ST".to_string()));
        assert_eq!(record["DE43_SUBURB"], FieldValue::Text("WOOLLOONGABBA".to_string()));
        assert_eq!(record["DE43_POSTCODE"], FieldValue::Text("4102".to_string()));
        assert_eq!(record["DE43_STATE"], FieldValue::Text("QLD".to_string()));
        assert_eq!(record["DE43_COUNTRY"], FieldValue::Text("AUS".to_string()));
    }

    #[test]
    fn test_parse_de43_no_match() {
        let regex = Regex::new(DEFAULT_DE43_REGEX).unwrap();
        let mut record = Record::new();
        parse_de43("NO SEPARATORS HERE", &regex, &mut record);
        assert!(record.is_empty());
    }
}
