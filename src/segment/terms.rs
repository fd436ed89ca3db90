//! Conversion of field values into order-preserving term bytes.
//!
//! Numeric and date terms are fixed-width big-endian encodings whose byte
//! order equals value order, so dictionary range scans over them behave like
//! numeric range queries.

use std::borrow::Cow;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::analysis::tokenizer::{Tokenizer, UnicodeWordTokenizer, WholeTokenizer};
use crate::error::{Result, SundialError};
use crate::meta::FieldType;

const SIGN_BIT: u64 = 1 << 63;

/// Encode an `i64` so that unsigned byte order matches signed order.
pub fn encode_i64(value: i64) -> [u8; 8] {
    ((value as u64) ^ SIGN_BIT).to_be_bytes()
}

pub fn decode_i64(term: &[u8]) -> Option<i64> {
    let bytes: [u8; 8] = term.try_into().ok()?;
    Some((u64::from_be_bytes(bytes) ^ SIGN_BIT) as i64)
}

/// Encode an `f64` so that unsigned byte order matches IEEE total order.
pub fn encode_f64(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let ordered = if bits & SIGN_BIT != 0 {
        !bits
    } else {
        bits ^ SIGN_BIT
    };
    ordered.to_be_bytes()
}

pub fn decode_f64(term: &[u8]) -> Option<f64> {
    let bytes: [u8; 8] = term.try_into().ok()?;
    let ordered = u64::from_be_bytes(bytes);
    let bits = if ordered & SIGN_BIT != 0 {
        ordered ^ SIGN_BIT
    } else {
        !ordered
    };
    Some(f64::from_bits(bits))
}

pub fn encode_bool(value: bool) -> [u8; 1] {
    [u8::from(value)]
}

fn rejected(field: &str, field_type: FieldType, value: &Value) -> SundialError {
    SundialError::invalid_argument(format!(
        "field '{field}' cannot index {value} as {field_type}"
    ))
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Epoch milliseconds of an RFC 3339 timestamp or a plain integer.
fn parse_date_millis(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw)
        .map(|date| date.timestamp_millis())
        .ok()
        .or_else(|| raw.parse::<i64>().ok())
}

/// Append the terms `value` produces for a field of `field_type`.
///
/// Arrays contribute each element and `null` contributes nothing. A value
/// that cannot be read as the field's type is an error naming the field.
pub fn field_terms(
    field: &str,
    field_type: FieldType,
    value: &Value,
    out: &mut Vec<Vec<u8>>,
) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::Array(values) => values
            .iter()
            .try_for_each(|value| field_terms(field, field_type, value, out)),
        Value::Object(_) => Err(rejected(field, field_type, value)),
        scalar => {
            scalar_terms(field_type, scalar, out)
                .ok_or_else(|| rejected(field, field_type, scalar))
        }
    }
}

fn scalar_terms(field_type: FieldType, value: &Value, out: &mut Vec<Vec<u8>>) -> Option<()> {
    match field_type {
        FieldType::Keyword | FieldType::Text => {
            let text = match value {
                Value::String(s) => Cow::Borrowed(s.as_str()),
                other => Cow::Owned(other.to_string()),
            };
            let tokenizer: &dyn Tokenizer = if field_type == FieldType::Keyword {
                &WholeTokenizer
            } else {
                &UnicodeWordTokenizer
            };
            out.extend(
                tokenizer
                    .tokenize(&text)
                    .into_iter()
                    .map(|word| word.as_bytes().to_vec()),
            );
        }
        FieldType::Integer | FieldType::Long => {
            let number = match value {
                Value::Number(n) => n.as_i64()?,
                Value::String(s) => s.trim().parse().ok()?,
                _ => return None,
            };
            out.push(encode_i64(number).to_vec());
        }
        FieldType::Float | FieldType::Double => {
            let number = match value {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => s.trim().parse().ok()?,
                _ => return None,
            };
            out.push(encode_f64(number).to_vec());
        }
        FieldType::Boolean => {
            let flag = match value {
                Value::Bool(b) => *b,
                Value::String(s) => parse_bool(s)?,
                _ => return None,
            };
            out.push(encode_bool(flag).to_vec());
        }
        FieldType::Date => {
            let millis = match value {
                Value::Number(n) => n.as_i64()?,
                Value::String(s) => parse_date_millis(s)?,
                _ => return None,
            };
            out.push(encode_i64(millis).to_vec());
        }
    }
    Some(())
}

/// Encode a user-supplied bound or lookup key as a single term.
///
/// Unlike [`field_terms`], text is not tokenized.
pub fn term_from_str(field_type: FieldType, raw: &str) -> Result<Vec<u8>> {
    let invalid = || {
        SundialError::invalid_argument(format!("'{raw}' is not a valid {field_type} term"))
    };
    Ok(match field_type {
        FieldType::Keyword | FieldType::Text => raw.as_bytes().to_vec(),
        FieldType::Integer | FieldType::Long => {
            encode_i64(raw.trim().parse().map_err(|_| invalid())?).to_vec()
        }
        FieldType::Float | FieldType::Double => {
            encode_f64(raw.trim().parse().map_err(|_| invalid())?).to_vec()
        }
        FieldType::Boolean => encode_bool(parse_bool(raw).ok_or_else(invalid)?).to_vec(),
        FieldType::Date => encode_i64(parse_date_millis(raw).ok_or_else(invalid)?).to_vec(),
    })
}

/// Human-readable rendering of a term of `field_type`.
pub fn display_term(field_type: FieldType, term: &[u8]) -> String {
    let rendered = match field_type {
        FieldType::Keyword | FieldType::Text => None,
        FieldType::Integer | FieldType::Long => decode_i64(term).map(|n| n.to_string()),
        FieldType::Float | FieldType::Double => decode_f64(term).map(|n| n.to_string()),
        FieldType::Boolean => match term {
            [0] => Some("false".to_string()),
            [1] => Some("true".to_string()),
            _ => None,
        },
        FieldType::Date => decode_i64(term).and_then(|millis| {
            Utc.timestamp_millis_opt(millis)
                .single()
                .map(|date| date.to_rfc3339())
        }),
    };
    rendered.unwrap_or_else(|| String::from_utf8_lossy(term).into_owned())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn terms(field_type: FieldType, value: Value) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        field_terms("f", field_type, &value, &mut out).unwrap();
        out
    }

    #[test]
    fn test_integer_order() {
        let values = [i64::MIN, -1000, -1, 0, 1, 42, i64::MAX];
        let encoded: Vec<[u8; 8]> = values.iter().map(|&v| encode_i64(v)).collect();
        assert!(encoded.windows(2).all(|w| w[0] < w[1]));
        for (value, term) in values.iter().zip(&encoded) {
            assert_eq!(decode_i64(term), Some(*value));
        }
    }

    #[test]
    fn test_float_order() {
        let values = [f64::NEG_INFINITY, -2.5, -0.0001, 0.0, 0.5, 3.0, 1e300, f64::INFINITY];
        let encoded: Vec<[u8; 8]> = values.iter().map(|&v| encode_f64(v)).collect();
        assert!(encoded.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(decode_f64(&encode_f64(-2.5)), Some(-2.5));
    }

    #[test]
    fn test_text_and_keyword() {
        assert_eq!(
            terms(FieldType::Text, json!("eat more rice")),
            vec![b"eat".to_vec(), b"more".to_vec(), b"rice".to_vec()]
        );
        assert_eq!(
            terms(FieldType::Keyword, json!("eat more rice")),
            vec![b"eat more rice".to_vec()]
        );
        assert_eq!(terms(FieldType::Keyword, json!(12)), vec![b"12".to_vec()]);
        assert!(terms(FieldType::Keyword, json!("")).is_empty());
    }

    #[test]
    fn test_arrays_and_nulls() {
        assert_eq!(
            terms(FieldType::Long, json!([3, null, "7"])),
            vec![encode_i64(3).to_vec(), encode_i64(7).to_vec()]
        );
        assert!(terms(FieldType::Keyword, Value::Null).is_empty());
    }

    #[test]
    fn test_boolean_and_date() {
        assert_eq!(terms(FieldType::Boolean, json!("TRUE")), vec![vec![1]]);
        assert_eq!(terms(FieldType::Boolean, json!(false)), vec![vec![0]]);
        assert_eq!(
            terms(FieldType::Date, json!("1970-01-01T00:00:01Z")),
            terms(FieldType::Date, json!(1000))
        );
    }

    #[test]
    fn test_rejections_name_field() {
        let mut out = Vec::new();
        let err = field_terms("age", FieldType::Integer, &json!("old"), &mut out).unwrap_err();
        assert!(err.to_string().contains("field 'age'"));
        assert!(field_terms("age", FieldType::Integer, &json!(1.5), &mut out).is_err());
        assert!(field_terms("ok", FieldType::Boolean, &json!("yes"), &mut out).is_err());
        assert!(field_terms("o", FieldType::Keyword, &json!({"a": 1}), &mut out).is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let term = term_from_str(FieldType::Long, "-17").unwrap();
        assert_eq!(display_term(FieldType::Long, &term), "-17");
        let term = term_from_str(FieldType::Date, "1970-01-01T00:00:00Z").unwrap();
        assert_eq!(display_term(FieldType::Date, &term), "1970-01-01T00:00:00+00:00");
        assert_eq!(display_term(FieldType::Keyword, b"cat"), "cat");
    }
}
