//! Built-in scalar conversions.

use crate::schema::PrimitiveKind;
use crate::value::{RawValue, Value};

const TRUE_LITERALS: &[&str] = &["yes", "true", "t", "y", "1"];
const FALSE_LITERALS: &[&str] = &["no", "false", "f", "n", "0"];

/// Convert a raw scalar into the primitive `kind`, or explain why not.
pub(super) fn decode(kind: PrimitiveKind, raw: &RawValue) -> Result<Value, String> {
    match kind {
        PrimitiveKind::Bool => decode_bool(raw).map(Value::Bool),
        PrimitiveKind::Int => decode_int(raw).map(Value::Int),
        PrimitiveKind::Float => decode_float(raw).map(Value::Float),
        PrimitiveKind::Str => decode_str(raw).map(Value::Str),
        PrimitiveKind::Bytes => decode_bytes(raw).map(Value::Bytes),
    }
}

fn decode_bool(raw: &RawValue) -> Result<bool, String> {
    match raw {
        RawValue::Bool(value) => Ok(*value),
        RawValue::Number(number) => match number.as_i64() {
            Some(1) => Ok(true),
            Some(0) => Ok(false),
            _ => Err("only 0 and 1 are boolean numbers".to_string()),
        },
        RawValue::String(text) => {
            let literal = text.trim().to_ascii_lowercase();
            if TRUE_LITERALS.contains(&literal.as_str()) {
                Ok(true)
            } else if FALSE_LITERALS.contains(&literal.as_str()) {
                Ok(false)
            } else {
                Err(format!(
                    "expected one of {} or {}",
                    TRUE_LITERALS.join("/"),
                    FALSE_LITERALS.join("/")
                ))
            }
        }
        other => Err(format!("cannot read a boolean from {}", shape(other))),
    }
}

fn decode_int(raw: &RawValue) -> Result<i64, String> {
    match raw {
        RawValue::Number(number) => {
            if let Some(value) = number.as_i64() {
                return Ok(value);
            }
            match number.as_f64() {
                Some(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
                    Ok(value as i64)
                }
                _ => Err("number is not an integer in range".to_string()),
            }
        }
        RawValue::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|err| format!("invalid integer literal: {err}")),
        other => Err(format!("cannot read an integer from {}", shape(other))),
    }
}

fn decode_float(raw: &RawValue) -> Result<f64, String> {
    match raw {
        RawValue::Number(number) => number
            .as_f64()
            .ok_or_else(|| "number is not representable as a float".to_string()),
        RawValue::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|err| format!("invalid float literal: {err}")),
        other => Err(format!("cannot read a float from {}", shape(other))),
    }
}

fn decode_str(raw: &RawValue) -> Result<String, String> {
    match raw {
        RawValue::String(text) => Ok(text.clone()),
        RawValue::Number(number) => Ok(number.to_string()),
        RawValue::Bool(value) => Ok(value.to_string()),
        other => Err(format!("cannot read a string from {}", shape(other))),
    }
}

fn decode_bytes(raw: &RawValue) -> Result<Vec<u8>, String> {
    match raw {
        RawValue::String(text) => Ok(text.as_bytes().to_vec()),
        RawValue::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|byte| u8::try_from(byte).ok())
                    .ok_or_else(|| format!("{item} is not a byte"))
            })
            .collect(),
        other => Err(format!("cannot read bytes from {}", shape(other))),
    }
}

fn shape(raw: &RawValue) -> &'static str {
    match raw {
        RawValue::Null => "null",
        RawValue::Bool(_) => "a boolean",
        RawValue::Number(_) => "a number",
        RawValue::String(_) => "a string",
        RawValue::Array(_) => "a sequence",
        RawValue::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::decode;
    use crate::schema::PrimitiveKind;
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn bool_literals_are_case_insensitive() {
        for literal in ["yes", "True", "T", "y", "1"] {
            assert_eq!(
                decode(PrimitiveKind::Bool, &json!(literal)),
                Ok(Value::Bool(true))
            );
        }
        for literal in ["NO", "false", "f", "n", "0"] {
            assert_eq!(
                decode(PrimitiveKind::Bool, &json!(literal)),
                Ok(Value::Bool(false))
            );
        }
        assert!(decode(PrimitiveKind::Bool, &json!("maybe")).is_err());
        assert!(decode(PrimitiveKind::Bool, &json!(2)).is_err());
    }

    #[test]
    fn integers_parse_from_strings_and_integral_floats() {
        assert_eq!(decode(PrimitiveKind::Int, &json!(" 42 ")), Ok(Value::Int(42)));
        assert_eq!(decode(PrimitiveKind::Int, &json!(7.0)), Ok(Value::Int(7)));
        assert!(decode(PrimitiveKind::Int, &json!(7.5)).is_err());
        assert!(decode(PrimitiveKind::Int, &json!("seven")).is_err());
        assert!(decode(PrimitiveKind::Int, &json!(true)).is_err());
    }

    #[test]
    fn floats_parse_special_values() {
        assert_eq!(decode(PrimitiveKind::Float, &json!("2.5")), Ok(Value::Float(2.5)));
        assert_eq!(decode(PrimitiveKind::Float, &json!(3)), Ok(Value::Float(3.0)));
        match decode(PrimitiveKind::Float, &json!("inf")) {
            Ok(Value::Float(value)) => assert!(value.is_infinite()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn strings_accept_scalars() {
        assert_eq!(
            decode(PrimitiveKind::Str, &json!(2.3)),
            Ok(Value::Str("2.3".to_string()))
        );
        assert!(decode(PrimitiveKind::Str, &json!([1])).is_err());
    }

    #[test]
    fn bytes_accept_strings_and_byte_lists() {
        assert_eq!(
            decode(PrimitiveKind::Bytes, &json!("ab")),
            Ok(Value::Bytes(b"ab".to_vec()))
        );
        assert_eq!(
            decode(PrimitiveKind::Bytes, &json!([0, 255])),
            Ok(Value::Bytes(vec![0, 255]))
        );
        assert!(decode(PrimitiveKind::Bytes, &json!([256])).is_err());
    }
}
