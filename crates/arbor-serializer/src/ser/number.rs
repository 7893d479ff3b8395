use serde_json::{Number, Value};

use crate::error::{MarshalError, MarshalResult, UnmarshalError, UnmarshalResult};
use crate::object_match::ObjectMatch;
use crate::ser::{JsonSerializer, Serializer};
use crate::state::SerializerState;
use crate::types::{JsonKind, SourceKind, TypeDesc};
use crate::value::HostValue;

/// Serializes the numeric ladder. String input parses with the exact
/// target width's parser; fractional input fails integer targets instead
/// of truncating.
pub struct NumberSerializer;

impl Serializer for NumberSerializer {
    fn name(&self) -> &'static str {
        "number"
    }

    fn source_kinds(&self) -> &'static [SourceKind] {
        &[SourceKind::Number]
    }

    fn json_kinds(&self) -> &'static [JsonKind] {
        &[JsonKind::Number, JsonKind::String]
    }

    fn marshal(
        &self,
        _ser: &JsonSerializer,
        _state: &mut SerializerState,
        value: &HostValue,
    ) -> MarshalResult<Value> {
        match value {
            HostValue::I8(n) => Ok(Value::from(*n)),
            HostValue::I16(n) => Ok(Value::from(*n)),
            HostValue::I32(n) => Ok(Value::from(*n)),
            HostValue::I64(n) => Ok(Value::from(*n)),
            HostValue::F32(n) => float_value(*n as f64),
            HostValue::F64(n) => float_value(*n),
            other => Err(MarshalError::custom(format!(
                "number serializer got {:?}",
                other
            ))),
        }
    }

    fn try_unmarshal(
        &self,
        _ser: &JsonSerializer,
        _state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<ObjectMatch> {
        to_number(ty, json)?;
        Ok(ObjectMatch::OKAY)
    }

    fn unmarshal(
        &self,
        _ser: &JsonSerializer,
        _state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<HostValue> {
        if json.as_str() == Some("") {
            return Ok(HostValue::Null);
        }
        to_number(ty, json)
    }
}

fn float_value(n: f64) -> MarshalResult<Value> {
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| MarshalError::custom("non-finite number is not representable"))
}

fn to_number(ty: &TypeDesc, json: &Value) -> UnmarshalResult<HostValue> {
    match ty {
        TypeDesc::I8 => integer::<i8>(json, "a byte").map(HostValue::I8),
        TypeDesc::I16 => integer::<i16>(json, "a short").map(HostValue::I16),
        TypeDesc::I32 => integer::<i32>(json, "an int").map(HostValue::I32),
        TypeDesc::I64 => integer::<i64>(json, "a long").map(HostValue::I64),
        TypeDesc::F32 => {
            let n = float(json)?;
            if n.is_finite() && (n > f64::from(f32::MAX) || n < f64::from(f32::MIN)) {
                return Err(UnmarshalError::NumberTooLarge("a float"));
            }
            Ok(HostValue::F32(n as f32))
        }
        TypeDesc::F64 => float(json).map(HostValue::F64),
        TypeDesc::Any => match json {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(HostValue::I64(i))
                } else {
                    Ok(HostValue::F64(n.as_f64().ok_or(UnmarshalError::NotANumber)?))
                }
            }
            Value::String(s) => {
                if let Ok(i) = s.parse::<i64>() {
                    Ok(HostValue::I64(i))
                } else {
                    s.parse::<f64>()
                        .map(HostValue::F64)
                        .map_err(|_| UnmarshalError::NotANumber)
                }
            }
            _ => Err(UnmarshalError::NotANumber),
        },
        _ => Err(UnmarshalError::NotANumber),
    }
}

fn integer<T>(json: &Value, width: &'static str) -> UnmarshalResult<T>
where
    T: std::str::FromStr + TryFrom<i64>,
{
    match json {
        // strings parse with the exact target width's parser
        Value::String(s) => s.parse::<T>().map_err(|_| UnmarshalError::NotANumber),
        Value::Number(n) => {
            let i = if let Some(i) = n.as_i64() {
                i
            } else {
                let f = n.as_f64().ok_or(UnmarshalError::NotANumber)?;
                if f.fract() != 0.0 {
                    return Err(UnmarshalError::NotAnInteger);
                }
                if f > i64::MAX as f64 || f < i64::MIN as f64 {
                    return Err(UnmarshalError::NumberTooLarge(width));
                }
                f as i64
            };
            T::try_from(i).map_err(|_| UnmarshalError::NumberTooLarge(width))
        }
        _ => Err(UnmarshalError::NotANumber),
    }
}

fn float(json: &Value) -> UnmarshalResult<f64> {
    match json {
        Value::Number(n) => n.as_f64().ok_or(UnmarshalError::NotANumber),
        Value::String(s) => s.parse::<f64>().map_err(|_| UnmarshalError::NotANumber),
        _ => Err(UnmarshalError::NotANumber),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn widths_roundtrip() {
        assert_eq!(to_number(&TypeDesc::I32, &json!(42)).unwrap().as_i32(), Some(42));
        assert_eq!(
            to_number(&TypeDesc::I64, &json!(1_000_000_000_000i64))
                .unwrap()
                .as_i64(),
            Some(1_000_000_000_000)
        );
        assert_eq!(to_number(&TypeDesc::F64, &json!(1.5)).unwrap().as_f64(), Some(1.5));
    }

    #[test]
    fn narrowing_out_of_range_fails() {
        assert!(matches!(
            to_number(&TypeDesc::I8, &json!(300)),
            Err(UnmarshalError::NumberTooLarge(_))
        ));
        assert!(matches!(
            to_number(&TypeDesc::I16, &json!(-40_000)),
            Err(UnmarshalError::NumberTooLarge(_))
        ));
    }

    #[test]
    fn fractional_input_fails_integer_targets() {
        assert!(matches!(
            to_number(&TypeDesc::I32, &json!(1.5)),
            Err(UnmarshalError::NotAnInteger)
        ));
    }

    #[test]
    fn strings_parse_with_target_width() {
        assert_eq!(to_number(&TypeDesc::I32, &json!("17")).unwrap().as_i32(), Some(17));
        assert_eq!(to_number(&TypeDesc::F64, &json!("2.25")).unwrap().as_f64(), Some(2.25));
        // fractional text does not silently truncate for integer targets
        assert!(to_number(&TypeDesc::I64, &json!("2.5")).is_err());
        assert!(to_number(&TypeDesc::I32, &json!("abc")).is_err());
    }

    #[test]
    fn untyped_numbers_pick_natural_width() {
        assert_eq!(to_number(&TypeDesc::Any, &json!(7)).unwrap().as_i64(), Some(7));
        assert_eq!(to_number(&TypeDesc::Any, &json!(7.5)).unwrap().as_f64(), Some(7.5));
    }
}
