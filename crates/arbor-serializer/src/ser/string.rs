use serde_json::Value;

use crate::error::{MarshalError, MarshalResult, UnmarshalError, UnmarshalResult};
use crate::object_match::ObjectMatch;
use crate::ser::{JsonSerializer, Serializer};
use crate::state::SerializerState;
use crate::types::{JsonKind, SourceKind, TypeDesc};
use crate::value::HostValue;

/// Serializes strings and chars. Numeric wire values coerce to their
/// decimal text form, which is why they only rate SIMILAR.
pub struct StringSerializer;

impl Serializer for StringSerializer {
    fn name(&self) -> &'static str {
        "string"
    }

    fn source_kinds(&self) -> &'static [SourceKind] {
        &[SourceKind::String, SourceKind::Char]
    }

    fn json_kinds(&self) -> &'static [JsonKind] {
        &[JsonKind::String, JsonKind::Number]
    }

    fn marshal(
        &self,
        _ser: &JsonSerializer,
        _state: &mut SerializerState,
        value: &HostValue,
    ) -> MarshalResult<Value> {
        match value {
            HostValue::String(s) => Ok(Value::String(s.clone())),
            HostValue::Char(c) => Ok(Value::String(c.to_string())),
            other => Err(MarshalError::custom(format!(
                "string serializer got {:?}",
                other
            ))),
        }
    }

    fn try_unmarshal(
        &self,
        _ser: &JsonSerializer,
        _state: &mut SerializerState,
        _ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<ObjectMatch> {
        match json {
            Value::String(_) => Ok(ObjectMatch::OKAY),
            _ => Ok(ObjectMatch::SIMILAR),
        }
    }

    fn unmarshal(
        &self,
        _ser: &JsonSerializer,
        _state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<HostValue> {
        let text = match json {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => return Err(UnmarshalError::wrong_kind("string", other)),
        };
        match ty {
            TypeDesc::Char => text
                .chars()
                .next()
                .map(HostValue::Char)
                .ok_or_else(|| UnmarshalError::custom("cannot convert empty string to char")),
            _ => Ok(HostValue::String(text)),
        }
    }
}
