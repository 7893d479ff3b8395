use serde_json::Value;

use crate::error::{MarshalResult, UnmarshalError, UnmarshalResult};
use crate::object_match::ObjectMatch;
use crate::ser::{JsonSerializer, Serializer};
use crate::state::SerializerState;
use crate::types::{JsonKind, SourceKind, TypeDesc};
use crate::value::HostValue;

/// Serializes boolean values. String input is accepted; only the exact
/// `true`/`false` spellings rate an exact match.
pub struct BooleanSerializer;

impl Serializer for BooleanSerializer {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn source_kinds(&self) -> &'static [SourceKind] {
        &[SourceKind::Bool]
    }

    fn json_kinds(&self) -> &'static [JsonKind] {
        &[JsonKind::Bool, JsonKind::String]
    }

    fn marshal(
        &self,
        _ser: &JsonSerializer,
        _state: &mut SerializerState,
        value: &HostValue,
    ) -> MarshalResult<Value> {
        match value {
            HostValue::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(crate::error::MarshalError::custom(format!(
                "boolean serializer got {:?}",
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
        if !matches!(ty, TypeDesc::Bool | TypeDesc::Any) {
            return Err(UnmarshalError::wrong_kind("boolean", json));
        }
        match json {
            Value::Bool(_) => Ok(ObjectMatch::OKAY),
            Value::String(s) if s == "true" || s == "false" => Ok(ObjectMatch::OKAY),
            Value::String(_) => Ok(ObjectMatch::ROUGHLY_SIMILAR),
            _ => Ok(ObjectMatch::ROUGHLY_SIMILAR),
        }
    }

    fn unmarshal(
        &self,
        _ser: &JsonSerializer,
        _state: &mut SerializerState,
        _ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<HostValue> {
        match json {
            Value::Bool(b) => Ok(HostValue::Bool(*b)),
            Value::String(s) => Ok(HostValue::Bool(s.eq_ignore_ascii_case("true"))),
            other => Err(UnmarshalError::wrong_kind("boolean", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ClassRegistry;
    use crate::resolver::ClassResolver;
    use arbor_json_rpc::PathComponent;
    use serde_json::json;
    use std::sync::Arc;

    fn facade() -> JsonSerializer {
        let registry = Arc::new(ClassRegistry::new());
        let resolver = Arc::new(ClassResolver::with_defaults(registry.clone()));
        JsonSerializer::with_defaults(registry, resolver)
    }

    #[test]
    fn exact_strings_rate_okay() {
        let ser = facade();
        let mut state = ser.create_state();
        let exact = ser
            .try_unmarshal_value(&mut state, &TypeDesc::Bool, &json!("true"), PathComponent::Index(0))
            .unwrap();
        assert_eq!(exact, ObjectMatch::OKAY);

        let vague = ser
            .try_unmarshal_value(&mut state, &TypeDesc::Bool, &json!("yes"), PathComponent::Index(0))
            .unwrap();
        assert_eq!(vague, ObjectMatch::ROUGHLY_SIMILAR);
    }

    #[test]
    fn string_unmarshal_is_case_insensitive() {
        let ser = facade();
        let mut state = ser.create_state();
        let value = ser
            .unmarshal_value(&mut state, &TypeDesc::Bool, &json!("TRUE"), PathComponent::Index(0))
            .unwrap();
        assert_eq!(value.as_bool(), Some(true));

        let mut state = ser.create_state();
        let value = ser
            .unmarshal_value(&mut state, &TypeDesc::Bool, &json!("nope"), PathComponent::Index(0))
            .unwrap();
        assert_eq!(value.as_bool(), Some(false));
    }
}
