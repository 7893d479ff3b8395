use arbor_json_rpc::PathComponent;
use serde_json::Value;

use crate::error::{MarshalError, MarshalResult, UnmarshalError, UnmarshalResult};
use crate::object_match::ObjectMatch;
use crate::ser::{JsonSerializer, Serializer};
use crate::state::SerializerState;
use crate::types::{JsonKind, SourceKind, TypeDesc};
use crate::value::{HostValue, RawValue};

/// Serializes already-JSON object subtrees. Marshalling re-enters the
/// engine for every child so flat-mode hoisting and graph tracking see the
/// whole subtree instead of an opaque blob.
pub struct RawObjectSerializer;

impl Serializer for RawObjectSerializer {
    fn name(&self) -> &'static str {
        "raw-object"
    }

    fn source_kinds(&self) -> &'static [SourceKind] {
        &[SourceKind::Raw]
    }

    fn json_kinds(&self) -> &'static [JsonKind] {
        &[JsonKind::Object]
    }

    fn can_marshal(&self, value: &HostValue) -> bool {
        matches!(value, HostValue::Raw(raw) if raw.json().is_object())
    }

    fn marshal(
        &self,
        ser: &JsonSerializer,
        state: &mut SerializerState,
        value: &HostValue,
    ) -> MarshalResult<Value> {
        let raw = expect_raw(value)?;
        let obj = raw
            .json()
            .as_object()
            .ok_or_else(|| MarshalError::custom("raw object serializer got a non-object"))?;
        let mut out = serde_json::Map::new();
        for (key, child) in obj {
            let json =
                marshal_raw_child(ser, state, child, PathComponent::Field(key.clone()))
                    .map_err(|e| MarshalError::key(key.clone(), e))?;
            out.insert(key.clone(), json);
        }
        Ok(Value::Object(out))
    }

    fn try_unmarshal(
        &self,
        _ser: &JsonSerializer,
        _state: &mut SerializerState,
        _ty: &TypeDesc,
        _json: &Value,
    ) -> UnmarshalResult<ObjectMatch> {
        Ok(ObjectMatch::OKAY)
    }

    fn unmarshal(
        &self,
        _ser: &JsonSerializer,
        _state: &mut SerializerState,
        _ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<HostValue> {
        Ok(HostValue::raw(json.clone()))
    }
}

/// Serializes already-JSON array subtrees; same re-entrant walk as
/// [`RawObjectSerializer`].
pub struct RawArraySerializer;

impl Serializer for RawArraySerializer {
    fn name(&self) -> &'static str {
        "raw-array"
    }

    fn source_kinds(&self) -> &'static [SourceKind] {
        &[SourceKind::Raw]
    }

    fn json_kinds(&self) -> &'static [JsonKind] {
        &[JsonKind::Array]
    }

    fn can_marshal(&self, value: &HostValue) -> bool {
        matches!(value, HostValue::Raw(raw) if raw.json().is_array())
    }

    fn marshal(
        &self,
        ser: &JsonSerializer,
        state: &mut SerializerState,
        value: &HostValue,
    ) -> MarshalResult<Value> {
        let raw = expect_raw(value)?;
        let arr = raw
            .json()
            .as_array()
            .ok_or_else(|| MarshalError::custom("raw array serializer got a non-array"))?;
        let mut out = Vec::with_capacity(arr.len());
        for (index, child) in arr.iter().enumerate() {
            let json = marshal_raw_child(ser, state, child, PathComponent::Index(index))
                .map_err(|e| MarshalError::element(index, e))?;
            out.push(json);
        }
        Ok(Value::Array(out))
    }

    fn try_unmarshal(
        &self,
        _ser: &JsonSerializer,
        _state: &mut SerializerState,
        _ty: &TypeDesc,
        _json: &Value,
    ) -> UnmarshalResult<ObjectMatch> {
        Ok(ObjectMatch::OKAY)
    }

    fn unmarshal(
        &self,
        _ser: &JsonSerializer,
        _state: &mut SerializerState,
        _ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<HostValue> {
        Ok(HostValue::raw(json.clone()))
    }
}

fn expect_raw(value: &HostValue) -> MarshalResult<&RawValue> {
    match value {
        HostValue::Raw(raw) => Ok(raw),
        other => Err(MarshalError::custom(format!(
            "raw serializer got {:?}",
            other
        ))),
    }
}

/// Scalar children pass through unchanged; composite children re-enter the
/// engine as fresh raw values so every nested object is visited.
fn marshal_raw_child(
    ser: &JsonSerializer,
    state: &mut SerializerState,
    child: &Value,
    component: PathComponent,
) -> MarshalResult<Value> {
    match child {
        Value::Object(_) | Value::Array(_) => {
            let wrapped = HostValue::raw(child.clone());
            ser.marshal_value(state, &wrapped, component)
        }
        scalar => Ok(scalar.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ClassRegistry;
    use crate::resolver::ClassResolver;
    use crate::state::OutputMode;
    use serde_json::json;
    use std::sync::Arc;

    fn facade() -> JsonSerializer {
        let registry = Arc::new(ClassRegistry::new());
        let resolver = Arc::new(ClassResolver::with_defaults(registry.clone()));
        JsonSerializer::with_defaults(registry, resolver)
    }

    fn root() -> PathComponent {
        PathComponent::Field("result".to_string())
    }

    #[test]
    fn raw_tree_passes_through_in_fixup_mode() {
        let ser = facade();
        let mut state = ser.create_state();
        let tree = json!({"a": {"b": [1, 2]}, "c": "x"});
        let value = HostValue::raw(tree.clone());
        let out = ser.marshal_value(&mut state, &value, root()).unwrap();
        assert_eq!(out, tree);
        assert!(state.fixups().is_empty());
    }

    #[test]
    fn flat_mode_hoists_nested_raw_objects() {
        let registry = Arc::new(ClassRegistry::new());
        let resolver = Arc::new(ClassResolver::with_defaults(registry.clone()));
        let mut ser = JsonSerializer::with_defaults(registry, resolver);
        ser.set_output_mode(OutputMode::Flat);

        let mut state = ser.create_state();
        let value = HostValue::raw(json!({"foo": {"bar": 1}}));
        let token = ser.marshal_value(&mut state, &value, root()).unwrap();
        assert_eq!(token, json!("_1"));

        let result = state.into_result(None, token);
        let output = result.to_value(None);
        assert_eq!(output["_1"], json!({"foo": "_2"}));
        assert_eq!(output["_2"], json!({"bar": 1}));
    }

    #[test]
    fn untyped_object_without_hint_unmarshals_raw() {
        let ser = facade();
        let mut state = ser.create_state();
        let value = ser
            .unmarshal_value(&mut state, &TypeDesc::Any, &json!({"k": 1}), root())
            .unwrap();
        assert!(matches!(value, HostValue::Raw(_)));
    }
}
