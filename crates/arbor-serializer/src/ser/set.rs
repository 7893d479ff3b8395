use arbor_json_rpc::PathComponent;
use serde_json::Value;

use crate::classes::SET_CLASSES;
use crate::error::{MarshalError, MarshalResult, UnmarshalError, UnmarshalResult};
use crate::object_match::ObjectMatch;
use crate::ser::{JsonSerializer, Serializer};
use crate::state::SerializerState;
use crate::types::{JsonKind, SourceKind, TypeDesc};
use crate::value::{HostValue, SetValue};
use crate::{JAVA_CLASS_FIELD, SET_FIELD};

/// Serializes sets as `{javaClass, "set": {<text of element>: element}}`.
/// Elements without a natural text form key by their position.
pub struct SetSerializer;

impl Serializer for SetSerializer {
    fn name(&self) -> &'static str {
        "set"
    }

    fn source_kinds(&self) -> &'static [SourceKind] {
        &[SourceKind::Set]
    }

    fn json_kinds(&self) -> &'static [JsonKind] {
        &[JsonKind::Object]
    }

    fn marshal(
        &self,
        ser: &JsonSerializer,
        state: &mut SerializerState,
        value: &HostValue,
    ) -> MarshalResult<Value> {
        let set = match value {
            HostValue::Set(set) => set,
            other => {
                return Err(MarshalError::custom(format!(
                    "set serializer got {:?}",
                    other
                )))
            }
        };
        let mut obj = serde_json::Map::new();
        ser.marshal_hints(&mut obj, value);

        state.push_component(PathComponent::Field(SET_FIELD.to_string()));
        let payload = (|| {
            let mut out = serde_json::Map::new();
            for (index, element) in set.elements().iter().enumerate() {
                if element.is_null() {
                    continue;
                }
                let key = element_key(element, index);
                let json = ser
                    .marshal_value(state, element, PathComponent::BucketKey(key.clone()))
                    .map_err(|e| MarshalError::key(key.clone(), e))?;
                out.insert(key, json);
            }
            Ok(Value::Object(out))
        })();
        state.pop_component();

        obj.insert(SET_FIELD.to_string(), payload?);
        Ok(Value::Object(obj))
    }

    fn try_unmarshal(
        &self,
        ser: &JsonSerializer,
        state: &mut SerializerState,
        _ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<ObjectMatch> {
        let (_, payload) = read_wrapper(json)?;
        state.push_component(PathComponent::Field(SET_FIELD.to_string()));
        let result = (|| {
            let mut aggregate = ObjectMatch::OKAY;
            for (key, element) in payload {
                let score = ser
                    .try_unmarshal_value(
                        state,
                        &TypeDesc::Any,
                        element,
                        PathComponent::BucketKey(key.clone()),
                    )
                    .map_err(|e| UnmarshalError::key(key.clone(), e))?;
                aggregate = aggregate.max(score);
            }
            Ok(aggregate)
        })();
        state.pop_component();
        result
    }

    fn unmarshal(
        &self,
        ser: &JsonSerializer,
        state: &mut SerializerState,
        _ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<HostValue> {
        let (class, payload) = read_wrapper(json)?;
        let set = SetValue::new(class, Vec::new());
        let value = HostValue::Set(set.clone());
        state.record_constructed(&value);

        state.push_component(PathComponent::Field(SET_FIELD.to_string()));
        let result = (|| {
            for (key, element) in payload {
                let element = ser
                    .unmarshal_value(
                        state,
                        &TypeDesc::Any,
                        element,
                        PathComponent::BucketKey(key.clone()),
                    )
                    .map_err(|e| UnmarshalError::key(key.clone(), e))?;
                set.push(element);
            }
            Ok(())
        })();
        state.pop_component();
        result?;
        Ok(value)
    }
}

/// The wire key for a set element: its textual form for scalar-ish values,
/// otherwise the position.
fn element_key(element: &HostValue, index: usize) -> String {
    match element {
        HostValue::Bool(b) => b.to_string(),
        HostValue::I8(n) => n.to_string(),
        HostValue::I16(n) => n.to_string(),
        HostValue::I32(n) => n.to_string(),
        HostValue::I64(n) => n.to_string(),
        HostValue::F32(n) => n.to_string(),
        HostValue::F64(n) => n.to_string(),
        HostValue::Char(c) => c.to_string(),
        HostValue::String(s) => s.clone(),
        HostValue::Enum(e) => e.constant.clone(),
        _ => index.to_string(),
    }
}

fn read_wrapper(json: &Value) -> UnmarshalResult<(&str, &serde_json::Map<String, Value>)> {
    let obj = json
        .as_object()
        .ok_or_else(|| UnmarshalError::wrong_kind("set object", json))?;
    let class = obj
        .get(JAVA_CLASS_FIELD)
        .and_then(Value::as_str)
        .ok_or(UnmarshalError::NoTypeHint)?;
    if !SET_CLASSES.contains(&class) {
        return Err(UnmarshalError::custom("not a Set"));
    }
    let payload = obj
        .get(SET_FIELD)
        .and_then(Value::as_object)
        .ok_or(UnmarshalError::MissingField(SET_FIELD))?;
    Ok((class, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ClassRegistry;
    use crate::resolver::ClassResolver;
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
    fn elements_key_by_text() {
        let ser = facade();
        let mut state = ser.create_state();
        let value = HostValue::set(vec![HostValue::from("a"), HostValue::from(2)]);
        let json = ser.marshal_value(&mut state, &value, root()).unwrap();
        assert_eq!(
            json,
            json!({"javaClass": "java.util.HashSet", "set": {"a": "a", "2": 2}})
        );
    }

    #[test]
    fn roundtrip_restores_elements() {
        let ser = facade();
        let mut state = ser.create_state();
        let json = json!({"javaClass": "java.util.HashSet", "set": {"a": "a", "b": "b"}});
        let value = ser
            .unmarshal_value(
                &mut state,
                &TypeDesc::Set("java.util.HashSet".to_string()),
                &json,
                root(),
            )
            .unwrap();
        match value {
            HostValue::Set(set) => assert_eq!(set.len(), 2),
            other => panic!("expected set, got {:?}", other),
        }
    }

    #[test]
    fn wrong_hint_is_rejected() {
        let ser = facade();
        let mut state = ser.create_state();
        let json = json!({"javaClass": "java.util.ArrayList", "set": {}});
        assert!(ser
            .unmarshal_value(
                &mut state,
                &TypeDesc::Set("java.util.HashSet".to_string()),
                &json,
                root(),
            )
            .is_err());
    }
}
