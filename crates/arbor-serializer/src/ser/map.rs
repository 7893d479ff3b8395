use arbor_json_rpc::PathComponent;
use serde_json::Value;

use crate::classes::MAP_CLASSES;
use crate::error::{MarshalError, MarshalResult, UnmarshalError, UnmarshalResult};
use crate::object_match::ObjectMatch;
use crate::ser::{JsonSerializer, Serializer};
use crate::state::SerializerState;
use crate::types::{JsonKind, SourceKind, TypeDesc};
use crate::value::{HostValue, MapValue};
use crate::{JAVA_CLASS_FIELD, MAP_FIELD};

/// Serializes string-keyed maps as `{javaClass, "map": {…}}`. The accepted
/// wire class names include the legacy dictionary types.
pub struct MapSerializer;

impl Serializer for MapSerializer {
    fn name(&self) -> &'static str {
        "map"
    }

    fn source_kinds(&self) -> &'static [SourceKind] {
        &[SourceKind::Map]
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
        let map = match value {
            HostValue::Map(map) => map,
            other => {
                return Err(MarshalError::custom(format!(
                    "map serializer got {:?}",
                    other
                )))
            }
        };
        let mut obj = serde_json::Map::new();
        ser.marshal_hints(&mut obj, value);

        state.push_component(PathComponent::Field(MAP_FIELD.to_string()));
        let payload = (|| {
            let mut out = serde_json::Map::new();
            for (key, entry) in map.entries() {
                let json = ser
                    .marshal_value(state, &entry, PathComponent::BucketKey(key.clone()))
                    .map_err(|e| MarshalError::key(key.clone(), e))?;
                out.insert(key, json);
            }
            Ok(Value::Object(out))
        })();
        state.pop_component();

        obj.insert(MAP_FIELD.to_string(), payload?);
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
        state.push_component(PathComponent::Field(MAP_FIELD.to_string()));
        let result = (|| {
            let mut aggregate = ObjectMatch::OKAY;
            for (key, entry) in payload {
                let score = ser
                    .try_unmarshal_value(
                        state,
                        &TypeDesc::Any,
                        entry,
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
        let map = MapValue::new(class, Vec::new());
        let value = HostValue::Map(map.clone());
        state.record_constructed(&value);

        state.push_component(PathComponent::Field(MAP_FIELD.to_string()));
        let result = (|| {
            for (key, entry) in payload {
                let entry = ser
                    .unmarshal_value(
                        state,
                        &TypeDesc::Any,
                        entry,
                        PathComponent::BucketKey(key.clone()),
                    )
                    .map_err(|e| UnmarshalError::key(key.clone(), e))?;
                map.insert(key.clone(), entry);
            }
            Ok(())
        })();
        state.pop_component();
        result?;
        Ok(value)
    }
}

fn read_wrapper(json: &Value) -> UnmarshalResult<(&str, &serde_json::Map<String, Value>)> {
    let obj = json
        .as_object()
        .ok_or_else(|| UnmarshalError::wrong_kind("map object", json))?;
    let class = obj
        .get(JAVA_CLASS_FIELD)
        .and_then(Value::as_str)
        .ok_or(UnmarshalError::NoTypeHint)?;
    if !MAP_CLASSES.contains(&class) {
        return Err(UnmarshalError::custom("not a Map"));
    }
    let payload = obj
        .get(MAP_FIELD)
        .and_then(Value::as_object)
        .ok_or(UnmarshalError::MissingField(MAP_FIELD))?;
    Ok((class, payload))
}
