use arbor_json_rpc::PathComponent;
use serde_json::Value;

use crate::classes::LIST_CLASSES;
use crate::error::{MarshalError, MarshalResult, UnmarshalError, UnmarshalResult};
use crate::object_match::ObjectMatch;
use crate::ser::{JsonSerializer, Serializer};
use crate::state::SerializerState;
use crate::types::{JsonKind, SourceKind, TypeDesc};
use crate::value::{HostValue, ListValue};
use crate::{JAVA_CLASS_FIELD, LIST_FIELD};

/// Serializes lists as `{javaClass, "list": […]}`. The payload location is
/// pushed under the `"list"` key so nested fixup paths route through the
/// wrapper.
pub struct ListSerializer;

impl Serializer for ListSerializer {
    fn name(&self) -> &'static str {
        "list"
    }

    fn source_kinds(&self) -> &'static [SourceKind] {
        &[SourceKind::List]
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
        let list = match value {
            HostValue::List(list) => list,
            other => {
                return Err(MarshalError::custom(format!(
                    "list serializer got {:?}",
                    other
                )))
            }
        };
        let mut obj = serde_json::Map::new();
        ser.marshal_hints(&mut obj, value);

        state.push_component(PathComponent::Field(LIST_FIELD.to_string()));
        let payload = (|| {
            let elements = list.elements();
            let mut out = Vec::with_capacity(elements.len());
            for (index, element) in elements.iter().enumerate() {
                let json = ser
                    .marshal_value(state, element, PathComponent::Index(index))
                    .map_err(|e| MarshalError::element(index, e))?;
                out.push(json);
            }
            Ok(Value::Array(out))
        })();
        state.pop_component();

        obj.insert(LIST_FIELD.to_string(), payload?);
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
        state.push_component(PathComponent::Field(LIST_FIELD.to_string()));
        let result = (|| {
            let mut aggregate = ObjectMatch::OKAY;
            for (index, element) in payload.iter().enumerate() {
                let score = ser
                    .try_unmarshal_value(state, &TypeDesc::Any, element, PathComponent::Index(index))
                    .map_err(|e| UnmarshalError::element(index, e))?;
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
        let list = ListValue::new(class, Vec::new());
        let value = HostValue::List(list.clone());
        state.record_constructed(&value);

        state.push_component(PathComponent::Field(LIST_FIELD.to_string()));
        let result = (|| {
            for (index, element) in payload.iter().enumerate() {
                let element = ser
                    .unmarshal_value(state, &TypeDesc::Any, element, PathComponent::Index(index))
                    .map_err(|e| UnmarshalError::element(index, e))?;
                list.push(element);
            }
            Ok(())
        })();
        state.pop_component();
        result?;
        Ok(value)
    }
}

fn read_wrapper(json: &Value) -> UnmarshalResult<(&str, &Vec<Value>)> {
    let obj = json
        .as_object()
        .ok_or_else(|| UnmarshalError::wrong_kind("list object", json))?;
    let class = obj
        .get(JAVA_CLASS_FIELD)
        .and_then(Value::as_str)
        .ok_or(UnmarshalError::NoTypeHint)?;
    if !LIST_CLASSES.contains(&class) {
        return Err(UnmarshalError::custom("not a List"));
    }
    let payload = obj
        .get(LIST_FIELD)
        .and_then(Value::as_array)
        .ok_or(UnmarshalError::MissingField(LIST_FIELD))?;
    Ok((class, payload))
}
