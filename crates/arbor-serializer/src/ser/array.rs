use arbor_json_rpc::PathComponent;
use serde_json::Value;

use crate::error::{MarshalError, MarshalResult, UnmarshalError, UnmarshalResult};
use crate::object_match::ObjectMatch;
use crate::ser::{JsonSerializer, Serializer};
use crate::state::SerializerState;
use crate::types::{JsonKind, SourceKind, TypeDesc};
use crate::value::{ArrayValue, HostValue};

/// Serializes typed arrays as bare JSON arrays (no wrapper, no hint).
/// Every element is coerced against the declared element type.
pub struct ArraySerializer;

impl Serializer for ArraySerializer {
    fn name(&self) -> &'static str {
        "array"
    }

    fn source_kinds(&self) -> &'static [SourceKind] {
        &[SourceKind::Array]
    }

    fn json_kinds(&self) -> &'static [JsonKind] {
        &[JsonKind::Array]
    }

    fn marshal(
        &self,
        ser: &JsonSerializer,
        state: &mut SerializerState,
        value: &HostValue,
    ) -> MarshalResult<Value> {
        let array = match value {
            HostValue::Array(array) => array,
            other => {
                return Err(MarshalError::custom(format!(
                    "array serializer got {:?}",
                    other
                )))
            }
        };
        let elements = array.elements();
        let mut out = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            let json = ser
                .marshal_value(state, element, PathComponent::Index(index))
                .map_err(|e| MarshalError::element(index, e))?;
            out.push(json);
        }
        Ok(Value::Array(out))
    }

    fn try_unmarshal(
        &self,
        ser: &JsonSerializer,
        state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<ObjectMatch> {
        let elements = json
            .as_array()
            .ok_or_else(|| UnmarshalError::wrong_kind("array", json))?;
        let elem_ty = element_type(ty);
        let mut aggregate = ObjectMatch::OKAY;
        for (index, element) in elements.iter().enumerate() {
            let score = ser
                .try_unmarshal_value(state, &elem_ty, element, PathComponent::Index(index))
                .map_err(|e| UnmarshalError::element(index, e))?;
            aggregate = aggregate.max(score);
        }
        Ok(aggregate)
    }

    fn unmarshal(
        &self,
        ser: &JsonSerializer,
        state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<HostValue> {
        let elements = json
            .as_array()
            .ok_or_else(|| UnmarshalError::wrong_kind("array", json))?;
        let elem_ty = element_type(ty);

        // register the shell before the elements so back-references into
        // the array resolve
        let array = ArrayValue::new(elem_ty.clone(), Vec::new());
        let value = HostValue::Array(array.clone());
        state.record_constructed(&value);

        for (index, element) in elements.iter().enumerate() {
            let element = ser
                .unmarshal_value(state, &elem_ty, element, PathComponent::Index(index))
                .map_err(|e| UnmarshalError::element(index, e))?;
            array.push(element);
        }
        Ok(value)
    }
}

fn element_type(ty: &TypeDesc) -> TypeDesc {
    match ty {
        TypeDesc::Array(elem) => (**elem).clone(),
        _ => TypeDesc::Any,
    }
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
    fn int_array_roundtrip() {
        let ser = facade();
        let ty = TypeDesc::Array(Box::new(TypeDesc::I32));
        let mut state = ser.create_state();
        let value = ser
            .unmarshal_value(&mut state, &ty, &json!([1, 2, 3]), root())
            .unwrap();

        let mut state = ser.create_state();
        let json = ser.marshal_value(&mut state, &value, root()).unwrap();
        assert_eq!(json, json!([1, 2, 3]));
    }

    #[test]
    fn element_coercion_failure_names_the_position() {
        let ser = facade();
        let ty = TypeDesc::Array(Box::new(TypeDesc::I32));
        let mut state = ser.create_state();
        let err = ser
            .unmarshal_value(&mut state, &ty, &json!([1, "x", 3]), root())
            .unwrap_err();
        assert!(err.to_string().contains("element 1"));
    }

    #[test]
    fn try_aggregates_worst_element() {
        let ser = facade();
        let ty = TypeDesc::Array(Box::new(TypeDesc::Bool));
        let mut state = ser.create_state();
        let score = ser
            .try_unmarshal_value(&mut state, &ty, &json!([true, "maybe"]), root())
            .unwrap();
        assert_eq!(score, ObjectMatch::ROUGHLY_SIMILAR);
    }
}
