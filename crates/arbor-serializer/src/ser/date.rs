use serde_json::Value;

use crate::error::{MarshalError, MarshalResult, UnmarshalError, UnmarshalResult};
use crate::object_match::ObjectMatch;
use crate::ser::{JsonSerializer, Serializer};
use crate::state::SerializerState;
use crate::types::{DateKind, JsonKind, SourceKind, TypeDesc};
use crate::value::{DateValue, HostValue};
use crate::{JAVA_CLASS_FIELD, TIME_FIELD};

/// Serializes temporal values as `{javaClass, time: epoch-millis}`.
/// Unmarshalling dispatches on the hint to the specific temporal kind and
/// falls back to the declared kind when the hint is absent.
pub struct DateSerializer;

impl Serializer for DateSerializer {
    fn name(&self) -> &'static str {
        "date"
    }

    fn source_kinds(&self) -> &'static [SourceKind] {
        &[SourceKind::Date]
    }

    fn json_kinds(&self) -> &'static [JsonKind] {
        &[JsonKind::Object]
    }

    fn marshal(
        &self,
        ser: &JsonSerializer,
        _state: &mut SerializerState,
        value: &HostValue,
    ) -> MarshalResult<Value> {
        let date = match value {
            HostValue::Date(date) => date,
            other => {
                return Err(MarshalError::custom(format!(
                    "cannot marshal date from {:?}",
                    other
                )))
            }
        };
        let mut obj = serde_json::Map::new();
        ser.marshal_hints(&mut obj, value);
        obj.insert(TIME_FIELD.to_string(), Value::from(date.millis));
        Ok(Value::Object(obj))
    }

    fn try_unmarshal(
        &self,
        _ser: &JsonSerializer,
        _state: &mut SerializerState,
        _ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<ObjectMatch> {
        let obj = json
            .as_object()
            .ok_or_else(|| UnmarshalError::wrong_kind("date object", json))?;
        match obj.get(JAVA_CLASS_FIELD) {
            None => Err(UnmarshalError::NoTypeHint),
            Some(Value::String(name)) if DateKind::from_wire_class(name).is_some() => {
                Ok(ObjectMatch::OKAY)
            }
            Some(_) => Err(UnmarshalError::custom("not a Date")),
        }
    }

    fn unmarshal(
        &self,
        _ser: &JsonSerializer,
        _state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<HostValue> {
        let obj = json
            .as_object()
            .ok_or_else(|| UnmarshalError::wrong_kind("date object", json))?;
        let millis = obj
            .get(TIME_FIELD)
            .and_then(Value::as_i64)
            .ok_or(UnmarshalError::MissingField(TIME_FIELD))?;

        let kind = match obj.get(JAVA_CLASS_FIELD) {
            Some(Value::String(name)) => DateKind::from_wire_class(name)
                .ok_or_else(|| UnmarshalError::custom(format!("invalid class {}", name)))?,
            _ => match ty {
                TypeDesc::Date(kind) => *kind,
                _ => DateKind::DateTime,
            },
        };
        Ok(HostValue::Date(DateValue::new(kind, millis)))
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

    fn root() -> PathComponent {
        PathComponent::Field("result".to_string())
    }

    #[test]
    fn marshals_with_hint_and_millis() {
        let ser = facade();
        let mut state = ser.create_state();
        let value = HostValue::Date(DateValue::new(DateKind::DateTime, 1_700_000_000_000));
        let json = ser.marshal_value(&mut state, &value, root()).unwrap();
        assert_eq!(
            json,
            json!({"javaClass": "java.util.Date", "time": 1_700_000_000_000i64})
        );
    }

    #[test]
    fn hint_dispatches_to_timestamp() {
        let ser = facade();
        let mut state = ser.create_state();
        let json = json!({"javaClass": "java.sql.Timestamp", "time": 99});
        let value = ser
            .unmarshal_value(
                &mut state,
                &TypeDesc::Date(DateKind::DateTime),
                &json,
                root(),
            )
            .unwrap();
        match value {
            HostValue::Date(date) => {
                assert_eq!(date.kind, DateKind::Timestamp);
                assert_eq!(date.millis, 99);
            }
            other => panic!("expected date, got {:?}", other),
        }
    }

    #[test]
    fn absent_hint_falls_back_to_declared_kind() {
        let ser = facade();
        let mut state = ser.create_state();
        let json = json!({"time": 5});
        let value = ser
            .unmarshal_value(&mut state, &TypeDesc::Date(DateKind::Time), &json, root())
            .unwrap();
        match value {
            HostValue::Date(date) => assert_eq!(date.kind, DateKind::Time),
            other => panic!("expected date, got {:?}", other),
        }
    }

    #[test]
    fn missing_time_field_fails() {
        let ser = facade();
        let mut state = ser.create_state();
        let json = json!({"javaClass": "java.util.Date"});
        assert!(ser
            .unmarshal_value(&mut state, &TypeDesc::Date(DateKind::DateTime), &json, root())
            .is_err());
    }
}
