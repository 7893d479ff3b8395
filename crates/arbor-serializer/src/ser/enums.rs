use serde_json::Value;

use crate::error::{MarshalError, MarshalResult, UnmarshalError, UnmarshalResult};
use crate::object_match::ObjectMatch;
use crate::ser::{JsonSerializer, Serializer};
use crate::state::SerializerState;
use crate::types::{JsonKind, SourceKind, TypeDesc};
use crate::value::{EnumValue, HostValue};

/// Serializes registered enums as their constant name.
pub struct EnumSerializer;

impl Serializer for EnumSerializer {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn source_kinds(&self) -> &'static [SourceKind] {
        &[SourceKind::Enum]
    }

    fn json_kinds(&self) -> &'static [JsonKind] {
        &[JsonKind::String]
    }

    fn marshal(
        &self,
        _ser: &JsonSerializer,
        _state: &mut SerializerState,
        value: &HostValue,
    ) -> MarshalResult<Value> {
        match value {
            HostValue::Enum(e) => Ok(Value::String(e.constant.clone())),
            other => Err(MarshalError::custom(format!(
                "enum serializer got {:?}",
                other
            ))),
        }
    }

    fn try_unmarshal(
        &self,
        ser: &JsonSerializer,
        _state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<ObjectMatch> {
        let constant = json
            .as_str()
            .ok_or_else(|| UnmarshalError::wrong_kind("enum constant", json))?;
        match ty {
            TypeDesc::Enum(class) => {
                let known = ser
                    .registry()
                    .enum_class(class)
                    .map(|c| c.has_constant(constant))
                    .unwrap_or(false);
                if known {
                    Ok(ObjectMatch::OKAY)
                } else {
                    Ok(ObjectMatch::SIMILAR)
                }
            }
            _ => Ok(ObjectMatch::SIMILAR),
        }
    }

    fn unmarshal(
        &self,
        ser: &JsonSerializer,
        _state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<HostValue> {
        let constant = json
            .as_str()
            .ok_or_else(|| UnmarshalError::wrong_kind("enum constant", json))?;
        let class_name = match ty {
            TypeDesc::Enum(class) => class,
            _ => return Err(UnmarshalError::custom("no enum type declared")),
        };
        let class = ser
            .registry()
            .enum_class(class_name)
            .ok_or_else(|| UnmarshalError::ClassNotResolved(class_name.clone()))?;
        if !class.has_constant(constant) {
            return Err(UnmarshalError::UnknownConstant {
                class: class_name.clone(),
                constant: constant.to_string(),
            });
        }
        Ok(HostValue::Enum(EnumValue::new(class, constant)))
    }
}
