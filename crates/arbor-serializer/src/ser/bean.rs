use arbor_json_rpc::PathComponent;
use serde_json::Value;

use crate::error::{MarshalError, MarshalResult, UnmarshalError, UnmarshalResult};
use crate::object_match::ObjectMatch;
use crate::ser::{JsonSerializer, Serializer};
use crate::state::SerializerState;
use crate::types::{JsonKind, SourceKind, TypeDesc};
use crate::value::HostValue;

/// Serializes registered bean classes property by property. Marshalling
/// walks the readable properties; unmarshalling instantiates through the
/// registered constructor and applies every writable property present in
/// the JSON.
pub struct BeanSerializer;

impl Serializer for BeanSerializer {
    fn name(&self) -> &'static str {
        "bean"
    }

    fn source_kinds(&self) -> &'static [SourceKind] {
        &[SourceKind::Bean]
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
        let bean = match value {
            HostValue::Bean(bean) => bean,
            other => {
                return Err(MarshalError::custom(format!(
                    "bean serializer got {:?}",
                    other
                )))
            }
        };
        let class = bean.class.clone();
        let mut obj = serde_json::Map::new();
        ser.marshal_hints(&mut obj, value);

        for property in class.properties() {
            if !property.is_readable() {
                continue;
            }
            let read = {
                let guard = bean.read_erased();
                property.read(guard.as_ref())
            }
            .map_err(|e| MarshalError::property(class.name(), property.name(), e))?;

            if read.is_null() && !ser.marshal_null_attributes() {
                continue;
            }
            let json = ser
                .marshal_value(
                    state,
                    &read,
                    PathComponent::Field(property.name().to_string()),
                )
                .map_err(|e| MarshalError::property(class.name(), property.name(), e))?;
            obj.insert(property.name().to_string(), json);
        }
        Ok(Value::Object(obj))
    }

    fn try_unmarshal(
        &self,
        ser: &JsonSerializer,
        state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<ObjectMatch> {
        let class = bean_class(ser, ty)?;
        let obj = json
            .as_object()
            .ok_or_else(|| UnmarshalError::wrong_kind("bean object", json))?;

        let mut matches = 0u32;
        let mut mismatches = 0u32;
        for property in class.properties() {
            if !property.is_writable() {
                continue;
            }
            if obj.contains_key(property.name()) {
                matches += 1;
            } else {
                mismatches += 1;
            }
        }
        if matches == 0 {
            return Err(UnmarshalError::NoPropertyMatches(class.name().to_string()));
        }

        let mut aggregate: Option<ObjectMatch> = None;
        for (field, field_json) in obj {
            if field == crate::JAVA_CLASS_FIELD {
                continue;
            }
            match class.property(field).filter(|p| p.is_writable()) {
                Some(property) => {
                    let score = ser
                        .try_unmarshal_value(
                            state,
                            property.ty(),
                            field_json,
                            PathComponent::Field(field.clone()),
                        )
                        .map_err(|e| UnmarshalError::property(class.name(), field, e))?;
                    aggregate = Some(match aggregate {
                        None => score,
                        Some(prior) => prior.max(score),
                    });
                }
                None => mismatches += 1,
            }
        }
        let base = ObjectMatch::new(mismatches);
        Ok(match aggregate {
            Some(children) => children.max(base),
            None => base,
        })
    }

    fn unmarshal(
        &self,
        ser: &JsonSerializer,
        state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<HostValue> {
        let class = bean_class(ser, ty)?;
        let obj = json
            .as_object()
            .ok_or_else(|| UnmarshalError::wrong_kind("bean object", json))?;

        let bean = class.instantiate()?;
        let value = HostValue::Bean(bean.clone());
        // the shell goes into the state before the properties so cyclic
        // graphs can point back at it
        state.record_constructed(&value);

        for (field, field_json) in obj {
            let Some(property) = class.property(field).filter(|p| p.is_writable()) else {
                continue;
            };
            let field_value = ser
                .unmarshal_value(
                    state,
                    property.ty(),
                    field_json,
                    PathComponent::Field(field.clone()),
                )
                .map_err(|e| UnmarshalError::property(class.name(), field, e))?;
            {
                let mut guard = bean.write_erased();
                property
                    .write(guard.as_mut(), field_value)
                    .map_err(|e| UnmarshalError::property(class.name(), field, e))?;
            }
        }
        Ok(value)
    }
}

fn bean_class(
    ser: &JsonSerializer,
    ty: &TypeDesc,
) -> UnmarshalResult<std::sync::Arc<crate::classes::BeanClass>> {
    let name = match ty {
        TypeDesc::Bean(name) => name,
        _ => return Err(UnmarshalError::custom("no bean type declared")),
    };
    ser.registry()
        .bean(name)
        .ok_or_else(|| UnmarshalError::ClassNotResolved(name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::{BeanClass, ClassRegistry};
    use crate::resolver::ClassResolver;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Default)]
    struct Point {
        x: i32,
        y: i32,
    }

    fn point_class() -> Arc<BeanClass> {
        BeanClass::builder::<Point>("com.example.Point")
            .constructor(Point::default)
            .safe_for_dispatch(true)
            .property(
                "x",
                TypeDesc::I32,
                |p| HostValue::from(p.x),
                |p, v| {
                    p.x = v.as_i32().ok_or_else(|| UnmarshalError::custom("not an int"))?;
                    Ok(())
                },
            )
            .property(
                "y",
                TypeDesc::I32,
                |p| HostValue::from(p.y),
                |p, v| {
                    p.y = v.as_i32().ok_or_else(|| UnmarshalError::custom("not an int"))?;
                    Ok(())
                },
            )
            .build()
    }

    fn facade() -> JsonSerializer {
        let registry = Arc::new(ClassRegistry::new());
        registry.register_bean(point_class());
        let resolver = Arc::new(ClassResolver::with_defaults(registry.clone()));
        JsonSerializer::with_defaults(registry, resolver)
    }

    fn root() -> PathComponent {
        PathComponent::Field("result".to_string())
    }

    #[test]
    fn bean_roundtrip() {
        let ser = facade();
        let class = ser.registry().bean("com.example.Point").unwrap();
        let bean = HostValue::Bean(crate::value::BeanValue::new(class, Point { x: 3, y: 4 }));

        let mut state = ser.create_state();
        let json = ser.marshal_value(&mut state, &bean, root()).unwrap();
        assert_eq!(json, json!({"javaClass": "com.example.Point", "x": 3, "y": 4}));

        let mut state = ser.create_state();
        let back = ser
            .unmarshal_value(
                &mut state,
                &TypeDesc::Bean("com.example.Point".to_string()),
                &json,
                root(),
            )
            .unwrap();
        let restored = back.as_bean().unwrap();
        assert_eq!(restored.with(|p: &Point| (p.x, p.y)), Some((3, 4)));
    }

    #[test]
    fn hint_alone_is_enough_for_untyped_unmarshal() {
        let ser = facade();
        let mut state = ser.create_state();
        let json = json!({"javaClass": "com.example.Point", "x": 1, "y": 2});
        let value = ser
            .unmarshal_value(&mut state, &TypeDesc::Any, &json, root())
            .unwrap();
        assert!(value.as_bean().is_some());
    }

    #[test]
    fn no_matching_properties_rejects_candidate() {
        let ser = facade();
        let mut state = ser.create_state();
        let err = ser
            .try_unmarshal_value(
                &mut state,
                &TypeDesc::Bean("com.example.Point".to_string()),
                &json!({"a": 1}),
                root(),
            )
            .unwrap_err();
        assert!(matches!(err, UnmarshalError::NoPropertyMatches(_)));
    }

    #[test]
    fn unknown_fields_raise_mismatch_but_do_not_fail() {
        let ser = facade();
        let mut state = ser.create_state();
        let exact = ser
            .try_unmarshal_value(
                &mut state,
                &TypeDesc::Bean("com.example.Point".to_string()),
                &json!({"x": 1, "y": 2}),
                root(),
            )
            .unwrap();
        assert_eq!(exact, ObjectMatch::OKAY);

        let noisy = ser
            .try_unmarshal_value(
                &mut state,
                &TypeDesc::Bean("com.example.Point".to_string()),
                &json!({"x": 1, "y": 2, "extra": true}),
                root(),
            )
            .unwrap();
        assert!(noisy > exact);
    }
}
