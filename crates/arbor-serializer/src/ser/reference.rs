use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{MarshalError, MarshalResult, UnmarshalError, UnmarshalResult};
use crate::object_match::ObjectMatch;
use crate::ser::{JsonSerializer, Serializer};
use crate::state::SerializerState;
use crate::types::{JsonKind, SourceKind, TypeDesc};
use crate::value::HostValue;
use crate::{JAVA_CLASS_FIELD, JSON_RPC_TYPE_FIELD, OBJECT_ID_FIELD};

/// Wire discriminator for a plain reference handle.
pub const REFERENCE_TYPE: &str = "Reference";
/// Wire discriminator for a callable reference handle.
pub const CALLABLE_REFERENCE_TYPE: &str = "CallableReference";

/// The bridge-side registries the reference serializer works against.
///
/// The serializer crate only needs this seam: which classes are handled by
/// reference, where instances get parked, and how an incoming `objectID`
/// resolves back to a live value.
pub trait ReferenceBroker: Send + Sync {
    fn is_reference(&self, class_name: &str) -> bool;

    fn is_callable_reference(&self, class_name: &str) -> bool;

    /// Parks the instance and returns its object id.
    fn add_reference(&self, value: &HostValue) -> MarshalResult<u64>;

    /// Parks the instance and additionally exposes it for `.obj[id]`
    /// method dispatch. Returns the object id.
    fn register_callable(&self, value: &HostValue) -> MarshalResult<u64>;

    /// Resolves an incoming object id to the parked value.
    fn reference_for(&self, object_id: u64) -> Option<HostValue>;
}

/// Serializes instances of classes registered on the bridge as references
/// or callable references. Must be registered ahead of the bean serializer
/// so reference classes become handles instead of property-extracted
/// beans.
pub struct ReferenceSerializer {
    broker: Arc<dyn ReferenceBroker>,
}

impl ReferenceSerializer {
    pub fn new(broker: Arc<dyn ReferenceBroker>) -> Self {
        Self { broker }
    }
}

impl Serializer for ReferenceSerializer {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn source_kinds(&self) -> &'static [SourceKind] {
        &[SourceKind::Reference]
    }

    fn json_kinds(&self) -> &'static [JsonKind] {
        &[JsonKind::Object]
    }

    fn can_marshal(&self, value: &HostValue) -> bool {
        match value.class_name() {
            Some(class) => {
                self.broker.is_reference(class) || self.broker.is_callable_reference(class)
            }
            None => false,
        }
    }

    fn marshal(
        &self,
        _ser: &JsonSerializer,
        _state: &mut SerializerState,
        value: &HostValue,
    ) -> MarshalResult<Value> {
        let class = value
            .class_name()
            .ok_or_else(|| MarshalError::custom("reference value has no class"))?
            .to_string();

        let (object_id, rpc_type) = if self.broker.is_callable_reference(&class) {
            let id = self.broker.register_callable(value)?;
            debug!(class, object_id = id, "marshalling callable reference");
            (id, CALLABLE_REFERENCE_TYPE)
        } else if self.broker.is_reference(&class) {
            let id = self.broker.add_reference(value)?;
            debug!(class, object_id = id, "marshalling reference");
            (id, REFERENCE_TYPE)
        } else {
            return Err(MarshalError::custom(format!(
                "{} is not a registered reference class",
                class
            )));
        };

        let mut obj = serde_json::Map::new();
        obj.insert(
            JSON_RPC_TYPE_FIELD.to_string(),
            Value::String(rpc_type.to_string()),
        );
        obj.insert(JAVA_CLASS_FIELD.to_string(), Value::String(class));
        obj.insert(OBJECT_ID_FIELD.to_string(), Value::from(object_id));
        Ok(Value::Object(obj))
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
        let obj = json
            .as_object()
            .ok_or_else(|| UnmarshalError::wrong_kind("reference object", json))?;
        let rpc_type = obj
            .get(JSON_RPC_TYPE_FIELD)
            .and_then(Value::as_str)
            .ok_or(UnmarshalError::MissingField(JSON_RPC_TYPE_FIELD))?;
        let object_id = obj
            .get(OBJECT_ID_FIELD)
            .and_then(Value::as_u64)
            .ok_or(UnmarshalError::MissingField(OBJECT_ID_FIELD))?;

        match rpc_type {
            REFERENCE_TYPE | CALLABLE_REFERENCE_TYPE => {}
            other => {
                return Err(UnmarshalError::custom(format!(
                    "unknown reference type {}",
                    other
                )))
            }
        }

        match self.broker.reference_for(object_id) {
            Some(value) => Ok(value),
            None => {
                warn!(object_id, "reference not found, substituting null");
                Ok(HostValue::Null)
            }
        }
    }
}
