//! The serializer registry: the `Serializer` trait, the ordered default
//! set, and the `JsonSerializer` façade that routes values to them.

use std::sync::Arc;

use arbor_json_rpc::PathComponent;
use serde_json::Value;
use tracing::{debug, warn};

use crate::classes::ClassRegistry;
use crate::error::{MarshalError, MarshalResult, UnmarshalError, UnmarshalResult};
use crate::object_match::ObjectMatch;
use crate::resolver::ClassResolver;
use crate::state::{OutputMode, SerializerState, Visit};
use crate::types::{JsonKind, SourceKind, TypeDesc};
use crate::value::HostValue;
use crate::JAVA_CLASS_FIELD;

pub mod array;
pub mod bean;
pub mod boolean;
pub mod date;
pub mod enums;
pub mod list;
pub mod map;
pub mod number;
pub mod raw;
pub mod reference;
pub mod set;
pub mod string;

pub use reference::{ReferenceBroker, ReferenceSerializer};

/// One entry of the registry. A serializer declares the source-side
/// categories and wire-side kinds it handles; routing is membership in both
/// sets unless the serializer overrides the checks structurally (beans,
/// references).
pub trait Serializer: Send + Sync {
    /// Stable name used for registry ordering and logs.
    fn name(&self) -> &'static str;

    fn source_kinds(&self) -> &'static [SourceKind];

    fn json_kinds(&self) -> &'static [JsonKind];

    fn can_marshal(&self, value: &HostValue) -> bool {
        value
            .source_kind()
            .is_some_and(|kind| self.source_kinds().contains(&kind))
    }

    fn can_unmarshal(&self, ty: &TypeDesc, kind: JsonKind) -> bool {
        ty.source_kind()
            .is_some_and(|source| self.source_kinds().contains(&source))
            && self.json_kinds().contains(&kind)
    }

    fn marshal(
        &self,
        ser: &JsonSerializer,
        state: &mut SerializerState,
        value: &HostValue,
    ) -> MarshalResult<Value>;

    fn try_unmarshal(
        &self,
        ser: &JsonSerializer,
        state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<ObjectMatch>;

    fn unmarshal(
        &self,
        ser: &JsonSerializer,
        state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<HostValue>;
}

/// Entry points for marshalling and unmarshalling value graphs.
///
/// Owns the ordered serializer list, the class registry and resolver, and
/// the bridge-wide hint policy. A façade is built once per bridge; the
/// per-call scratch lives in [`SerializerState`].
pub struct JsonSerializer {
    serializers: Vec<Arc<dyn Serializer>>,
    registry: Arc<ClassRegistry>,
    resolver: Arc<ClassResolver>,
    output_mode: OutputMode,
    marshal_class_hints: bool,
    marshal_null_attributes: bool,
}

impl JsonSerializer {
    pub fn new(registry: Arc<ClassRegistry>, resolver: Arc<ClassResolver>) -> Self {
        Self {
            serializers: Vec::new(),
            registry,
            resolver,
            output_mode: OutputMode::default(),
            marshal_class_hints: true,
            marshal_null_attributes: true,
        }
    }

    /// A façade with the default serializer set registered in routing
    /// order. The reference serializer is not part of the default set; the
    /// bridge inserts it ahead of the bean serializer when references are
    /// enabled.
    pub fn with_defaults(registry: Arc<ClassRegistry>, resolver: Arc<ClassResolver>) -> Self {
        let mut ser = Self::new(registry, resolver);
        ser.register_serializer(Arc::new(raw::RawObjectSerializer));
        ser.register_serializer(Arc::new(raw::RawArraySerializer));
        ser.register_serializer(Arc::new(boolean::BooleanSerializer));
        ser.register_serializer(Arc::new(string::StringSerializer));
        ser.register_serializer(Arc::new(number::NumberSerializer));
        ser.register_serializer(Arc::new(date::DateSerializer));
        ser.register_serializer(Arc::new(enums::EnumSerializer));
        ser.register_serializer(Arc::new(list::ListSerializer));
        ser.register_serializer(Arc::new(set::SetSerializer));
        ser.register_serializer(Arc::new(map::MapSerializer));
        ser.register_serializer(Arc::new(array::ArraySerializer));
        ser.register_serializer(Arc::new(bean::BeanSerializer));
        ser
    }

    pub fn register_serializer(&mut self, serializer: Arc<dyn Serializer>) {
        if self.find_by_name(serializer.name()).is_some() {
            warn!(name = serializer.name(), "serializer already registered, ignoring");
            return;
        }
        debug!(name = serializer.name(), "registered serializer");
        self.serializers.push(serializer);
    }

    /// Inserts a serializer directly before `anchor` so it wins routing
    /// against it (the reference serializer must precede the bean
    /// serializer).
    pub fn register_serializer_before(&mut self, anchor: &str, serializer: Arc<dyn Serializer>) {
        if self.find_by_name(serializer.name()).is_some() {
            warn!(name = serializer.name(), "serializer already registered, ignoring");
            return;
        }
        debug!(name = serializer.name(), anchor, "registered serializer");
        match self.serializers.iter().position(|s| s.name() == anchor) {
            Some(index) => self.serializers.insert(index, serializer),
            None => self.serializers.push(serializer),
        }
    }

    fn find_by_name(&self, name: &str) -> Option<&Arc<dyn Serializer>> {
        self.serializers.iter().find(|s| s.name() == name)
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &ClassResolver {
        &self.resolver
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    pub fn set_output_mode(&mut self, mode: OutputMode) {
        self.output_mode = mode;
    }

    /// Whether marshalled complex values carry a `javaClass` hint.
    pub fn marshal_class_hints(&self) -> bool {
        self.marshal_class_hints
    }

    pub fn set_marshal_class_hints(&mut self, hints: bool) {
        self.marshal_class_hints = hints;
    }

    /// Whether null bean properties appear in marshalled output.
    pub fn marshal_null_attributes(&self) -> bool {
        self.marshal_null_attributes
    }

    pub fn set_marshal_null_attributes(&mut self, nulls: bool) {
        self.marshal_null_attributes = nulls;
    }

    /// A fresh per-call state for the installed output mode.
    pub fn create_state(&self) -> SerializerState {
        SerializerState::new(self.output_mode)
    }

    /// Adds the `javaClass` hint for `value` to an object under
    /// construction, honoring the hint policy.
    pub fn marshal_hints(&self, obj: &mut serde_json::Map<String, Value>, value: &HostValue) {
        if self.marshal_class_hints {
            if let Some(name) = value.class_name() {
                obj.insert(JAVA_CLASS_FIELD.to_string(), Value::String(name.to_string()));
            }
        }
    }

    // ----- marshalling ----------------------------------------------------

    /// Marshals `value` into the slot `component` of the current location,
    /// consulting the graph state for duplicates and cycles.
    pub fn marshal_value(
        &self,
        state: &mut SerializerState,
        value: &HostValue,
        component: PathComponent,
    ) -> MarshalResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match value.identity() {
            None => self.route_marshal(state, value),
            Some(id) => match state.enter(Some(id), component)? {
                Visit::Reuse(json) => Ok(json),
                Visit::Fresh => {
                    let json = self.route_marshal(state, value)?;
                    Ok(state.exit(Some(id), json))
                }
            },
        }
    }

    fn route_marshal(&self, state: &mut SerializerState, value: &HostValue) -> MarshalResult<Value> {
        let serializer = self
            .serializers
            .iter()
            .find(|s| s.can_marshal(value))
            .ok_or_else(|| {
                MarshalError::NoSerializer(value.source_kind().unwrap_or(SourceKind::Raw))
            })?;
        serializer.marshal(self, state, value)
    }

    // ----- unmarshalling --------------------------------------------------

    /// Unmarshals a subtree located at `path` (used for request arguments,
    /// whose fixup paths are rooted at `params`).
    pub fn unmarshal_at(
        &self,
        state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
        path: &[PathComponent],
    ) -> UnmarshalResult<HostValue> {
        for component in path {
            state.push_component(component.clone());
        }
        let result = self.unmarshal_here(state, ty, json);
        for _ in path {
            state.pop_component();
        }
        result
    }

    /// Unmarshals a child slot; composite serializers use this for their
    /// elements, keys and properties.
    pub fn unmarshal_value(
        &self,
        state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
        component: PathComponent,
    ) -> UnmarshalResult<HostValue> {
        state.push_component(component);
        let result = self.unmarshal_here(state, ty, json);
        state.pop_component();
        result
    }

    fn unmarshal_here(
        &self,
        state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<HostValue> {
        if let Some(shared) = state.aliased_value()? {
            return Ok(shared);
        }
        if json.is_null() {
            return Ok(HostValue::Null);
        }
        match ty {
            TypeDesc::Any => match self.type_from_hint(json)? {
                Some(hinted) => self.dispatch_unmarshal(state, &hinted, json),
                None => self.unmarshal_untyped(state, json),
            },
            _ => self.dispatch_unmarshal(state, ty, json),
        }
    }

    fn dispatch_unmarshal(
        &self,
        state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<HostValue> {
        let kind = JsonKind::of(json);
        let serializer = self
            .serializers
            .iter()
            .find(|s| s.can_unmarshal(ty, kind))
            .ok_or_else(|| UnmarshalError::NoSerializer(format!("{:?}", ty)))?;
        serializer.unmarshal(self, state, ty, json)
    }

    /// No declared type and no usable hint: let every serializer score the
    /// value and take the best fit, ties broken by registration order.
    fn unmarshal_untyped(
        &self,
        state: &mut SerializerState,
        json: &Value,
    ) -> UnmarshalResult<HostValue> {
        let kind = JsonKind::of(json);
        let mut best: Option<(usize, ObjectMatch)> = None;
        for (index, serializer) in self.serializers.iter().enumerate() {
            if !serializer.json_kinds().contains(&kind) {
                continue;
            }
            match serializer.try_unmarshal(self, state, &TypeDesc::Any, json) {
                Ok(score) => {
                    let better = match best {
                        None => true,
                        Some((_, best_score)) => score < best_score,
                    };
                    if better {
                        best = Some((index, score));
                    }
                }
                Err(_) => continue,
            }
        }
        match best {
            Some((index, _)) => self.serializers[index].unmarshal(self, state, &TypeDesc::Any, json),
            None => Err(UnmarshalError::NoSerializer(format!("{:?}", kind))),
        }
    }

    /// Trial unmarshal of a subtree at `path`: same routing as
    /// [`unmarshal_at`](Self::unmarshal_at) but nothing is constructed and
    /// the outcome is a fitness score.
    pub fn try_unmarshal_at(
        &self,
        state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
        path: &[PathComponent],
    ) -> UnmarshalResult<ObjectMatch> {
        for component in path {
            state.push_component(component.clone());
        }
        let result = self.try_unmarshal_here(state, ty, json);
        for _ in path {
            state.pop_component();
        }
        result
    }

    pub fn try_unmarshal_value(
        &self,
        state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
        component: PathComponent,
    ) -> UnmarshalResult<ObjectMatch> {
        state.push_component(component);
        let result = self.try_unmarshal_here(state, ty, json);
        state.pop_component();
        result
    }

    fn try_unmarshal_here(
        &self,
        state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<ObjectMatch> {
        if state.is_alias_target() {
            // the aliased subtree was vetted where it first appeared
            return Ok(ObjectMatch::OKAY);
        }
        if json.is_null() {
            return Ok(ObjectMatch::OKAY);
        }
        match ty {
            TypeDesc::Any => match self.type_from_hint(json)? {
                Some(hinted) => self.dispatch_try(state, &hinted, json),
                None => {
                    let kind = JsonKind::of(json);
                    let mut best: Option<ObjectMatch> = None;
                    for serializer in &self.serializers {
                        if !serializer.json_kinds().contains(&kind) {
                            continue;
                        }
                        if let Ok(score) = serializer.try_unmarshal(self, state, &TypeDesc::Any, json)
                        {
                            best = Some(match best {
                                None => score,
                                Some(prior) if score < prior => score,
                                Some(prior) => prior,
                            });
                        }
                    }
                    best.ok_or_else(|| UnmarshalError::NoSerializer(format!("{:?}", kind)))
                }
            },
            _ => self.dispatch_try(state, ty, json),
        }
    }

    fn dispatch_try(
        &self,
        state: &mut SerializerState,
        ty: &TypeDesc,
        json: &Value,
    ) -> UnmarshalResult<ObjectMatch> {
        let kind = JsonKind::of(json);
        let serializer = self
            .serializers
            .iter()
            .find(|s| s.can_unmarshal(ty, kind))
            .ok_or_else(|| UnmarshalError::NoSerializer(format!("{:?}", ty)))?;
        serializer.try_unmarshal(self, state, ty, json)
    }

    /// Resolves the `javaClass` hint of an object through the security
    /// gate. A present but disallowed hint is an unmarshal failure, not a
    /// fallthrough.
    fn type_from_hint(&self, json: &Value) -> UnmarshalResult<Option<TypeDesc>> {
        if let Value::Object(obj) = json {
            if let Some(Value::String(name)) = obj.get(JAVA_CLASS_FIELD) {
                let resolved = self.resolver.resolve_or_err(name)?;
                return Ok(Some(resolved.type_desc()));
            }
        }
        Ok(None)
    }
}
