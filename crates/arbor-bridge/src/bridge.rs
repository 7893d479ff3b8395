use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use arbor_json_rpc::{error_messages, ErrorObject, PathComponent, RequestId, RpcResult};
use arbor_serializer::request::Alias;
use arbor_serializer::{
    BeanClass, ClassRegistry, ClassResolver, EnumClass, FlatRequestParser, HostValue,
    JsonSerializer, MarshalResult, NestedRequestParser, OutputMode, ReferenceBroker,
    ReferenceSerializer, RequestParser, Serializer,
};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::callback::{CallbackController, InvocationCallback};
use crate::context::InvocationContext;
use crate::error::{ExceptionTransformer, IdentityExceptionTransformer, InvokeError};
use crate::exported::{ExportedClass, MethodKey, MethodSpec, ObjectInstance, CONSTRUCTOR_FLAG};
use crate::localarg::{ContextArgRegistry, ContextArgResolver};
use crate::reference::{ReferenceStore, DEFAULT_REFERENCE_CAPACITY};
use crate::resolve;

const SYSTEM_LIST_METHODS: &str = "system.listMethods";
const OBJECT_METHOD_PREFIX: &str = ".obj";
const CALLABLE_REFERENCE_METHOD_PREFIX: &str = ";ref";

/// Key of the object registry: explicit export names plus the ids under
/// which callable-reference instances are parked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ObjectKey {
    Name(String),
    Id(u64),
}

/// Registries shared between the bridge and its reference serializer.
struct BridgeCore {
    references_enabled: AtomicBool,
    store: ReferenceStore,
    reference_classes: RwLock<BTreeSet<String>>,
    callable_reference_classes: RwLock<BTreeSet<String>>,
    exported_classes: Mutex<HashMap<String, Arc<ExportedClass>>>,
    objects: Mutex<HashMap<ObjectKey, ObjectInstance>>,
}

impl ReferenceBroker for BridgeCore {
    fn is_reference(&self, class_name: &str) -> bool {
        self.references_enabled.load(Ordering::Acquire)
            && self.reference_classes.read().unwrap().contains(class_name)
    }

    fn is_callable_reference(&self, class_name: &str) -> bool {
        self.references_enabled.load(Ordering::Acquire)
            && self
                .callable_reference_classes
                .read()
                .unwrap()
                .contains(class_name)
    }

    fn add_reference(&self, value: &HostValue) -> MarshalResult<u64> {
        let (id, evicted) = self.store.insert_tracked(value);
        self.prune_evicted(&evicted);
        Ok(id)
    }

    fn register_callable(&self, value: &HostValue) -> MarshalResult<u64> {
        let class_name = value
            .class_name()
            .ok_or_else(|| arbor_serializer::MarshalError::custom("reference value has no class"))?;
        let class = self
            .exported_classes
            .lock()
            .unwrap()
            .get(class_name)
            .cloned()
            .ok_or_else(|| {
                arbor_serializer::MarshalError::custom(format!(
                    "{} is not registered for callable reference dispatch",
                    class_name
                ))
            })?;
        let (id, evicted) = self.store.insert_tracked(value);
        self.prune_evicted(&evicted);
        self.objects.lock().unwrap().insert(
            ObjectKey::Id(id),
            ObjectInstance {
                value: value.clone(),
                class,
            },
        );
        Ok(id)
    }

    fn reference_for(&self, object_id: u64) -> Option<HostValue> {
        self.store.get(object_id)
    }
}

impl BridgeCore {
    /// Dispatch entries for evicted references go with them.
    fn prune_evicted(&self, evicted: &[u64]) {
        if evicted.is_empty() {
            return;
        }
        let mut objects = self.objects.lock().unwrap();
        for id in evicted {
            objects.remove(&ObjectKey::Id(*id));
        }
    }
}

/// Unmarshals JSON-RPC requests, invokes the matching method on a
/// registered object or class, and marshals the result back. Errors never
/// escape the `call` boundary; they become failure results.
pub struct Bridge {
    core: Arc<BridgeCore>,
    registry: Arc<ClassRegistry>,
    serializer: RwLock<JsonSerializer>,
    parser: Arc<dyn RequestParser>,
    callbacks: CallbackController,
    context_args: ContextArgRegistry,
    exception_transformer: Box<dyn ExceptionTransformer>,
}

impl Bridge {
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// A bridge with default options: nested wire form, fixups for
    /// circular references and duplicates, class hints on.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    // ----- registration ---------------------------------------------------

    /// Exports the static methods and constructors of a class under its
    /// registered name.
    pub fn register_class(&self, class: Arc<ExportedClass>) {
        debug!(class = class.name(), "registered class");
        self.core
            .exported_classes
            .lock()
            .unwrap()
            .insert(class.name().to_string(), class);
    }

    pub fn unregister_class(&self, name: &str) {
        if self
            .core
            .exported_classes
            .lock()
            .unwrap()
            .remove(name)
            .is_some()
        {
            debug!(class = name, "unregistered class");
        }
    }

    /// Exports an object instance: its class's instance methods become
    /// callable as `<key>.<method>`.
    pub fn register_object(
        &self,
        key: impl Into<String>,
        value: HostValue,
        class: Arc<ExportedClass>,
    ) {
        let key = key.into();
        debug!(key, class = class.name(), "registered object");
        self.core
            .objects
            .lock()
            .unwrap()
            .insert(ObjectKey::Name(key), ObjectInstance { value, class });
    }

    pub fn unregister_object(&self, key: &str) {
        if self
            .core
            .objects
            .lock()
            .unwrap()
            .remove(&ObjectKey::Name(key.to_string()))
            .is_some()
        {
            debug!(key, "unregistered object");
        }
    }

    /// Registers a bean class for (un)marshalling by value.
    pub fn register_bean_class(&self, class: Arc<BeanClass>) {
        self.registry.register_bean(class);
    }

    pub fn register_enum_class(&self, class: Arc<EnumClass>) {
        self.registry.register_enum(class);
    }

    /// Marks a class as marshalled by opaque reference handle instead of
    /// by value. Enables references on this bridge.
    pub fn register_reference(&self, class_name: impl Into<String>) {
        let class_name = class_name.into();
        self.enable_references();
        self.registry.register_reference_class(&class_name);
        debug!(class = class_name, "registered reference");
        self.core
            .reference_classes
            .write()
            .unwrap()
            .insert(class_name);
    }

    /// Marks a class as a callable reference: instances marshal as
    /// handles whose methods remote clients may invoke via `.obj[id]`.
    pub fn register_callable_reference(&self, class: Arc<ExportedClass>) {
        self.enable_references();
        let name = class.name().to_string();
        self.registry.register_reference_class(&name);
        self.register_class(class);
        debug!(class = name, "registered callable reference");
        self.core
            .callable_reference_classes
            .write()
            .unwrap()
            .insert(name);
    }

    /// Installs the reference serializer (ahead of the bean serializer) if
    /// it is not active yet.
    pub fn enable_references(&self) {
        if !self.core.references_enabled.swap(true, Ordering::AcqRel) {
            let broker: Arc<dyn ReferenceBroker> = self.core.clone();
            self.serializer
                .write()
                .unwrap()
                .register_serializer_before("bean", Arc::new(ReferenceSerializer::new(broker)));
            info!("enabled references on this bridge");
        }
    }

    /// Explicitly drops one parked reference.
    pub fn invalidate_reference(&self, object_id: u64) -> bool {
        self.core.objects.lock().unwrap().remove(&ObjectKey::Id(object_id));
        self.core.store.invalidate(object_id)
    }

    pub fn register_callback<C: std::any::Any>(&self, callback: Arc<dyn InvocationCallback>) {
        self.callbacks.register::<C>(callback);
    }

    pub fn unregister_callback<C: std::any::Any>(&self, callback: &Arc<dyn InvocationCallback>) {
        self.callbacks.unregister::<C>(callback);
    }

    pub fn register_context_arg<C: std::any::Any>(
        &self,
        key: impl Into<String>,
        resolver: Arc<dyn ContextArgResolver>,
    ) {
        self.context_args.register::<C>(key, resolver);
    }

    pub fn register_serializer(&self, serializer: Arc<dyn Serializer>) {
        self.serializer.write().unwrap().register_serializer(serializer);
    }

    // ----- call entry points ----------------------------------------------

    /// Parses and dispatches a request held as text. A parse failure is
    /// reported as code 590 with a null id.
    pub fn call_str(&self, context: &InvocationContext, request: &str) -> RpcResult {
        match serde_json::from_str::<Value>(request) {
            Ok(parsed) => self.call_value(context, &parsed),
            Err(parse_error) => {
                error!(%parse_error, "could not parse request");
                RpcResult::failed(None, ErrorObject::parse_error())
            }
        }
    }

    /// Dispatches a request held as a parsed JSON tree.
    pub fn call_value(&self, context: &InvocationContext, request: &Value) -> RpcResult {
        let Some(message) = request.as_object() else {
            return RpcResult::failed(None, ErrorObject::parse_error());
        };
        let id = message
            .get(arbor_json_rpc::ID_FIELD)
            .and_then(RequestId::from_value);

        let Some(encoded_method) = message
            .get(arbor_json_rpc::METHOD_FIELD)
            .and_then(Value::as_str)
        else {
            error!("no method in request");
            return RpcResult::failed(id, ErrorObject::no_method());
        };

        let parsed = match self
            .parser
            .parse_arguments(message, arbor_json_rpc::PARAMS_FIELD)
        {
            Ok(parsed) => parsed,
            Err(e) if e.is_fixup_error() => {
                error!(%e, "bad fixup data in request");
                return RpcResult::failed(
                    id,
                    ErrorObject::fixup(error_messages::MSG_ERR_FIXUP.to_string()),
                );
            }
            Err(e) => {
                error!(%e, "no method or parameters in request");
                return RpcResult::failed(id, ErrorObject::no_method());
            }
        };

        debug!(
            method = encoded_method,
            args = parsed.args.len(),
            id = ?id,
            "call"
        );

        if encoded_method == SYSTEM_LIST_METHODS {
            return RpcResult::success(id, Value::Array(self.system_methods()));
        }

        let (class_token, method_name) = match encoded_method.rsplit_once('.') {
            Some((class_token, method_name)) => (class_token, method_name),
            None => (encoded_method, ""),
        };
        let object_id = parse_object_id(class_token);

        let (instance, candidates) =
            match self.lookup_candidates(object_id, class_token, method_name, parsed.args.len()) {
                Ok(found) => found,
                Err(error) => return RpcResult::failed(id, error),
            };

        let serializer = self.serializer.read().unwrap();
        let Some(method) =
            resolve::resolve_method(&serializer, &candidates, &parsed.args, &parsed.aliases)
        else {
            return RpcResult::failed(id, ErrorObject::no_method());
        };

        self.invoke(
            &serializer,
            context,
            id,
            instance,
            &method,
            &parsed.args,
            &parsed.aliases,
        )
    }

    /// Finds the invocation target and the overload set for one encoded
    /// method name.
    fn lookup_candidates(
        &self,
        object_id: Option<u64>,
        class_token: &str,
        method_name: &str,
        arity: usize,
    ) -> Result<(Option<ObjectInstance>, Vec<Arc<MethodSpec>>), ErrorObject> {
        let key = MethodKey::new(method_name, arity);
        if let Some(object_id) = object_id {
            let objects = self.core.objects.lock().unwrap();
            let Some(instance) = objects.get(&ObjectKey::Id(object_id)) else {
                return Err(ErrorObject::no_method());
            };
            let candidates = instance
                .class
                .instance_methods()
                .get(&key)
                .cloned()
                .unwrap_or_default();
            return Ok((Some(instance.clone()), candidates));
        }

        if let Some(instance) = self
            .core
            .objects
            .lock()
            .unwrap()
            .get(&ObjectKey::Name(class_token.to_string()))
        {
            let candidates = instance
                .class
                .instance_methods()
                .get(&key)
                .cloned()
                .unwrap_or_default();
            return Ok((Some(instance.clone()), candidates));
        }

        let class = self
            .core
            .exported_classes
            .lock()
            .unwrap()
            .get(class_token)
            .cloned();
        match class {
            Some(class) if method_name == CONSTRUCTOR_FLAG => {
                let candidates = class.constructors().get(&key).cloned().unwrap_or_default();
                if candidates.is_empty() {
                    Err(ErrorObject::no_constructor())
                } else {
                    Ok((None, candidates))
                }
            }
            Some(class) => Ok((
                None,
                class.static_methods().get(&key).cloned().unwrap_or_default(),
            )),
            None => Err(ErrorObject::no_method()),
        }
    }

    /// The invocation pipeline: unmarshal arguments, run pre-invoke
    /// callbacks, call the method, run post-invoke callbacks, marshal the
    /// result, classify failures.
    #[allow(clippy::too_many_arguments)]
    fn invoke(
        &self,
        serializer: &JsonSerializer,
        context: &InvocationContext,
        id: Option<RequestId>,
        instance: Option<ObjectInstance>,
        method: &MethodSpec,
        args: &[Value],
        aliases: &[Alias],
    ) -> RpcResult {
        debug!(
            method = method.name(),
            signature = method.signature(),
            "invoking"
        );
        let instance_value = instance.as_ref().map(|i| &i.value);

        // one state for all arguments so shared and cyclic structure
        // across them reconstructs with identity
        let mut arg_state = serializer.create_state();
        arg_state.install_aliases(aliases.to_vec());
        let real_args = match resolve::unmarshal_args(
            serializer,
            &mut arg_state,
            method,
            args,
            context,
            &self.context_args,
        ) {
            Ok(real_args) => real_args,
            Err(e) => {
                error!(%e, method = method.name(), "could not unmarshal arguments");
                self.callbacks
                    .invocation_error(context, instance_value, method.name(), &e.to_string());
                let code = if e.is_fixup_error() {
                    ErrorObject::fixup(error_messages::MSG_ERR_FIXUP.to_string())
                } else {
                    ErrorObject::unmarshal(e.to_string())
                };
                return RpcResult::failed(id, code);
            }
        };

        if let Err(e) = self
            .callbacks
            .pre_invoke(context, instance_value, method.name(), &real_args)
        {
            self.callbacks
                .invocation_error(context, instance_value, method.name(), &e.to_string());
            return self.remote_failure(id, &e);
        }

        let outcome = method.invoke(context, instance_value, real_args);

        let post = self.callbacks.post_invoke(
            context,
            instance_value,
            method.name(),
            outcome.as_ref().ok(),
            outcome.as_ref().err(),
        );
        if let Err(e) = post {
            self.callbacks
                .invocation_error(context, instance_value, method.name(), &e.to_string());
            return self.remote_failure(id, &e);
        }

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                error!(%e, method = method.name(), "method raised");
                self.callbacks
                    .invocation_error(context, instance_value, method.name(), &e.to_string());
                return self.remote_failure(id, &e);
            }
        };

        let mut result_state = serializer.create_state();
        match serializer.marshal_value(
            &mut result_state,
            &result,
            PathComponent::Field(arbor_json_rpc::RESULT_FIELD.to_string()),
        ) {
            Ok(json) => result_state.into_result(id, json),
            Err(e) => {
                error!(%e, method = method.name(), "could not marshal result");
                self.callbacks
                    .invocation_error(context, instance_value, method.name(), &e.to_string());
                RpcResult::failed(id, ErrorObject::marshal(e.to_string()))
            }
        }
    }

    fn remote_failure(&self, id: Option<RequestId>, error: &InvokeError) -> RpcResult {
        let (message, data) = self.exception_transformer.transform(error);
        RpcResult::remote_failed(id, message, data)
    }

    // ----- catalogue ------------------------------------------------------

    /// The sorted `system.listMethods` catalogue: instance methods as
    /// `key.method`, static methods as `class.method`, callable-reference
    /// methods as `;ref[classFQN].method`.
    pub fn system_methods(&self) -> Vec<Value> {
        let mut names = BTreeSet::new();

        for (name, class) in self.core.exported_classes.lock().unwrap().iter() {
            unique_methods(&mut names, &format!("{}.", name), class.static_methods());
        }

        for (key, instance) in self.core.objects.lock().unwrap().iter() {
            let ObjectKey::Name(name) = key else {
                continue;
            };
            let prefix = format!("{}.", name);
            unique_methods(&mut names, &prefix, instance.class.instance_methods());
            unique_methods(&mut names, &prefix, instance.class.static_methods());
        }

        let callable = self.core.callable_reference_classes.read().unwrap();
        let classes = self.core.exported_classes.lock().unwrap();
        for class_name in callable.iter() {
            if let Some(class) = classes.get(class_name) {
                let prefix = format!("{}[{}].", CALLABLE_REFERENCE_METHOD_PREFIX, class_name);
                unique_methods(&mut names, &prefix, class.instance_methods());
                unique_methods(&mut names, &prefix, class.static_methods());
            }
        }

        names.into_iter().map(Value::String).collect()
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

fn unique_methods(
    names: &mut BTreeSet<String>,
    prefix: &str,
    methods: &crate::exported::MethodMap,
) {
    for key in methods.keys() {
        names.insert(format!("{}{}", prefix, key.name));
    }
}

/// Parses the instance token `.obj[<id>]`, if present.
fn parse_object_id(class_token: &str) -> Option<u64> {
    let rest = class_token.strip_prefix(OBJECT_METHOD_PREFIX)?;
    let rest = rest.strip_prefix('[')?;
    let rest = rest.strip_suffix(']')?;
    rest.parse::<u64>().ok()
}

/// Configures and assembles a [`Bridge`]. The wire form (nested or flat)
/// picks the matching request parser automatically.
pub struct BridgeBuilder {
    output_mode: OutputMode,
    marshal_class_hints: bool,
    marshal_null_attributes: bool,
    allowed_classes: Vec<String>,
    disallowed_prefixes: Vec<String>,
    reference_capacity: usize,
    exception_transformer: Box<dyn ExceptionTransformer>,
    request_parser: Option<Arc<dyn RequestParser>>,
}

impl BridgeBuilder {
    pub fn new() -> Self {
        Self {
            output_mode: OutputMode::default(),
            marshal_class_hints: true,
            marshal_null_attributes: true,
            allowed_classes: Vec::new(),
            disallowed_prefixes: arbor_serializer::resolver::DEFAULT_DISALLOWED_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            reference_capacity: DEFAULT_REFERENCE_CAPACITY,
            exception_transformer: Box::new(IdentityExceptionTransformer),
            request_parser: None,
        }
    }

    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn marshal_class_hints(mut self, hints: bool) -> Self {
        self.marshal_class_hints = hints;
        self
    }

    pub fn marshal_null_attributes(mut self, nulls: bool) -> Self {
        self.marshal_null_attributes = nulls;
        self
    }

    /// Adds class names to the resolver's allow-list.
    pub fn allow_classes<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.allowed_classes.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn disallow_prefixes<S: Into<String>>(mut self, prefixes: impl IntoIterator<Item = S>) -> Self {
        self.disallowed_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn reference_capacity(mut self, capacity: usize) -> Self {
        self.reference_capacity = capacity;
        self
    }

    pub fn exception_transformer(mut self, transformer: Box<dyn ExceptionTransformer>) -> Self {
        self.exception_transformer = transformer;
        self
    }

    /// Overrides the request parser; without this the wire form decides.
    pub fn request_parser(mut self, parser: Arc<dyn RequestParser>) -> Self {
        self.request_parser = Some(parser);
        self
    }

    pub fn build(self) -> Bridge {
        let registry = Arc::new(ClassRegistry::new());
        let resolver = Arc::new(ClassResolver::new(
            registry.clone(),
            self.allowed_classes,
            self.disallowed_prefixes,
        ));
        let mut serializer = JsonSerializer::with_defaults(registry.clone(), resolver);
        serializer.set_output_mode(self.output_mode);
        serializer.set_marshal_class_hints(self.marshal_class_hints);
        serializer.set_marshal_null_attributes(self.marshal_null_attributes);

        let parser = self.request_parser.unwrap_or_else(|| match self.output_mode {
            OutputMode::Flat => Arc::new(FlatRequestParser),
            OutputMode::Fixups(_) => Arc::new(NestedRequestParser),
        });

        Bridge {
            core: Arc::new(BridgeCore {
                references_enabled: AtomicBool::new(false),
                store: ReferenceStore::new(self.reference_capacity),
                reference_classes: RwLock::new(BTreeSet::new()),
                callable_reference_classes: RwLock::new(BTreeSet::new()),
                exported_classes: Mutex::new(HashMap::new()),
                objects: Mutex::new(HashMap::new()),
            }),
            registry,
            serializer: RwLock::new(serializer),
            parser,
            callbacks: CallbackController::new(),
            context_args: ContextArgRegistry::new(),
            exception_transformer: self.exception_transformer,
        }
    }
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_token_parsing() {
        assert_eq!(parse_object_id(".obj[4827452]"), Some(4827452));
        assert_eq!(parse_object_id(".obj[0]"), Some(0));
        assert_eq!(parse_object_id("test"), None);
        assert_eq!(parse_object_id(".obj[x]"), None);
        assert_eq!(parse_object_id(".obj[1"), None);
    }
}
