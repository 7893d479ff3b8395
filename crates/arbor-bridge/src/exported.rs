use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use arbor_serializer::{HostValue, TypeDesc};

use crate::context::InvocationContext;
use crate::error::InvokeResult;

/// Synthetic method name for constructor dispatch.
pub const CONSTRUCTOR_FLAG: &str = "$constructor";

/// An argument handed to an invoke closure: either a value unmarshalled
/// from the wire, or an opaque context object injected by a resolver.
pub enum Arg {
    Value(HostValue),
    Context(Arc<dyn Any + Send + Sync>),
}

impl Arg {
    pub fn value(&self) -> Option<&HostValue> {
        match self {
            Arg::Value(value) => Some(value),
            Arg::Context(_) => None,
        }
    }

    pub fn context<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Arg::Context(item) => item.clone().downcast::<T>().ok(),
            Arg::Value(_) => None,
        }
    }
}

type InvokeFn = Box<
    dyn Fn(&InvocationContext, Option<&HostValue>, Vec<Arg>) -> InvokeResult<HostValue>
        + Send
        + Sync,
>;

/// One invokable method: its name, declared parameter signature, and the
/// closure that performs the call. `TypeDesc::Context` parameters are
/// filled from the invocation context and do not count toward the wire
/// arity.
pub struct MethodSpec {
    name: String,
    params: Vec<TypeDesc>,
    invoke: InvokeFn,
}

impl MethodSpec {
    pub fn new(
        name: impl Into<String>,
        params: impl IntoIterator<Item = TypeDesc>,
        invoke: impl Fn(&InvocationContext, Option<&HostValue>, Vec<Arg>) -> InvokeResult<HostValue>
            + Send
            + Sync
            + 'static,
    ) -> Arc<MethodSpec> {
        Arc::new(MethodSpec {
            name: name.into(),
            params: params.into_iter().collect(),
            invoke: Box::new(invoke),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[TypeDesc] {
        &self.params
    }

    /// Parameter count as the wire sees it (context parameters excluded).
    pub fn wire_arity(&self) -> usize {
        self.params.iter().filter(|p| !p.is_context()).count()
    }

    pub fn invoke(
        &self,
        context: &InvocationContext,
        instance: Option<&HostValue>,
        args: Vec<Arg>,
    ) -> InvokeResult<HostValue> {
        (self.invoke)(context, instance, args)
    }

    /// Comma-separated parameter signature for logs.
    pub fn signature(&self) -> String {
        self.params
            .iter()
            .map(|p| format!("{:?}", p))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Key of the overload map: method name plus wire arity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub name: String,
    pub arity: usize,
}

impl MethodKey {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }
}

pub type MethodMap = HashMap<MethodKey, Vec<Arc<MethodSpec>>>;

/// The dispatchable surface of an exported type: instance methods, static
/// methods and constructors, each keyed by (name, wire arity). Built once
/// at registration; the keyed maps are this bridge's equivalent of the
/// original's reflective class analysis.
pub struct ExportedClass {
    name: String,
    instance_methods: MethodMap,
    static_methods: MethodMap,
    constructors: MethodMap,
}

impl ExportedClass {
    pub fn builder(name: impl Into<String>) -> ExportedClassBuilder {
        ExportedClassBuilder {
            name: name.into(),
            instance_methods: Vec::new(),
            static_methods: Vec::new(),
            constructors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance_methods(&self) -> &MethodMap {
        &self.instance_methods
    }

    pub fn static_methods(&self) -> &MethodMap {
        &self.static_methods
    }

    pub fn constructors(&self) -> &MethodMap {
        &self.constructors
    }
}

pub struct ExportedClassBuilder {
    name: String,
    instance_methods: Vec<Arc<MethodSpec>>,
    static_methods: Vec<Arc<MethodSpec>>,
    constructors: Vec<Arc<MethodSpec>>,
}

impl ExportedClassBuilder {
    pub fn instance_method(mut self, method: Arc<MethodSpec>) -> Self {
        self.instance_methods.push(method);
        self
    }

    pub fn static_method(mut self, method: Arc<MethodSpec>) -> Self {
        self.static_methods.push(method);
        self
    }

    /// Registers a constructor overload under the synthetic
    /// [`CONSTRUCTOR_FLAG`] name.
    pub fn constructor(
        mut self,
        params: impl IntoIterator<Item = TypeDesc>,
        invoke: impl Fn(&InvocationContext, Option<&HostValue>, Vec<Arg>) -> InvokeResult<HostValue>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.constructors
            .push(MethodSpec::new(CONSTRUCTOR_FLAG, params, invoke));
        self
    }

    pub fn build(self) -> Arc<ExportedClass> {
        Arc::new(ExportedClass {
            name: self.name,
            instance_methods: keyed(self.instance_methods),
            static_methods: keyed(self.static_methods),
            constructors: keyed(self.constructors),
        })
    }
}

fn keyed(methods: Vec<Arc<MethodSpec>>) -> MethodMap {
    let mut map: MethodMap = HashMap::new();
    for method in methods {
        let key = MethodKey::new(method.name(), method.wire_arity());
        map.entry(key).or_default().push(method);
    }
    map
}

/// A registered object: the live value plus the class that restricts which
/// methods are visible on it.
#[derive(Clone)]
pub struct ObjectInstance {
    pub value: HostValue,
    pub class: Arc<ExportedClass>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo() -> Arc<MethodSpec> {
        MethodSpec::new("echo", [TypeDesc::String], |_ctx, _instance, mut args| {
            Ok(match args.pop() {
                Some(Arg::Value(value)) => value,
                _ => HostValue::Null,
            })
        })
    }

    #[test]
    fn wire_arity_skips_context_params() {
        let method = MethodSpec::new(
            "withContext",
            [
                TypeDesc::Context("http.request".to_string()),
                TypeDesc::String,
            ],
            |_, _, _| Ok(HostValue::Null),
        );
        assert_eq!(method.wire_arity(), 1);
    }

    #[test]
    fn overloads_group_under_one_key() {
        let class = ExportedClass::builder("com.example.Test")
            .instance_method(echo())
            .instance_method(MethodSpec::new("echo", [TypeDesc::Bool], |_, _, _| {
                Ok(HostValue::Null)
            }))
            .build();
        let key = MethodKey::new("echo", 1);
        assert_eq!(class.instance_methods()[&key].len(), 2);
    }

    #[test]
    fn constructor_key_uses_flag_name() {
        let class = ExportedClass::builder("com.example.Test")
            .constructor([TypeDesc::I32], |_, _, _| Ok(HostValue::Null))
            .build();
        assert!(class
            .constructors()
            .contains_key(&MethodKey::new(CONSTRUCTOR_FLAG, 1)));
    }
}
