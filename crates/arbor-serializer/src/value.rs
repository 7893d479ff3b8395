use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::classes::{BeanClass, EnumClass};
use crate::types::{DateKind, SourceKind, TypeDesc};

/// Identity of a shared composite value: the address of its `Arc` payload.
/// Scalars have no identity and never take part in duplicate or cycle
/// tracking.
pub type Identity = usize;

/// Default wire class names for values built through the convenience
/// constructors.
pub const DEFAULT_LIST_CLASS: &str = "java.util.ArrayList";
pub const DEFAULT_SET_CLASS: &str = "java.util.HashSet";
pub const DEFAULT_MAP_CLASS: &str = "java.util.HashMap";

/// The in-memory value model the serializers walk.
///
/// Composite variants are cheap to clone: they share their payload through
/// an `Arc`, which is also what lets one value appear at several places in
/// a graph (or inside itself) with its identity observable.
#[derive(Clone)]
pub enum HostValue {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Char(char),
    String(String),
    Date(DateValue),
    Enum(EnumValue),
    Array(ArrayValue),
    List(ListValue),
    Set(SetValue),
    Map(MapValue),
    Bean(BeanValue),
    Raw(RawValue),
    Opaque(OpaqueValue),
}

impl HostValue {
    pub fn source_kind(&self) -> Option<SourceKind> {
        match self {
            HostValue::Null => None,
            HostValue::Bool(_) => Some(SourceKind::Bool),
            HostValue::I8(_)
            | HostValue::I16(_)
            | HostValue::I32(_)
            | HostValue::I64(_)
            | HostValue::F32(_)
            | HostValue::F64(_) => Some(SourceKind::Number),
            HostValue::Char(_) => Some(SourceKind::Char),
            HostValue::String(_) => Some(SourceKind::String),
            HostValue::Date(_) => Some(SourceKind::Date),
            HostValue::Enum(_) => Some(SourceKind::Enum),
            HostValue::Array(_) => Some(SourceKind::Array),
            HostValue::List(_) => Some(SourceKind::List),
            HostValue::Set(_) => Some(SourceKind::Set),
            HostValue::Map(_) => Some(SourceKind::Map),
            HostValue::Bean(_) => Some(SourceKind::Bean),
            HostValue::Raw(_) => Some(SourceKind::Raw),
            HostValue::Opaque(_) => Some(SourceKind::Reference),
        }
    }

    /// Identity for graph tracking. Only the variants that can form shared
    /// or cyclic structure report one; reference handles are leaf tokens.
    pub fn identity(&self) -> Option<Identity> {
        match self {
            HostValue::Array(v) => Some(v.identity()),
            HostValue::List(v) => Some(v.identity()),
            HostValue::Set(v) => Some(v.identity()),
            HostValue::Map(v) => Some(v.identity()),
            HostValue::Bean(v) => Some(v.identity()),
            HostValue::Raw(v) => Some(v.identity()),
            _ => None,
        }
    }

    /// The wire class name this value would be hinted as, if any.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            HostValue::Date(v) => Some(v.kind.wire_class()),
            HostValue::Enum(v) => Some(v.class.name()),
            HostValue::List(v) => Some(&v.class),
            HostValue::Set(v) => Some(&v.class),
            HostValue::Map(v) => Some(&v.class),
            HostValue::Bean(v) => Some(v.class.name()),
            HostValue::Opaque(v) => Some(&v.class),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    pub fn same_identity(&self, other: &HostValue) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn list(elements: Vec<HostValue>) -> HostValue {
        HostValue::List(ListValue::new(DEFAULT_LIST_CLASS, elements))
    }

    pub fn set(elements: Vec<HostValue>) -> HostValue {
        HostValue::Set(SetValue::new(DEFAULT_SET_CLASS, elements))
    }

    pub fn map(entries: Vec<(String, HostValue)>) -> HostValue {
        HostValue::Map(MapValue::new(DEFAULT_MAP_CLASS, entries))
    }

    pub fn array(elem: TypeDesc, elements: Vec<HostValue>) -> HostValue {
        HostValue::Array(ArrayValue::new(elem, elements))
    }

    pub fn raw(value: Value) -> HostValue {
        HostValue::Raw(RawValue::new(value))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            HostValue::I32(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::I8(n) => Some(*n as i64),
            HostValue::I16(n) => Some(*n as i64),
            HostValue::I32(n) => Some(*n as i64),
            HostValue::I64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::F32(n) => Some(*n as f64),
            HostValue::F64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListValue> {
        match self {
            HostValue::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            HostValue::Map(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bean(&self) -> Option<&BeanValue> {
        match self {
            HostValue::Bean(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => write!(f, "Null"),
            HostValue::Bool(v) => write!(f, "Bool({})", v),
            HostValue::I8(v) => write!(f, "I8({})", v),
            HostValue::I16(v) => write!(f, "I16({})", v),
            HostValue::I32(v) => write!(f, "I32({})", v),
            HostValue::I64(v) => write!(f, "I64({})", v),
            HostValue::F32(v) => write!(f, "F32({})", v),
            HostValue::F64(v) => write!(f, "F64({})", v),
            HostValue::Char(v) => write!(f, "Char({:?})", v),
            HostValue::String(v) => write!(f, "String({:?})", v),
            HostValue::Date(v) => write!(f, "Date({:?}, {})", v.kind, v.millis),
            HostValue::Enum(v) => write!(f, "Enum({}.{})", v.class.name(), v.constant),
            HostValue::Array(v) => write!(f, "Array(#{:x})", v.identity()),
            HostValue::List(v) => write!(f, "List({}, #{:x})", v.class, v.identity()),
            HostValue::Set(v) => write!(f, "Set({}, #{:x})", v.class, v.identity()),
            HostValue::Map(v) => write!(f, "Map({}, #{:x})", v.class, v.identity()),
            HostValue::Bean(v) => write!(f, "Bean({}, #{:x})", v.class.name(), v.identity()),
            HostValue::Raw(v) => write!(f, "Raw(#{:x})", v.identity()),
            HostValue::Opaque(v) => write!(f, "Opaque({}, #{:x})", v.class, v.identity()),
        }
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Bool(v)
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        HostValue::I32(v)
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        HostValue::I64(v)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::F64(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::String(v.to_string())
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::String(v)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => HostValue::Null,
        }
    }
}

/// A temporal value: a kind plus epoch milliseconds. The kind decides the
/// `javaClass` hint and which host type an unmarshal reconstructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateValue {
    pub kind: DateKind,
    pub millis: i64,
}

impl DateValue {
    pub fn new(kind: DateKind, millis: i64) -> Self {
        Self { kind, millis }
    }

    pub fn from_datetime(when: DateTime<Utc>) -> Self {
        Self::new(DateKind::DateTime, when.timestamp_millis())
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.millis).single()
    }
}

/// A constant of a registered enum class.
#[derive(Clone)]
pub struct EnumValue {
    pub class: Arc<EnumClass>,
    pub constant: String,
}

impl EnumValue {
    pub fn new(class: Arc<EnumClass>, constant: impl Into<String>) -> Self {
        Self {
            class,
            constant: constant.into(),
        }
    }
}

/// A typed array: marshals to a bare JSON array (no wrapper, no hint).
#[derive(Clone)]
pub struct ArrayValue {
    pub elem: TypeDesc,
    inner: Arc<RwLock<Vec<HostValue>>>,
}

impl ArrayValue {
    pub fn new(elem: TypeDesc, elements: Vec<HostValue>) -> Self {
        Self {
            elem,
            inner: Arc::new(RwLock::new(elements)),
        }
    }

    pub fn identity(&self) -> Identity {
        Arc::as_ptr(&self.inner) as Identity
    }

    pub fn elements(&self) -> Vec<HostValue> {
        self.inner.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, value: HostValue) {
        self.inner.write().unwrap().push(value);
    }
}

/// An ordered collection marshalled as `{javaClass, "list": […]}`.
#[derive(Clone)]
pub struct ListValue {
    pub class: String,
    inner: Arc<RwLock<Vec<HostValue>>>,
}

impl ListValue {
    pub fn new(class: impl Into<String>, elements: Vec<HostValue>) -> Self {
        Self {
            class: class.into(),
            inner: Arc::new(RwLock::new(elements)),
        }
    }

    pub fn identity(&self) -> Identity {
        Arc::as_ptr(&self.inner) as Identity
    }

    pub fn elements(&self) -> Vec<HostValue> {
        self.inner.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, value: HostValue) {
        self.inner.write().unwrap().push(value);
    }

    pub fn get(&self, index: usize) -> Option<HostValue> {
        self.inner.read().unwrap().get(index).cloned()
    }
}

/// A collection with set semantics on the wire: marshalled as
/// `{javaClass, "set": {<text of element>: element}}`. Host-side the
/// elements keep their insertion order so marshalling is deterministic.
#[derive(Clone)]
pub struct SetValue {
    pub class: String,
    inner: Arc<RwLock<Vec<HostValue>>>,
}

impl SetValue {
    pub fn new(class: impl Into<String>, elements: Vec<HostValue>) -> Self {
        Self {
            class: class.into(),
            inner: Arc::new(RwLock::new(elements)),
        }
    }

    pub fn identity(&self) -> Identity {
        Arc::as_ptr(&self.inner) as Identity
    }

    pub fn elements(&self) -> Vec<HostValue> {
        self.inner.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, value: HostValue) {
        self.inner.write().unwrap().push(value);
    }
}

/// Insertion-ordered string-keyed entries backing a [`MapValue`]. Map keys
/// are strings by construction; other key types are out of scope for the
/// protocol.
#[derive(Default)]
pub struct MapEntries {
    entries: Vec<(String, HostValue)>,
}

impl MapEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: HostValue) {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&HostValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, HostValue)> {
        self.entries.iter()
    }
}

/// A string-keyed map marshalled as `{javaClass, "map": {…}}`.
#[derive(Clone)]
pub struct MapValue {
    pub class: String,
    inner: Arc<RwLock<MapEntries>>,
}

impl MapValue {
    pub fn new(class: impl Into<String>, entries: Vec<(String, HostValue)>) -> Self {
        let mut map = MapEntries::new();
        for (key, value) in entries {
            map.insert(key, value);
        }
        Self {
            class: class.into(),
            inner: Arc::new(RwLock::new(map)),
        }
    }

    pub fn identity(&self) -> Identity {
        Arc::as_ptr(&self.inner) as Identity
    }

    pub fn entries(&self) -> Vec<(String, HostValue)> {
        self.inner.read().unwrap().iter().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<HostValue> {
        self.inner.read().unwrap().get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: HostValue) {
        self.inner.write().unwrap().insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An instance of a registered bean class: the class descriptor plus the
/// erased host struct the property accessors operate on.
#[derive(Clone)]
pub struct BeanValue {
    pub class: Arc<BeanClass>,
    instance: Arc<RwLock<Box<dyn Any + Send + Sync>>>,
}

impl BeanValue {
    pub fn new<T: Any + Send + Sync>(class: Arc<BeanClass>, instance: T) -> Self {
        Self {
            class,
            instance: Arc::new(RwLock::new(Box::new(instance))),
        }
    }

    pub(crate) fn from_erased(
        class: Arc<BeanClass>,
        instance: Box<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            class,
            instance: Arc::new(RwLock::new(instance)),
        }
    }

    pub fn identity(&self) -> Identity {
        Arc::as_ptr(&self.instance) as Identity
    }

    /// Reads the typed instance. Returns `None` if `T` is not the
    /// registered host type.
    pub fn with<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.instance.read().unwrap();
        guard.as_ref().downcast_ref::<T>().map(f)
    }

    /// Mutates the typed instance. Returns `None` if `T` is not the
    /// registered host type.
    pub fn with_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.instance.write().unwrap();
        guard.as_mut().downcast_mut::<T>().map(f)
    }

    pub(crate) fn read_erased(&self) -> std::sync::RwLockReadGuard<'_, Box<dyn Any + Send + Sync>> {
        self.instance.read().unwrap()
    }

    pub(crate) fn write_erased(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, Box<dyn Any + Send + Sync>> {
        self.instance.write().unwrap()
    }
}

/// An already-JSON subtree carried through the value model. Marshalling
/// re-walks its children so graph tracking still sees them.
#[derive(Clone)]
pub struct RawValue {
    inner: Arc<Value>,
}

impl RawValue {
    pub fn new(value: Value) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    pub fn identity(&self) -> Identity {
        Arc::as_ptr(&self.inner) as Identity
    }

    pub fn json(&self) -> &Value {
        &self.inner
    }
}

/// An instance of a class registered on the bridge as a (callable)
/// reference. Never marshalled by value; the reference serializer turns it
/// into an opaque `objectID` handle.
#[derive(Clone)]
pub struct OpaqueValue {
    pub class: String,
    instance: Arc<dyn Any + Send + Sync>,
}

impl OpaqueValue {
    pub fn new<T: Any + Send + Sync>(class: impl Into<String>, instance: T) -> Self {
        Self {
            class: class.into(),
            instance: Arc::new(instance),
        }
    }

    pub fn identity(&self) -> Identity {
        Arc::as_ptr(&self.instance) as *const () as Identity
    }

    pub fn downcast<T: Any>(&self) -> Option<&T> {
        self.instance.downcast_ref::<T>()
    }
}
