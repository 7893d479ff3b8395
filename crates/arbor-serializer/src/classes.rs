use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{MarshalError, UnmarshalError};
use crate::types::{DateKind, TypeDesc};
use crate::value::{BeanValue, HostValue};

type Erased = dyn Any + Send + Sync;
type Constructor = Box<dyn Fn() -> Box<Erased> + Send + Sync>;
type Getter = Box<dyn Fn(&Erased) -> Result<HostValue, MarshalError> + Send + Sync>;
type Setter = Box<dyn Fn(&mut Erased, HostValue) -> Result<(), UnmarshalError> + Send + Sync>;

/// One registered property of a bean class: its declared type plus the
/// accessors that bridge between the erased host struct and the value
/// model. A property may be read-only or write-only.
pub struct BeanProperty {
    name: String,
    ty: TypeDesc,
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl BeanProperty {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeDesc {
        &self.ty
    }

    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    pub fn read(&self, instance: &Erased) -> Result<HostValue, MarshalError> {
        match &self.getter {
            Some(getter) => getter(instance),
            None => Err(MarshalError::custom(format!(
                "property {} is not readable",
                self.name
            ))),
        }
    }

    pub fn write(&self, instance: &mut Erased, value: HostValue) -> Result<(), UnmarshalError> {
        match &self.setter {
            Some(setter) => setter(instance, value),
            None => Err(UnmarshalError::custom(format!(
                "property {} is not writable",
                self.name
            ))),
        }
    }
}

/// Descriptor of a host type exposed on the wire as a bean. Built once
/// through [`BeanClassBuilder`]; registration replaces the reflection-time
/// analysis the protocol's original runtime performed.
pub struct BeanClass {
    name: String,
    safe_for_dispatch: bool,
    constructor: Option<Constructor>,
    properties: Vec<BeanProperty>,
}

impl BeanClass {
    pub fn builder<T: Any + Send + Sync>(name: impl Into<String>) -> BeanClassBuilder<T> {
        BeanClassBuilder {
            name: name.into(),
            safe_for_dispatch: false,
            constructor: None,
            properties: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this class may be named in a `javaClass` hint without being
    /// on the resolver's allow-list.
    pub fn safe_for_dispatch(&self) -> bool {
        self.safe_for_dispatch
    }

    pub fn properties(&self) -> &[BeanProperty] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&BeanProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }

    /// Creates a fresh instance through the registered constructor.
    pub fn instantiate(self: &Arc<Self>) -> Result<BeanValue, UnmarshalError> {
        match &self.constructor {
            Some(ctor) => Ok(BeanValue::from_erased(self.clone(), ctor())),
            None => Err(UnmarshalError::NoConstructor(self.name.clone())),
        }
    }
}

/// Typed builder for a [`BeanClass`]. The closures here operate on the
/// concrete host type; erasure to `dyn Any` happens inside the builder so
/// user code never sees a downcast.
pub struct BeanClassBuilder<T> {
    name: String,
    safe_for_dispatch: bool,
    constructor: Option<Constructor>,
    properties: Vec<BeanProperty>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> BeanClassBuilder<T> {
    /// Registers the no-argument constructor. Without one the class can be
    /// marshalled but not unmarshalled.
    pub fn constructor(mut self, ctor: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.constructor = Some(Box::new(move || Box::new(ctor())));
        self
    }

    pub fn safe_for_dispatch(mut self, safe: bool) -> Self {
        self.safe_for_dispatch = safe;
        self
    }

    /// Declares a read/write property.
    pub fn property(
        self,
        name: impl Into<String>,
        ty: TypeDesc,
        get: impl Fn(&T) -> HostValue + Send + Sync + 'static,
        set: impl Fn(&mut T, HostValue) -> Result<(), UnmarshalError> + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        self.push_property(name, ty, Some(get), Some(set))
    }

    /// Declares a property visible in marshalled output but ignored on
    /// unmarshal.
    pub fn read_only(
        self,
        name: impl Into<String>,
        ty: TypeDesc,
        get: impl Fn(&T) -> HostValue + Send + Sync + 'static,
    ) -> Self {
        self.push_property(
            name.into(),
            ty,
            Some(get),
            None::<fn(&mut T, HostValue) -> Result<(), UnmarshalError>>,
        )
    }

    fn push_property(
        mut self,
        name: String,
        ty: TypeDesc,
        get: Option<impl Fn(&T) -> HostValue + Send + Sync + 'static>,
        set: Option<impl Fn(&mut T, HostValue) -> Result<(), UnmarshalError> + Send + Sync + 'static>,
    ) -> Self {
        let class = self.name.clone();
        let getter: Option<Getter> = get.map(|get| {
            let class = class.clone();
            Box::new(move |erased: &Erased| {
                let typed = erased
                    .downcast_ref::<T>()
                    .ok_or_else(|| MarshalError::WrongInstanceType(class.clone()))?;
                Ok(get(typed))
            }) as Getter
        });
        let setter: Option<Setter> = set.map(|set| {
            let class = class.clone();
            Box::new(move |erased: &mut Erased, value: HostValue| {
                let typed = erased
                    .downcast_mut::<T>()
                    .ok_or_else(|| UnmarshalError::WrongInstanceType(class.clone()))?;
                set(typed, value)
            }) as Setter
        });
        self.properties.push(BeanProperty {
            name,
            ty,
            getter,
            setter,
        });
        self
    }

    pub fn build(self) -> Arc<BeanClass> {
        Arc::new(BeanClass {
            name: self.name,
            safe_for_dispatch: self.safe_for_dispatch,
            constructor: self.constructor,
            properties: self.properties,
        })
    }
}

/// Descriptor of an enum exposed on the wire by constant name.
pub struct EnumClass {
    name: String,
    safe_for_dispatch: bool,
    constants: Vec<String>,
}

impl EnumClass {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        constants: impl IntoIterator<Item = S>,
    ) -> Arc<EnumClass> {
        Arc::new(EnumClass {
            name: name.into(),
            safe_for_dispatch: false,
            constants: constants.into_iter().map(Into::into).collect(),
        })
    }

    pub fn new_safe<S: Into<String>>(
        name: impl Into<String>,
        constants: impl IntoIterator<Item = S>,
    ) -> Arc<EnumClass> {
        Arc::new(EnumClass {
            name: name.into(),
            safe_for_dispatch: true,
            constants: constants.into_iter().map(Into::into).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn safe_for_dispatch(&self) -> bool {
        self.safe_for_dispatch
    }

    pub fn constants(&self) -> &[String] {
        &self.constants
    }

    pub fn has_constant(&self, constant: &str) -> bool {
        self.constants.iter().any(|c| c == constant)
    }
}

/// What a wire class name resolved to.
#[derive(Clone)]
pub enum ResolvedClass {
    Bean(Arc<BeanClass>),
    Enum(Arc<EnumClass>),
    List(&'static str),
    Set(&'static str),
    Map(&'static str),
    Date(DateKind),
    Reference(String),
}

impl ResolvedClass {
    pub fn type_desc(&self) -> TypeDesc {
        match self {
            ResolvedClass::Bean(class) => TypeDesc::Bean(class.name().to_string()),
            ResolvedClass::Enum(class) => TypeDesc::Enum(class.name().to_string()),
            ResolvedClass::List(name) => TypeDesc::List(name.to_string()),
            ResolvedClass::Set(name) => TypeDesc::Set(name.to_string()),
            ResolvedClass::Map(name) => TypeDesc::Map(name.to_string()),
            ResolvedClass::Date(kind) => TypeDesc::Date(*kind),
            ResolvedClass::Reference(name) => TypeDesc::Reference(name.clone()),
        }
    }

    /// Built-in containers and explicitly registered reference classes are
    /// implicitly safe; beans and enums carry their own flag.
    pub fn safe_for_dispatch(&self) -> bool {
        match self {
            ResolvedClass::Bean(class) => class.safe_for_dispatch(),
            ResolvedClass::Enum(class) => class.safe_for_dispatch(),
            _ => true,
        }
    }
}

/// Wire class names accepted for list payloads.
pub const LIST_CLASSES: &[&str] = &[
    "java.util.List",
    "java.util.AbstractList",
    "java.util.ArrayList",
    "java.util.LinkedList",
    "java.util.Vector",
];

/// Wire class names accepted for set payloads.
pub const SET_CLASSES: &[&str] = &[
    "java.util.Set",
    "java.util.AbstractSet",
    "java.util.HashSet",
    "java.util.LinkedHashSet",
    "java.util.TreeSet",
];

/// Wire class names accepted for map payloads. The trailing entries are the
/// legacy dictionary types the original handled in a separate serializer.
pub const MAP_CLASSES: &[&str] = &[
    "java.util.Map",
    "java.util.AbstractMap",
    "java.util.HashMap",
    "java.util.LinkedHashMap",
    "java.util.TreeMap",
    "java.util.Hashtable",
    "java.util.Dictionary",
];

/// The bridge-scoped registry of wire class names: registered beans and
/// enums, bridge reference classes, and the built-in container and date
/// names. The generation counter lets the resolver drop its negative cache
/// when the registry changes.
pub struct ClassRegistry {
    beans: RwLock<HashMap<String, Arc<BeanClass>>>,
    enums: RwLock<HashMap<String, Arc<EnumClass>>>,
    references: RwLock<HashMap<String, ()>>,
    generation: AtomicU64,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self {
            beans: RwLock::new(HashMap::new()),
            enums: RwLock::new(HashMap::new()),
            references: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn register_bean(&self, class: Arc<BeanClass>) {
        debug!(class = class.name(), "registered bean class");
        self.beans
            .write()
            .unwrap()
            .insert(class.name().to_string(), class);
        self.bump();
    }

    pub fn register_enum(&self, class: Arc<EnumClass>) {
        debug!(class = class.name(), "registered enum class");
        self.enums
            .write()
            .unwrap()
            .insert(class.name().to_string(), class);
        self.bump();
    }

    /// Marks a class name as a bridge reference type so hints naming it
    /// resolve to an opaque handle type.
    pub fn register_reference_class(&self, name: &str) {
        self.references
            .write()
            .unwrap()
            .insert(name.to_string(), ());
        self.bump();
    }

    pub fn bean(&self, name: &str) -> Option<Arc<BeanClass>> {
        self.beans.read().unwrap().get(name).cloned()
    }

    pub fn enum_class(&self, name: &str) -> Option<Arc<EnumClass>> {
        self.enums.read().unwrap().get(name).cloned()
    }

    /// Looks a wire class name up across every namespace the registry
    /// knows: references first (they shadow value classes on the bridge),
    /// then beans, enums and the built-ins.
    pub fn lookup(&self, name: &str) -> Option<ResolvedClass> {
        if self.references.read().unwrap().contains_key(name) {
            return Some(ResolvedClass::Reference(name.to_string()));
        }
        if let Some(bean) = self.bean(name) {
            return Some(ResolvedClass::Bean(bean));
        }
        if let Some(class) = self.enum_class(name) {
            return Some(ResolvedClass::Enum(class));
        }
        if let Some(kind) = DateKind::from_wire_class(name) {
            return Some(ResolvedClass::Date(kind));
        }
        if let Some(known) = LIST_CLASSES.iter().find(|c| **c == name) {
            return Some(ResolvedClass::List(known));
        }
        if let Some(known) = SET_CLASSES.iter().find(|c| **c == name) {
            return Some(ResolvedClass::Set(known));
        }
        if let Some(known) = MAP_CLASSES.iter().find(|c| **c == name) {
            return Some(ResolvedClass::Map(known));
        }
        None
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Widget {
        label: String,
    }

    fn widget_class() -> Arc<BeanClass> {
        BeanClass::builder::<Widget>("com.example.Widget")
            .constructor(Widget::default)
            .property(
                "label",
                TypeDesc::String,
                |w| HostValue::from(w.label.clone()),
                |w, v| {
                    w.label = v.as_str().unwrap_or_default().to_string();
                    Ok(())
                },
            )
            .build()
    }

    #[test]
    fn bean_builder_roundtrip() {
        let class = widget_class();
        let bean = class.instantiate().unwrap();
        let prop = class.property("label").unwrap();
        {
            let mut guard = bean.write_erased();
            prop.write(guard.as_mut(), HostValue::from("hello")).unwrap();
        }
        let read = {
            let guard = bean.read_erased();
            prop.read(guard.as_ref()).unwrap()
        };
        assert_eq!(read.as_str(), Some("hello"));
        assert_eq!(bean.with(|w: &Widget| w.label.clone()), Some("hello".to_string()));
    }

    #[test]
    fn missing_constructor_fails_instantiation() {
        let class = BeanClass::builder::<Widget>("com.example.NoCtor").build();
        assert!(class.instantiate().is_err());
    }

    #[test]
    fn registry_lookup_namespaces() {
        let registry = ClassRegistry::new();
        registry.register_bean(widget_class());
        registry.register_enum(EnumClass::new("com.example.Color", ["RED", "GREEN"]));

        assert!(matches!(
            registry.lookup("com.example.Widget"),
            Some(ResolvedClass::Bean(_))
        ));
        assert!(matches!(
            registry.lookup("com.example.Color"),
            Some(ResolvedClass::Enum(_))
        ));
        assert!(matches!(
            registry.lookup("java.util.HashMap"),
            Some(ResolvedClass::Map("java.util.HashMap"))
        ));
        assert!(matches!(
            registry.lookup("java.util.Hashtable"),
            Some(ResolvedClass::Map(_))
        ));
        assert!(registry.lookup("com.example.Missing").is_none());
    }

    #[test]
    fn generation_bumps_on_registration() {
        let registry = ClassRegistry::new();
        let before = registry.generation();
        registry.register_enum(EnumClass::new("com.example.E", ["A"]));
        assert!(registry.generation() > before);
    }
}
