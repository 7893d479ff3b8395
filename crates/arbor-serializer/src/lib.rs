//! # Arbor Serialization Engine
//!
//! The type-driven (de)serialization core of the arbor bridge: a registry
//! of per-kind serializers that walk arbitrary host value graphs to and
//! from JSON, a per-call graph state that detects duplicate and circular
//! structure and emits/consumes fixup instructions, the request parsers
//! for the nested and flat wire forms, and the security-gated class
//! resolver consulted for `javaClass` hints.
//!
//! ## Architecture
//!
//! - [`HostValue`] is the dynamic value model; composites share their
//!   payload through an `Arc`, which is what makes identity (and therefore
//!   cycles and duplicates) observable.
//! - [`JsonSerializer`] routes values through the ordered serializer list;
//!   [`SerializerState`] is the per-invocation scratchpad.
//! - [`ClassResolver`] decides which wire class names may be instantiated
//!   at all; everything else fails unmarshalling.

pub mod classes;
pub mod error;
pub mod object_match;
pub mod request;
pub mod resolver;
pub mod ser;
pub mod state;
pub mod types;
pub mod value;

pub use classes::{BeanClass, BeanClassBuilder, BeanProperty, ClassRegistry, EnumClass, ResolvedClass};
pub use error::{MarshalError, MarshalResult, UnmarshalError, UnmarshalResult};
pub use object_match::ObjectMatch;
pub use request::{FlatRequestParser, NestedRequestParser, ParsedArguments, RequestParser};
pub use resolver::ClassResolver;
pub use ser::{JsonSerializer, ReferenceBroker, ReferenceSerializer, Serializer};
pub use state::{FixupPolicy, OutputMode, SerializerState, Visit};
pub use types::{DateKind, JsonKind, SourceKind, TypeDesc};
pub use value::{
    ArrayValue, BeanValue, DateValue, EnumValue, HostValue, Identity, ListValue, MapEntries,
    MapValue, OpaqueValue, RawValue, SetValue,
};

/// Field naming the source type of a marshalled complex value.
pub const JAVA_CLASS_FIELD: &str = "javaClass";
/// Payload field of a marshalled list.
pub const LIST_FIELD: &str = "list";
/// Payload field of a marshalled set.
pub const SET_FIELD: &str = "set";
/// Payload field of a marshalled map.
pub const MAP_FIELD: &str = "map";
/// Epoch-milliseconds field of a marshalled date.
pub const TIME_FIELD: &str = "time";
/// Discriminator field of a reference handle.
pub const JSON_RPC_TYPE_FIELD: &str = "JSONRPCType";
/// Identity field of a reference handle.
pub const OBJECT_ID_FIELD: &str = "objectID";
