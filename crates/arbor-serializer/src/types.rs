use serde_json::Value;

/// The JSON-side kind of a wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl JsonKind {
    pub fn of(value: &Value) -> JsonKind {
        match value {
            Value::Null => JsonKind::Null,
            Value::Bool(_) => JsonKind::Bool,
            Value::Number(_) => JsonKind::Number,
            Value::String(_) => JsonKind::String,
            Value::Array(_) => JsonKind::Array,
            Value::Object(_) => JsonKind::Object,
        }
    }
}

/// Source-side category of a host value or declared type. Serializers
/// declare which categories they handle; routing is membership plus the
/// structural overrides of the collection/bean/reference serializers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Bool,
    Number,
    Char,
    String,
    Date,
    Enum,
    Array,
    List,
    Set,
    Map,
    Bean,
    Raw,
    Reference,
}

/// The temporal subtypes the date serializer distinguishes. The wire names
/// are fixed by the protocol's existing client population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    /// `java.util.Date`
    DateTime,
    /// `java.sql.Timestamp`
    Timestamp,
    /// `java.sql.Date`
    Date,
    /// `java.sql.Time`
    Time,
}

impl DateKind {
    pub fn wire_class(&self) -> &'static str {
        match self {
            DateKind::DateTime => "java.util.Date",
            DateKind::Timestamp => "java.sql.Timestamp",
            DateKind::Date => "java.sql.Date",
            DateKind::Time => "java.sql.Time",
        }
    }

    pub fn from_wire_class(name: &str) -> Option<DateKind> {
        match name {
            "java.util.Date" => Some(DateKind::DateTime),
            "java.sql.Timestamp" => Some(DateKind::Timestamp),
            "java.sql.Date" => Some(DateKind::Date),
            "java.sql.Time" => Some(DateKind::Time),
            _ => None,
        }
    }
}

/// Declared expected type for unmarshalling and method signatures.
///
/// `Any` asks the engine to pick the best match itself (hint-driven for
/// objects, lowest-mismatch otherwise). `Context` marks a parameter resolved
/// from the invocation context rather than the wire; it never reaches the
/// serializers.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDesc {
    Any,
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Char,
    String,
    Date(DateKind),
    Enum(String),
    Array(Box<TypeDesc>),
    List(String),
    Set(String),
    Map(String),
    Bean(String),
    Raw,
    Reference(String),
    Context(String),
}

impl TypeDesc {
    pub fn source_kind(&self) -> Option<SourceKind> {
        match self {
            TypeDesc::Any | TypeDesc::Context(_) => None,
            TypeDesc::Bool => Some(SourceKind::Bool),
            TypeDesc::I8 | TypeDesc::I16 | TypeDesc::I32 | TypeDesc::I64 => {
                Some(SourceKind::Number)
            }
            TypeDesc::F32 | TypeDesc::F64 => Some(SourceKind::Number),
            TypeDesc::Char => Some(SourceKind::Char),
            TypeDesc::String => Some(SourceKind::String),
            TypeDesc::Date(_) => Some(SourceKind::Date),
            TypeDesc::Enum(_) => Some(SourceKind::Enum),
            TypeDesc::Array(_) => Some(SourceKind::Array),
            TypeDesc::List(_) => Some(SourceKind::List),
            TypeDesc::Set(_) => Some(SourceKind::Set),
            TypeDesc::Map(_) => Some(SourceKind::Map),
            TypeDesc::Bean(_) => Some(SourceKind::Bean),
            TypeDesc::Raw => Some(SourceKind::Raw),
            TypeDesc::Reference(_) => Some(SourceKind::Reference),
        }
    }

    pub fn is_context(&self) -> bool {
        matches!(self, TypeDesc::Context(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeDesc::I8 | TypeDesc::I16 | TypeDesc::I32 | TypeDesc::I64 | TypeDesc::F32 | TypeDesc::F64
        )
    }

    /// Position in the overload-preference ladder. Lower ranks are more
    /// specific and win signature tie-breaks.
    pub fn primitive_rank(&self) -> Option<u8> {
        match self {
            TypeDesc::I8 => Some(0),
            TypeDesc::I16 => Some(1),
            TypeDesc::I32 => Some(2),
            TypeDesc::I64 => Some(3),
            TypeDesc::F32 => Some(4),
            TypeDesc::F64 => Some(5),
            TypeDesc::Bool => Some(6),
            _ => None,
        }
    }

    /// Whether a value of type `self` could be used where `other` is
    /// declared. Without a type hierarchy this is name equality, `Any` on
    /// the right, or a concrete container against its default interface
    /// name.
    pub fn assignable_to(&self, other: &TypeDesc) -> bool {
        if other == &TypeDesc::Any {
            return true;
        }
        if self == other {
            return true;
        }
        match (self, other) {
            (TypeDesc::List(a), TypeDesc::List(b))
            | (TypeDesc::Set(a), TypeDesc::Set(b))
            | (TypeDesc::Map(a), TypeDesc::Map(b)) => {
                container_interface(other) == Some(b.as_str()) && a != b
            }
            (TypeDesc::Array(a), TypeDesc::Array(b)) => a.assignable_to(b),
            _ => false,
        }
    }
}

fn container_interface(ty: &TypeDesc) -> Option<&'static str> {
    match ty {
        TypeDesc::List(_) => Some("java.util.List"),
        TypeDesc::Set(_) => Some("java.util.Set"),
        TypeDesc::Map(_) => Some("java.util.Map"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_kind_of() {
        assert_eq!(JsonKind::of(&json!(null)), JsonKind::Null);
        assert_eq!(JsonKind::of(&json!(1)), JsonKind::Number);
        assert_eq!(JsonKind::of(&json!("s")), JsonKind::String);
        assert_eq!(JsonKind::of(&json!([])), JsonKind::Array);
        assert_eq!(JsonKind::of(&json!({})), JsonKind::Object);
    }

    #[test]
    fn primitive_ranking_ladder() {
        assert!(TypeDesc::I8.primitive_rank() < TypeDesc::I16.primitive_rank());
        assert!(TypeDesc::I64.primitive_rank() < TypeDesc::F32.primitive_rank());
        assert!(TypeDesc::F64.primitive_rank() < TypeDesc::Bool.primitive_rank());
        assert_eq!(TypeDesc::String.primitive_rank(), None);
    }

    #[test]
    fn concrete_container_assignable_to_interface() {
        let concrete = TypeDesc::List("java.util.ArrayList".to_string());
        let interface = TypeDesc::List("java.util.List".to_string());
        assert!(concrete.assignable_to(&interface));
        assert!(!interface.assignable_to(&concrete));
        assert!(concrete.assignable_to(&TypeDesc::Any));
    }

    #[test]
    fn date_kind_wire_names() {
        assert_eq!(DateKind::Timestamp.wire_class(), "java.sql.Timestamp");
        assert_eq!(
            DateKind::from_wire_class("java.util.Date"),
            Some(DateKind::DateTime)
        );
        assert_eq!(DateKind::from_wire_class("java.time.Instant"), None);
    }
}
