use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// One step of a location path inside a marshalled tree.
///
/// `Field` addresses an object member (bean property or wrapper key such as
/// `"list"`), `Index` an array position, `BucketKey` a map key. `Field` and
/// `BucketKey` both encode as JSON strings; `Index` encodes as a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathComponent {
    Field(String),
    Index(usize),
    BucketKey(String),
}

impl PathComponent {
    pub fn to_value(&self) -> Value {
        match self {
            PathComponent::Field(name) => Value::String(name.clone()),
            PathComponent::Index(i) => Value::from(*i),
            PathComponent::BucketKey(key) => Value::String(key.clone()),
        }
    }

    /// Decodes a wire path component. Strings decode as `Field`; the
    /// field/bucket distinction is not recoverable from the wire and does
    /// not matter for path application.
    pub fn from_value(value: &Value) -> Result<PathComponent, FixupDecodeError> {
        match value {
            Value::String(s) => Ok(PathComponent::Field(s.clone())),
            Value::Number(n) => n
                .as_u64()
                .map(|i| PathComponent::Index(i as usize))
                .ok_or(FixupDecodeError::BadComponent),
            _ => Err(FixupDecodeError::BadComponent),
        }
    }

    /// Wire components compare by their encoded form, so a `Field` and a
    /// `BucketKey` with the same name address the same slot.
    pub fn same_slot(&self, other: &PathComponent) -> bool {
        match (self, other) {
            (PathComponent::Index(a), PathComponent::Index(b)) => a == b,
            (PathComponent::Index(_), _) | (_, PathComponent::Index(_)) => false,
            (a, b) => a.as_key() == b.as_key(),
        }
    }

    fn as_key(&self) -> Option<&str> {
        match self {
            PathComponent::Field(s) | PathComponent::BucketKey(s) => Some(s),
            PathComponent::Index(_) => None,
        }
    }
}

impl fmt::Display for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathComponent::Field(name) => write!(f, ".{}", name),
            PathComponent::Index(i) => write!(f, "[{}]", i),
            PathComponent::BucketKey(key) => write!(f, "[\"{}\"]", key),
        }
    }
}

#[derive(Debug, Error)]
pub enum FixupDecodeError {
    #[error("fixup entry is not a pair of path arrays")]
    BadEntry,
    #[error("fixup path component is not a string or index")]
    BadComponent,
}

/// A wire-side instruction: the value at `original` must also appear at
/// `location`. Encoded as `[locationPath, originalPath]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixup {
    /// Where the duplicate slot is.
    pub location: Vec<PathComponent>,
    /// Where the canonical value was first emitted.
    pub original: Vec<PathComponent>,
}

impl Fixup {
    pub fn new(location: Vec<PathComponent>, original: Vec<PathComponent>) -> Self {
        Self { location, original }
    }

    pub fn to_value(&self) -> Value {
        Value::Array(vec![
            Value::Array(self.location.iter().map(PathComponent::to_value).collect()),
            Value::Array(self.original.iter().map(PathComponent::to_value).collect()),
        ])
    }

    pub fn from_value(value: &Value) -> Result<Fixup, FixupDecodeError> {
        let pair = value.as_array().ok_or(FixupDecodeError::BadEntry)?;
        if pair.len() != 2 {
            return Err(FixupDecodeError::BadEntry);
        }
        Ok(Fixup {
            location: decode_path(&pair[0])?,
            original: decode_path(&pair[1])?,
        })
    }
}

fn decode_path(value: &Value) -> Result<Vec<PathComponent>, FixupDecodeError> {
    value
        .as_array()
        .ok_or(FixupDecodeError::BadEntry)?
        .iter()
        .map(PathComponent::from_value)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roundtrip_encoding() {
        let fixup = Fixup::new(
            vec![
                PathComponent::Field("result".to_string()),
                PathComponent::Field("beanB".to_string()),
                PathComponent::Field("beanA".to_string()),
            ],
            vec![PathComponent::Field("result".to_string())],
        );
        let encoded = fixup.to_value();
        assert_eq!(encoded, json!([["result", "beanB", "beanA"], ["result"]]));
        assert_eq!(Fixup::from_value(&encoded).unwrap(), fixup);
    }

    #[test]
    fn index_components_encode_as_numbers() {
        let fixup = Fixup::new(
            vec![
                PathComponent::Field("result".to_string()),
                PathComponent::Index(2),
            ],
            vec![
                PathComponent::Field("result".to_string()),
                PathComponent::Index(0),
            ],
        );
        assert_eq!(fixup.to_value(), json!([["result", 2], ["result", 0]]));
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(Fixup::from_value(&json!([["a"]])).is_err());
        assert!(Fixup::from_value(&json!([["a"], [true]])).is_err());
        assert!(Fixup::from_value(&json!({"a": 1})).is_err());
    }

    #[test]
    fn bucket_and_field_address_the_same_slot() {
        assert!(PathComponent::Field("k".to_string())
            .same_slot(&PathComponent::BucketKey("k".to_string())));
        assert!(!PathComponent::Field("k".to_string()).same_slot(&PathComponent::Index(0)));
    }
}
