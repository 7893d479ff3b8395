//! Request parsers: extract the `params` (or `result`) subtree from a
//! message in either wire form.
//!
//! A `serde_json::Value` tree cannot alias or cycle, so neither parser
//! applies fixups by copying subtrees. Instead both produce an alias table
//! (target path → canonical path) that the unmarshal state resolves while
//! descending, which is what reconstructs shared and cyclic structure with
//! identity intact.

use std::collections::HashMap;

use arbor_json_rpc::{Fixup, PathComponent, FIXUPS_FIELD};
use serde_json::{Map, Value};

use crate::error::{UnmarshalError, UnmarshalResult};

/// Alias table entry: the value at `.1` also appears at `.0`.
pub type Alias = (Vec<PathComponent>, Vec<PathComponent>);

/// A parsed argument array plus the aliases that apply beneath it.
#[derive(Debug)]
pub struct ParsedArguments {
    pub args: Vec<Value>,
    pub aliases: Vec<Alias>,
}

/// Reads the `params`/`result` subtree of a message. The variant in use
/// must agree with the serializer output mode on the same bridge.
pub trait RequestParser: Send + Sync {
    /// Extracts the positional argument array stored under `field`.
    fn parse_arguments(&self, message: &Map<String, Value>, field: &str)
        -> UnmarshalResult<ParsedArguments>;

    /// Extracts a single value stored under `field` (the response path on
    /// the client side), with the aliases that apply beneath it.
    fn parse_value(
        &self,
        message: &Map<String, Value>,
        field: &str,
    ) -> UnmarshalResult<(Value, Vec<Alias>)>;
}

/// Parser for the nested wire form: `params` holds the tree directly and a
/// top-level `fixups` array carries the sharing instructions.
pub struct NestedRequestParser;

impl RequestParser for NestedRequestParser {
    fn parse_arguments(
        &self,
        message: &Map<String, Value>,
        field: &str,
    ) -> UnmarshalResult<ParsedArguments> {
        let args = match message.get(field) {
            Some(Value::Array(args)) => args.clone(),
            Some(other) => return Err(UnmarshalError::wrong_kind("argument array", other)),
            None => Vec::new(),
        };
        Ok(ParsedArguments {
            args,
            aliases: decode_fixups(message)?,
        })
    }

    fn parse_value(
        &self,
        message: &Map<String, Value>,
        field: &str,
    ) -> UnmarshalResult<(Value, Vec<Alias>)> {
        let value = message.get(field).cloned().unwrap_or(Value::Null);
        Ok((value, decode_fixups(message)?))
    }
}

fn decode_fixups(message: &Map<String, Value>) -> UnmarshalResult<Vec<Alias>> {
    let Some(raw) = message.get(FIXUPS_FIELD) else {
        return Ok(Vec::new());
    };
    let entries = raw
        .as_array()
        .ok_or_else(|| UnmarshalError::BadFixups("fixups is not an array".to_string()))?;
    let mut aliases = Vec::with_capacity(entries.len());
    for entry in entries {
        let fixup =
            Fixup::from_value(entry).map_err(|e| UnmarshalError::BadFixups(e.to_string()))?;
        if fixup.location.is_empty() || fixup.original.is_empty() {
            return Err(UnmarshalError::BadFixups("empty fixup path".to_string()));
        }
        aliases.push((fixup.location, fixup.original));
    }
    Ok(aliases)
}

/// Parser for the flat wire form: complex objects live under top-level
/// `_n` keys and positions referring to them hold the token string. Each
/// object is inlined at its first use; every later (or cyclic) use becomes
/// an alias onto that first position.
pub struct FlatRequestParser;

impl RequestParser for FlatRequestParser {
    fn parse_arguments(
        &self,
        message: &Map<String, Value>,
        field: &str,
    ) -> UnmarshalResult<ParsedArguments> {
        let args = match message.get(field) {
            Some(Value::Array(args)) => args,
            Some(other) => return Err(UnmarshalError::wrong_kind("argument array", other)),
            None => {
                return Ok(ParsedArguments {
                    args: Vec::new(),
                    aliases: Vec::new(),
                })
            }
        };
        let mut expansion = FlatExpansion::new(message);
        let root = vec![PathComponent::Field(field.to_string())];
        let mut out = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            let mut path = root.clone();
            path.push(PathComponent::Index(index));
            out.push(expansion.expand(arg, path)?);
        }
        Ok(ParsedArguments {
            args: out,
            aliases: expansion.aliases,
        })
    }

    fn parse_value(
        &self,
        message: &Map<String, Value>,
        field: &str,
    ) -> UnmarshalResult<(Value, Vec<Alias>)> {
        let value = message.get(field).cloned().unwrap_or(Value::Null);
        let mut expansion = FlatExpansion::new(message);
        let expanded = expansion.expand(&value, vec![PathComponent::Field(field.to_string())])?;
        Ok((expanded, expansion.aliases))
    }
}

/// Depth-first expansion of `_n` tokens. The `materialized` map doubles as
/// the visited set: an index is recorded before its object is entered, so
/// a cyclic token resolves to the ancestor's position instead of recursing
/// forever.
struct FlatExpansion<'a> {
    message: &'a Map<String, Value>,
    materialized: HashMap<String, Vec<PathComponent>>,
    aliases: Vec<Alias>,
}

impl<'a> FlatExpansion<'a> {
    fn new(message: &'a Map<String, Value>) -> Self {
        Self {
            message,
            materialized: HashMap::new(),
            aliases: Vec::new(),
        }
    }

    fn expand(&mut self, value: &Value, path: Vec<PathComponent>) -> UnmarshalResult<Value> {
        match value {
            Value::String(s) if is_object_index(s) => {
                if let Some(first) = self.materialized.get(s) {
                    self.aliases.push((path, first.clone()));
                    return Ok(Value::Null);
                }
                let object = self.message.get(s.as_str()).ok_or_else(|| {
                    UnmarshalError::BadFixups(format!("no top-level object for index {}", s))
                })?;
                self.materialized.insert(s.clone(), path.clone());
                self.expand(object, path)
            }
            Value::Object(obj) => {
                let mut out = Map::new();
                for (key, child) in obj {
                    let mut child_path = path.clone();
                    child_path.push(PathComponent::Field(key.clone()));
                    out.insert(key.clone(), self.expand(child, child_path)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(arr) => {
                let mut out = Vec::with_capacity(arr.len());
                for (index, child) in arr.iter().enumerate() {
                    let mut child_path = path.clone();
                    child_path.push(PathComponent::Index(index));
                    out.push(self.expand(child, child_path)?);
                }
                Ok(Value::Array(out))
            }
            scalar => Ok(scalar.clone()),
        }
    }
}

/// An index token is an underscore followed by digits. Other strings are
/// ordinary values.
fn is_object_index(s: &str) -> bool {
    s.len() > 1 && s.starts_with('_') && s[1..].bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(name: &str) -> PathComponent {
        PathComponent::Field(name.to_string())
    }

    fn message(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn nested_parser_reads_params_and_fixups() {
        let msg = message(json!({
            "method": "test.echo",
            "id": 1,
            "params": [{"a": 1}, null],
            "fixups": [[["params", 1], ["params", 0]]]
        }));
        let parsed = NestedRequestParser.parse_arguments(&msg, "params").unwrap();
        assert_eq!(parsed.args.len(), 2);
        assert_eq!(
            parsed.aliases,
            vec![(
                vec![field("params"), PathComponent::Index(1)],
                vec![field("params"), PathComponent::Index(0)]
            )]
        );
    }

    #[test]
    fn nested_parser_rejects_malformed_fixups() {
        let msg = message(json!({
            "params": [],
            "fixups": [[["params", 1]]]
        }));
        let err = NestedRequestParser.parse_arguments(&msg, "params").unwrap_err();
        assert!(matches!(err, UnmarshalError::BadFixups(_)));
    }

    #[test]
    fn flat_parser_inlines_first_use() {
        let msg = message(json!({
            "params": ["_1"],
            "_1": {"x": 1}
        }));
        let parsed = FlatRequestParser.parse_arguments(&msg, "params").unwrap();
        assert_eq!(parsed.args, vec![json!({"x": 1})]);
        assert!(parsed.aliases.is_empty());
    }

    #[test]
    fn flat_parser_aliases_repeat_uses() {
        let msg = message(json!({
            "params": ["_1", "_1"],
            "_1": {"x": 1}
        }));
        let parsed = FlatRequestParser.parse_arguments(&msg, "params").unwrap();
        assert_eq!(parsed.args[0], json!({"x": 1}));
        assert_eq!(parsed.args[1], Value::Null);
        assert_eq!(
            parsed.aliases,
            vec![(
                vec![field("params"), PathComponent::Index(1)],
                vec![field("params"), PathComponent::Index(0)]
            )]
        );
    }

    #[test]
    fn flat_parser_handles_cycles() {
        let msg = message(json!({
            "params": ["_1"],
            "_1": {"self": "_1"}
        }));
        let parsed = FlatRequestParser.parse_arguments(&msg, "params").unwrap();
        assert_eq!(parsed.args[0], json!({"self": null}));
        assert_eq!(
            parsed.aliases,
            vec![(
                vec![field("params"), PathComponent::Index(0), field("self")],
                vec![field("params"), PathComponent::Index(0)]
            )]
        );
    }

    #[test]
    fn flat_parser_rejects_dangling_indexes() {
        let msg = message(json!({"params": ["_9"]}));
        assert!(FlatRequestParser.parse_arguments(&msg, "params").is_err());
    }

    #[test]
    fn ordinary_underscore_strings_are_not_tokens() {
        assert!(is_object_index("_1"));
        assert!(is_object_index("_42"));
        assert!(!is_object_index("_"));
        assert!(!is_object_index("_x"));
        assert!(!is_object_index("plain"));
    }

    #[test]
    fn flat_parse_value_expands_result() {
        let msg = message(json!({
            "id": 1,
            "result": "_1",
            "_1": {"foo": "_2"},
            "_2": {"bar": 1}
        }));
        let (value, aliases) = FlatRequestParser.parse_value(&msg, "result").unwrap();
        assert_eq!(value, json!({"foo": {"bar": 1}}));
        assert!(aliases.is_empty());
    }
}
