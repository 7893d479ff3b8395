use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::RequestId;

/// A bridge request: a dotted method path, an optional correlation id and a
/// positional argument array.
///
/// The argument array here is the raw wire form; fixup and flat-token
/// resolution happen in the serializer's request parsers, not in this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            id: Some(id.into()),
            params,
        }
    }

    /// A request with no arguments.
    pub fn no_params(id: impl Into<RequestId>, method: impl Into<String>) -> Self {
        Self::new(id, method, Vec::new())
    }

    pub fn param(&self, index: usize) -> Option<&Value> {
        self.params.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_roundtrip() {
        let request = RpcRequest::new(1, "test.echo", vec![json!("hello")]);
        let text = serde_json::to_string(&request).unwrap();
        let parsed: RpcRequest = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.method, "test.echo");
        assert_eq!(parsed.id, Some(RequestId::Number(1)));
        assert_eq!(parsed.param(0), Some(&json!("hello")));
    }

    #[test]
    fn params_default_to_empty() {
        let parsed: RpcRequest =
            serde_json::from_str(r#"{"method":"system.listMethods","id":4}"#).unwrap();
        assert!(parsed.params.is_empty());
    }
}
