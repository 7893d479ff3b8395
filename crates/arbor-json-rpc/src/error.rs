use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bridge failure codes. These are fixed protocol values; clients key
/// retry/reporting behavior off them.
pub mod error_codes {
    /// The request could not be parsed at all.
    pub const ERR_PARSE: i64 = 590;
    /// No method matched the requested name and argument count.
    pub const ERR_NO_METHOD: i64 = 591;
    /// An argument could not be unmarshalled for the resolved method.
    pub const ERR_UNMARSHAL: i64 = 592;
    /// The return value could not be marshalled.
    pub const ERR_MARSHAL: i64 = 593;
    /// No constructor matched, or fixup data in the request was invalid.
    pub const ERR_NO_CONSTRUCTOR: i64 = 594;
    /// Alias of [`ERR_NO_CONSTRUCTOR`] for fixup application failures.
    pub const ERR_FIXUP: i64 = 594;
    /// The invoked method itself raised an error.
    pub const ERR_REMOTE: i64 = 490;
}

/// Canonical messages paired with the fixed codes.
pub mod error_messages {
    pub const MSG_ERR_PARSE: &str = "couldn't parse request arguments";
    pub const MSG_ERR_NO_METHOD: &str =
        "method with the requested number of arguments not found (session may have timed out)";
    pub const MSG_ERR_NO_CONSTRUCTOR: &str = "constructor not found";
    pub const MSG_ERR_FIXUP: &str = "invalid or unexpected data in fixups";
}

/// The `error` member of a failed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(error_codes::ERR_PARSE, error_messages::MSG_ERR_PARSE, None)
    }

    pub fn no_method() -> Self {
        Self::new(
            error_codes::ERR_NO_METHOD,
            error_messages::MSG_ERR_NO_METHOD,
            None,
        )
    }

    pub fn no_constructor() -> Self {
        Self::new(
            error_codes::ERR_NO_CONSTRUCTOR,
            error_messages::MSG_ERR_NO_CONSTRUCTOR,
            None,
        )
    }

    pub fn unmarshal(message: impl Into<String>) -> Self {
        Self::new(error_codes::ERR_UNMARSHAL, message, None)
    }

    pub fn marshal(message: impl Into<String>) -> Self {
        Self::new(error_codes::ERR_MARSHAL, message, None)
    }

    pub fn fixup(message: impl Into<String>) -> Self {
        Self::new(error_codes::ERR_FIXUP, message, None)
    }

    pub fn to_value(&self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert("code".to_string(), Value::from(self.code));
        obj.insert("message".to_string(), Value::String(self.message.clone()));
        if let Some(data) = &self.data {
            obj.insert("data".to_string(), data.clone());
        }
        Value::Object(obj)
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_codes() {
        assert_eq!(ErrorObject::parse_error().code, 590);
        assert_eq!(ErrorObject::no_method().code, 591);
        assert_eq!(ErrorObject::no_constructor().code, 594);
        assert_eq!(ErrorObject::unmarshal("x").code, 592);
        assert_eq!(ErrorObject::marshal("x").code, 593);
    }

    #[test]
    fn data_omitted_when_absent() {
        let value = ErrorObject::no_method().to_value();
        assert!(value.get("data").is_none());
        assert!(value.get("message").is_some());
    }
}
