use serde_json::Value;
use thiserror::Error;

/// Failure raised by an invoked method (or a callback observing it).
/// Everything the bridge reports with code 490 goes through this type.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("{0}")]
    Failed(String),

    #[error("{0}")]
    Source(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl InvokeError {
    pub fn new(message: impl Into<String>) -> Self {
        InvokeError::Failed(message.into())
    }
}

impl From<String> for InvokeError {
    fn from(message: String) -> Self {
        InvokeError::Failed(message)
    }
}

impl From<&str> for InvokeError {
    fn from(message: &str) -> Self {
        InvokeError::Failed(message.to_string())
    }
}

pub type InvokeResult<T> = Result<T, InvokeError>;

/// Renders an invocation error into the `message` and `data` members of a
/// remote-failure response. The default keeps the message and emits no
/// data; stack detail never crosses the wire.
pub trait ExceptionTransformer: Send + Sync {
    fn transform(&self, error: &InvokeError) -> (String, Option<Value>);
}

/// The identity transformer: message only, no data.
pub struct IdentityExceptionTransformer;

impl ExceptionTransformer for IdentityExceptionTransformer {
    fn transform(&self, error: &InvokeError) -> (String, Option<Value>) {
        (error.to_string(), None)
    }
}
