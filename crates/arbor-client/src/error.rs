use serde_json::Value;
use thiserror::Error;

use arbor_serializer::{MarshalError, UnmarshalError};

pub type ClientResult<T> = Result<T, ClientError>;

/// Failure on the client side of a call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with an error object.
    #[error("remote error {code}: {message}")]
    Remote {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("no transport registered for scheme {0}")]
    UnknownScheme(String),

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error(transparent)]
    Unmarshal(#[from] UnmarshalError),
}

impl ClientError {
    pub fn transport(message: impl Into<String>) -> Self {
        ClientError::Transport(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        ClientError::MalformedResponse(message.into())
    }
}
