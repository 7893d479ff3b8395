//! # JSON-RPC Wire Types for the Arbor Object Bridge
//!
//! Message shapes shared by the bridge (server side) and the client:
//! requests, the result hierarchy, the bridge error codes, and the fixup
//! path encoding used to reconstruct shared and cyclic object graphs.
//!
//! This crate is deliberately transport-free: it knows nothing about HTTP,
//! sessions, or streaming. A result renders itself to a `serde_json::Value`
//! (optionally carrying a `serverURL` redirect) and that is where this
//! crate's responsibility ends.

pub mod error;
pub mod fixup;
pub mod request;
pub mod response;
pub mod types;

pub use error::{ErrorObject, error_codes, error_messages};
pub use fixup::{Fixup, PathComponent};
pub use request::RpcRequest;
pub use response::{
    FailedResult, FixupsResult, FlatResult, RemoteFailedResult, RpcResult, SuccessResult,
};
pub use types::RequestId;

/// Field holding the encoded method name in a request.
pub const METHOD_FIELD: &str = "method";
/// Field holding the request/response correlation id.
pub const ID_FIELD: &str = "id";
/// Field holding the positional argument array in a request.
pub const PARAMS_FIELD: &str = "params";
/// Field holding the payload of a successful response.
pub const RESULT_FIELD: &str = "result";
/// Field holding the error object of a failed response.
pub const ERROR_FIELD: &str = "error";
/// Field holding fixup instructions alongside `params` or `result`.
pub const FIXUPS_FIELD: &str = "fixups";
/// Optional field instructing the client to switch endpoints.
pub const SERVER_URL_FIELD: &str = "serverURL";
