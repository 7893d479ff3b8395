use serde_json::Value;

use crate::error::{error_codes, ErrorObject};
use crate::fixup::Fixup;
use crate::types::RequestId;
use crate::{ERROR_FIELD, FIXUPS_FIELD, ID_FIELD, RESULT_FIELD, SERVER_URL_FIELD};

/// A plain successful response: `{"id":…,"result":…}`.
#[derive(Debug, Clone)]
pub struct SuccessResult {
    pub id: Option<RequestId>,
    pub result: Value,
}

/// A successful response that carries fixup instructions for shared or
/// cyclic subgraphs in `result`.
#[derive(Debug, Clone)]
pub struct FixupsResult {
    pub id: Option<RequestId>,
    pub result: Value,
    pub fixups: Vec<Fixup>,
}

/// A successful response in flat form: `result` is an index token (or a
/// scalar) and every complex object lives under its own top-level `_n` key.
#[derive(Debug, Clone)]
pub struct FlatResult {
    pub id: Option<RequestId>,
    pub result: Value,
    /// `("_1", {...})` pairs in assignment order.
    pub objects: Vec<(String, Value)>,
}

/// A failure produced by the bridge itself (parse, dispatch, marshalling).
#[derive(Debug, Clone)]
pub struct FailedResult {
    pub id: Option<RequestId>,
    pub error: ErrorObject,
}

/// A failure raised by the invoked method. Always code 490; `data` carries
/// whatever the bridge's exception transformer produced.
#[derive(Debug, Clone)]
pub struct RemoteFailedResult {
    pub id: Option<RequestId>,
    pub message: String,
    pub data: Option<Value>,
}

/// Everything the `call` entry point can return. Every variant renders to a
/// well-formed response object; the bridge never lets an error escape as a
/// raw panic or `Err`.
#[derive(Debug, Clone)]
pub enum RpcResult {
    Success(SuccessResult),
    Fixups(FixupsResult),
    Flat(FlatResult),
    Failed(FailedResult),
    RemoteFailed(RemoteFailedResult),
}

impl RpcResult {
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        RpcResult::Success(SuccessResult { id, result })
    }

    pub fn with_fixups(id: Option<RequestId>, result: Value, fixups: Vec<Fixup>) -> Self {
        if fixups.is_empty() {
            Self::success(id, result)
        } else {
            RpcResult::Fixups(FixupsResult { id, result, fixups })
        }
    }

    pub fn flat(id: Option<RequestId>, result: Value, objects: Vec<(String, Value)>) -> Self {
        RpcResult::Flat(FlatResult {
            id,
            result,
            objects,
        })
    }

    pub fn failed(id: Option<RequestId>, error: ErrorObject) -> Self {
        RpcResult::Failed(FailedResult { id, error })
    }

    pub fn remote_failed(id: Option<RequestId>, message: String, data: Option<Value>) -> Self {
        RpcResult::RemoteFailed(RemoteFailedResult { id, message, data })
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            RpcResult::Success(r) => r.id.as_ref(),
            RpcResult::Fixups(r) => r.id.as_ref(),
            RpcResult::Flat(r) => r.id.as_ref(),
            RpcResult::Failed(r) => r.id.as_ref(),
            RpcResult::RemoteFailed(r) => r.id.as_ref(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RpcResult::Failed(_) | RpcResult::RemoteFailed(_))
    }

    /// Renders the response tree, optionally instructing the client to
    /// switch endpoints via `serverURL`.
    pub fn to_value(&self, server_url: Option<&str>) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert(ID_FIELD.to_string(), id_value(self.id()));
        match self {
            RpcResult::Success(r) => {
                obj.insert(RESULT_FIELD.to_string(), r.result.clone());
            }
            RpcResult::Fixups(r) => {
                obj.insert(RESULT_FIELD.to_string(), r.result.clone());
                obj.insert(
                    FIXUPS_FIELD.to_string(),
                    Value::Array(r.fixups.iter().map(Fixup::to_value).collect()),
                );
            }
            RpcResult::Flat(r) => {
                obj.insert(RESULT_FIELD.to_string(), r.result.clone());
                for (index, object) in &r.objects {
                    obj.insert(index.clone(), object.clone());
                }
            }
            RpcResult::Failed(r) => {
                obj.insert(ERROR_FIELD.to_string(), r.error.to_value());
            }
            RpcResult::RemoteFailed(r) => {
                let error = ErrorObject::new(
                    error_codes::ERR_REMOTE,
                    r.message.clone(),
                    r.data.clone(),
                );
                obj.insert(ERROR_FIELD.to_string(), error.to_value());
            }
        }
        if let Some(url) = server_url {
            obj.insert(SERVER_URL_FIELD.to_string(), Value::String(url.to_string()));
        }
        Value::Object(obj)
    }

    pub fn to_json_string(&self, server_url: Option<&str>) -> String {
        self.to_value(server_url).to_string()
    }
}

fn id_value(id: Option<&RequestId>) -> Value {
    id.map(RequestId::to_value).unwrap_or(Value::Null)
}
