use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use arbor_json_rpc::{PathComponent, RequestId};
use arbor_serializer::{
    ClassRegistry, ClassResolver, HostValue, JsonSerializer, NestedRequestParser, RequestParser,
    TypeDesc,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};
use crate::session::Session;

/// Issues calls over a [`Session`]: marshals arguments, assembles the
/// request, decodes the response (including fixup aliases) back into host
/// values. Marshalling happens on the caller's task, never on an internal
/// scheduler.
pub struct Client {
    session: Arc<dyn Session>,
    serializer: JsonSerializer,
    parser: Arc<dyn RequestParser>,
    next_id: AtomicI64,
}

impl Client {
    /// A client with its own class registry and the nested wire form.
    pub fn new(session: Arc<dyn Session>) -> Self {
        let registry = Arc::new(ClassRegistry::new());
        let resolver = Arc::new(ClassResolver::with_defaults(registry.clone()));
        Self::with_serializer(session, JsonSerializer::with_defaults(registry, resolver))
    }

    /// A client over a preconfigured serializer façade (custom registry,
    /// hint policy or output mode).
    pub fn with_serializer(session: Arc<dyn Session>, serializer: JsonSerializer) -> Self {
        Self {
            session,
            serializer,
            parser: Arc::new(NestedRequestParser),
            next_id: AtomicI64::new(0),
        }
    }

    /// Switches the parser used for response decoding (flat servers need
    /// the flat parser).
    pub fn set_request_parser(&mut self, parser: Arc<dyn RequestParser>) {
        self.parser = parser;
    }

    /// The class registry backing this client's (un)marshalling.
    pub fn registry(&self) -> &ClassRegistry {
        self.serializer.registry()
    }

    /// Calls `method` with `args`, expecting a result of type `expected`.
    pub async fn invoke(
        &self,
        method: &str,
        args: &[HostValue],
        expected: &TypeDesc,
    ) -> ClientResult<HostValue> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let request = self.build_request(id, method, args)?;
        debug!(method, id, "sending request");
        let response = self.session.send(request).await?;
        self.decode_response(id, expected, &response)
    }

    fn build_request(&self, id: i64, method: &str, args: &[HostValue]) -> ClientResult<Value> {
        let mut state = self.serializer.create_state();
        state.push_component(PathComponent::Field(
            arbor_json_rpc::PARAMS_FIELD.to_string(),
        ));
        let mut params = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            params.push(
                self.serializer
                    .marshal_value(&mut state, arg, PathComponent::Index(index))?,
            );
        }
        state.pop_component();

        let mut request = serde_json::Map::new();
        request.insert(
            arbor_json_rpc::METHOD_FIELD.to_string(),
            Value::String(method.to_string()),
        );
        request.insert(arbor_json_rpc::ID_FIELD.to_string(), Value::from(id));
        request.insert(
            arbor_json_rpc::PARAMS_FIELD.to_string(),
            Value::Array(params),
        );
        let fixups = state.fixups();
        if !fixups.is_empty() {
            request.insert(
                arbor_json_rpc::FIXUPS_FIELD.to_string(),
                Value::Array(fixups.iter().map(|f| f.to_value()).collect()),
            );
        }
        Ok(Value::Object(request))
    }

    fn decode_response(
        &self,
        id: i64,
        expected: &TypeDesc,
        response: &Value,
    ) -> ClientResult<HostValue> {
        let message = response
            .as_object()
            .ok_or_else(|| ClientError::malformed("response is not an object"))?;

        if let Some(response_id) = message
            .get(arbor_json_rpc::ID_FIELD)
            .and_then(RequestId::from_value)
        {
            if response_id.as_i64() != Some(id) {
                warn!(sent = id, got = %response_id, "response id does not match request");
            }
        }

        if let Some(server_url) = message
            .get(arbor_json_rpc::SERVER_URL_FIELD)
            .and_then(Value::as_str)
        {
            // endpoint switching is the transport's business; surface it
            debug!(server_url, "server requested an endpoint switch");
        }

        if let Some(error) = message.get(arbor_json_rpc::ERROR_FIELD) {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let error_message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            return Err(ClientError::Remote {
                code,
                message: error_message,
                data: error.get("data").cloned(),
            });
        }

        let (result, aliases) = self
            .parser
            .parse_value(message, arbor_json_rpc::RESULT_FIELD)?;
        let mut state = self.serializer.create_state();
        state.install_aliases(aliases);
        let value = self.serializer.unmarshal_at(
            &mut state,
            expected,
            &result,
            &[PathComponent::Field(
                arbor_json_rpc::RESULT_FIELD.to_string(),
            )],
        )?;
        Ok(value)
    }
}
