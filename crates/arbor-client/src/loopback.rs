use std::sync::Arc;

use arbor_bridge::{Bridge, InvocationContext};
use serde_json::Value;

use crate::error::ClientResult;
use crate::session::SyncSession;

/// Drives a bridge in the same process, with no transport in between.
/// Useful for tests and for embedding a client API over a local bridge.
pub struct LoopbackSession {
    bridge: Arc<Bridge>,
    context: InvocationContext,
}

impl LoopbackSession {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self::with_context(bridge, InvocationContext::empty())
    }

    /// Attaches a fixed invocation context to every call sent through
    /// this session.
    pub fn with_context(bridge: Arc<Bridge>, context: InvocationContext) -> Self {
        Self { bridge, context }
    }
}

impl SyncSession for LoopbackSession {
    fn send(&self, request: Value) -> ClientResult<Value> {
        Ok(self.bridge.call_value(&self.context, &request).to_value(None))
    }
}
