use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// A transport connection to a bridge: sends one request tree, returns
/// the response tree. Implementations own framing, retries and
/// connection state; the client core never looks past this trait.
#[async_trait]
pub trait Session: Send + Sync {
    async fn send(&self, request: Value) -> ClientResult<Value>;

    /// Releases transport resources. The default does nothing.
    async fn close(&self) {}
}

/// A blocking transport connection. Wrap one in
/// [`AsyncSessionAdapter`](crate::adapter::AsyncSessionAdapter) to use it
/// where a [`Session`] is expected.
pub trait SyncSession: Send + Sync {
    fn send(&self, request: Value) -> ClientResult<Value>;

    fn close(&self) {}
}

type SessionFactory = Box<dyn Fn(&str) -> ClientResult<Arc<dyn Session>> + Send + Sync>;

/// Maps URL schemes to session factories so callers can open sessions by
/// URL without naming a transport type.
#[derive(Default)]
pub struct TransportRegistry {
    factories: Mutex<HashMap<String, SessionFactory>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_transport(
        &self,
        scheme: impl Into<String>,
        factory: impl Fn(&str) -> ClientResult<Arc<dyn Session>> + Send + Sync + 'static,
    ) {
        let scheme = scheme.into();
        debug!(scheme, "registered transport");
        self.factories
            .lock()
            .unwrap()
            .insert(scheme, Box::new(factory));
    }

    /// Opens a session for `url` through the factory registered for its
    /// scheme.
    pub fn create_session(&self, url: &str) -> ClientResult<Arc<dyn Session>> {
        let scheme = url
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| ClientError::malformed(format!("no scheme in url {}", url)))?;
        let factories = self.factories.lock().unwrap();
        let factory = factories
            .get(scheme)
            .ok_or_else(|| ClientError::UnknownScheme(scheme.to_string()))?;
        factory(url)
    }
}
