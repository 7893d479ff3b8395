use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::oneshot;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};
use crate::session::{Session, SyncSession};

/// Presents a blocking [`SyncSession`] as an async [`Session`]. Each send
/// runs on its own worker thread; the caller's task just awaits the
/// result.
pub struct AsyncSessionAdapter {
    inner: Arc<dyn SyncSession>,
}

impl AsyncSessionAdapter {
    pub fn new(inner: Arc<dyn SyncSession>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Session for AsyncSessionAdapter {
    async fn send(&self, request: Value) -> ClientResult<Value> {
        let (tx, rx) = oneshot::channel();
        let session = self.inner.clone();
        std::thread::spawn(move || {
            let _ = tx.send(session.send(request));
        });
        rx.await
            .map_err(|_| ClientError::transport("session worker vanished"))?
    }

    async fn close(&self) {
        self.inner.close();
    }
}

/// Presents an async [`Session`] as a blocking [`SyncSession`] by driving
/// the future on the calling thread. Do not use from inside an async
/// runtime.
pub struct BlockingSessionAdapter {
    inner: Arc<dyn Session>,
}

impl BlockingSessionAdapter {
    pub fn new(inner: Arc<dyn Session>) -> Self {
        Self { inner }
    }
}

impl SyncSession for BlockingSessionAdapter {
    fn send(&self, request: Value) -> ClientResult<Value> {
        futures::executor::block_on(self.inner.send(request))
    }

    fn close(&self) {
        futures::executor::block_on(self.inner.close());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echoing;

    impl SyncSession for Echoing {
        fn send(&self, request: Value) -> ClientResult<Value> {
            Ok(json!({"echo": request}))
        }
    }

    #[tokio::test]
    async fn sync_session_usable_from_async() {
        let adapter = AsyncSessionAdapter::new(Arc::new(Echoing));
        let response = adapter.send(json!(1)).await.unwrap();
        assert_eq!(response, json!({"echo": 1}));
    }

    #[test]
    fn adapters_compose_back_to_sync() {
        let round_trip = BlockingSessionAdapter::new(Arc::new(AsyncSessionAdapter::new(
            Arc::new(Echoing),
        )));
        let response = round_trip.send(json!("x")).unwrap();
        assert_eq!(response, json!({"echo": "x"}));
    }
}
