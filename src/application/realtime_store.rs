// Store trait for the realtime database the dashboard reads from and writes to
use crate::application::error::StoreError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

/// Full snapshots of one path. `None` means nothing is stored there.
pub type ValueStream = BoxStream<'static, Result<Option<Value>, StoreError>>;

/// Path read by the connectivity probe.
pub const PROBE_PATH: &str = "connectionTest";

#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Read the value stored at `path`
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Read the children of `path` ordered by the numeric `child` field,
    /// keeping the last `limit` of them. A backend that cannot order on the
    /// server may return every child; callers sort and truncate.
    async fn get_last_by_child(
        &self,
        path: &str,
        child: &str,
        limit: usize,
    ) -> Result<Option<Value>, StoreError>;

    /// Listen to `path`: yields the current value, then the whole value again
    /// after every change under it. Nothing is attached until the stream is polled.
    fn subscribe(&self, path: &str) -> ValueStream;

    /// Replace the value at `path`
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Merge `fields` into the object at `path`, leaving other children untouched
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// One round trip to check the store is reachable with the current credentials
    async fn probe(&self) -> Result<(), StoreError> {
        self.get(PROBE_PATH).await.map(|_| ())
    }

    /// Release the session: open subscriptions end and later calls fail
    async fn shutdown(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
