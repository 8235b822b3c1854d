// In-process realtime store - a JSON tree with change notification
use crate::application::error::StoreError;
use crate::application::paths::segments;
use crate::application::realtime_store::{RealtimeStore, ValueStream};
use crate::application::session::BackendConnector;
use crate::domain::connection::ConnectionConfig;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError};
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

const CHANGE_CAPACITY: usize = 256;

/// Shared document tree. Sessions created with [`MemoryStore::session`] see
/// the same data; each has its own listeners.
pub struct MemoryStore {
    tree: Arc<Mutex<Value>>,
    changes: Mutex<Option<broadcast::Sender<Vec<String>>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::over(Arc::new(Mutex::new(Value::Null)))
    }

    fn over(tree: Arc<Mutex<Value>>) -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            tree,
            changes: Mutex::new(Some(tx)),
        }
    }

    /// A new session over the same data.
    pub fn session(&self) -> Self {
        Self::over(self.tree.clone())
    }

    fn sender(&self) -> Option<broadcast::Sender<Vec<String>>> {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn read(tree: &Mutex<Value>, path: &[String]) -> Option<Value> {
        let tree = tree.lock().unwrap_or_else(PoisonError::into_inner);
        let mut node = &*tree;
        for segment in path {
            node = node.as_object()?.get(segment)?;
        }
        let empty = node.is_null() || node.as_object().is_some_and(Map::is_empty);
        (!empty).then(|| node.clone())
    }

    fn write(&self, path: &[String], edits: Vec<(Vec<String>, Value)>) -> Result<(), StoreError> {
        let sender = self.sender().ok_or(StoreError::Closed)?;
        {
            let mut tree = self.tree.lock().unwrap_or_else(PoisonError::into_inner);
            for (relative, value) in edits {
                let full: Vec<String> = path.iter().chain(relative.iter()).cloned().collect();
                write_at(&mut tree, &full, value);
            }
        }
        // No receivers is fine.
        let _ = sender.send(path.to_vec());
        Ok(())
    }
}

/// Store `value` at `path`, creating parents. Null deletes, and parents left
/// empty are removed with it.
fn write_at(node: &mut Value, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }

    if let Value::Object(map) = node {
        let emptied = {
            let child = map.entry(head.clone()).or_insert(Value::Null);
            write_at(child, rest, value);
            child.is_null() || child.as_object().is_some_and(Map::is_empty)
        };
        if emptied {
            map.remove(head);
        }
    }
}

/// Whether a change at `changed` can alter the value at `watched`.
fn overlaps(changed: &[String], watched: &[String]) -> bool {
    changed.iter().zip(watched.iter()).all(|(a, b)| a == b)
}

fn numeric_child(value: &Value, child: &str) -> f64 {
    value
        .get(child)
        .and_then(Value::as_f64)
        .unwrap_or(f64::NEG_INFINITY)
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        if self.sender().is_none() {
            return Err(StoreError::Closed);
        }
        Ok(Self::read(&self.tree, &segments(path)))
    }

    async fn get_last_by_child(
        &self,
        path: &str,
        child: &str,
        limit: usize,
    ) -> Result<Option<Value>, StoreError> {
        let Some(value) = self.get(path).await? else {
            return Ok(None);
        };
        let Value::Object(map) = value else {
            return Ok(Some(value));
        };

        let mut entries: Vec<(String, Value)> = map.into_iter().collect();
        entries.sort_by(|(_, a), (_, b)| numeric_child(a, child).total_cmp(&numeric_child(b, child)));
        let skip = entries.len().saturating_sub(limit);

        Ok(Some(Value::Object(entries.into_iter().skip(skip).collect())))
    }

    fn subscribe(&self, path: &str) -> ValueStream {
        let watched = segments(path);
        let tree = self.tree.clone();
        let receiver = self.sender().map(|tx| BroadcastStream::new(tx.subscribe()));

        Box::pin(async_stream::stream! {
            match receiver {
                None => yield Err(StoreError::Closed),
                Some(mut changes) => {
                    yield Ok(MemoryStore::read(&tree, &watched));
                    // Ends once the session shuts down and the sender is gone.
                    while let Some(change) = changes.next().await {
                        match change {
                            Ok(changed) if overlaps(&changed, &watched) => {
                                yield Ok(MemoryStore::read(&tree, &watched));
                            }
                            Ok(_) => {}
                            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                                tracing::debug!("Listener on {:?} skipped {} changes", watched, skipped);
                                yield Ok(MemoryStore::read(&tree, &watched));
                            }
                        }
                    }
                }
            }
        })
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.write(&segments(path), vec![(Vec::new(), value)])
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let edits = fields
            .into_iter()
            .map(|(key, value)| (segments(&key), value))
            .collect();
        self.write(&segments(path), edits)
    }

    async fn shutdown(&self) -> Result<(), StoreError> {
        // Dropping the sender ends every open listener.
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

/// Hands out sessions over one shared in-process tree.
#[derive(Default)]
pub struct MemoryConnector {
    store: MemoryStore,
}

#[async_trait]
impl BackendConnector for MemoryConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn RealtimeStore>, StoreError> {
        tracing::info!("Opening in-memory session for project {}", config.project_id);
        Ok(Arc::new(self.store.session()))
    }
}
