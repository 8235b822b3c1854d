// Live subscriptions: snapshot streams and their detach handles
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::task::JoinHandle;

/// Lazy sequence of full-state snapshots. Each item replaces the previous one.
pub type SnapshotStream<T> = BoxStream<'static, Vec<T>>;

/// Keeps a subscription attached. Detaching (or dropping the handle)
/// releases the store listener; detaching twice is harmless.
#[derive(Debug)]
pub struct SubscriptionHandle {
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Drive `stream` on the runtime, handing every snapshot to `callback`.
    pub fn spawn<T, F>(mut stream: SnapshotStream<T>, mut callback: F) -> Self
    where
        T: Send + 'static,
        F: FnMut(Vec<T>) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            while let Some(snapshot) = stream.next().await {
                callback(snapshot);
            }
        });

        Self { task: Some(task) }
    }

    pub fn is_attached(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn detach(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn test_callback_receives_snapshots() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let stream = futures::stream::iter(vec![vec![1], vec![1, 2]]).boxed();

        let handle = SubscriptionHandle::spawn(stream, move |snapshot| {
            sink.lock().unwrap().push(snapshot);
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*seen.lock().unwrap(), vec![vec![1], vec![1, 2]]);
        assert!(!handle.is_attached());
    }

    #[tokio::test]
    async fn test_detach_is_idempotent() {
        let stream = futures::stream::pending::<Vec<u8>>().boxed();
        let mut handle = SubscriptionHandle::spawn(stream, |_| {});
        assert!(handle.is_attached());

        handle.detach();
        handle.detach();
        assert!(!handle.is_attached());
    }
}
