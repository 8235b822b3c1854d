// Data service - typed reads, live snapshots and writes for logs, alerts and control signals
use crate::application::error::{DataError, StoreError};
use crate::application::paths;
use crate::application::realtime_store::RealtimeStore;
use crate::application::subscription::{SnapshotStream, SubscriptionHandle};
use crate::domain::alert::{Alert, NewAlert};
use crate::domain::control_signal::{Command, ControlSignal, SignalStatus};
use crate::domain::data_log::{DataLog, NewDataLog};
use crate::domain::decode::DecodeResult;
use crate::domain::now_ms;
use crate::domain::push_id::PushIdGenerator;
use futures::StreamExt;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Authenticated identity issuing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub uid: String,
}

impl Caller {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

#[derive(Clone)]
pub struct DataService {
    store: Arc<dyn RealtimeStore>,
    ids: Arc<PushIdGenerator>,
}

impl DataService {
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self {
            store,
            ids: Arc::new(PushIdGenerator::new()),
        }
    }

    // ---- Data logs ----

    /// Live data logs of one device. Values failing the shape check are
    /// dropped; an empty path or a store error yields an empty snapshot.
    pub fn data_stream(&self, device_id: &str) -> SnapshotStream<DataLog> {
        let path = match paths::device_logs(device_id) {
            Ok(path) => path,
            Err(e) => return empty_stream("data logs", e),
        };
        tracing::info!("Subscribing to data for device: {}", device_id);

        let device_id = device_id.to_string();
        self.store
            .subscribe(&path)
            .map(move |snapshot| match snapshot {
                Ok(value) => {
                    let now = now_ms();
                    let logs = decode_children(value, "data log", |key, raw| DataLog::decode(Some(key), raw, now));
                    tracing::debug!("Received {} logs for device: {}", logs.len(), device_id);
                    logs
                }
                Err(e) => {
                    tracing::warn!("Error subscribing to data for device {}: {}", device_id, e);
                    Vec::new()
                }
            })
            .boxed()
    }

    pub fn subscribe_to_data<F>(&self, device_id: &str, callback: F) -> SubscriptionHandle
    where
        F: FnMut(Vec<DataLog>) + Send + 'static,
    {
        SubscriptionHandle::spawn(self.data_stream(device_id), callback)
    }

    /// Up to `limit` most recent logs of one device, newest first.
    pub async fn get_historical_data(&self, device_id: &str, limit: usize) -> Vec<DataLog> {
        match self.fetch_historical_data(device_id, limit).await {
            Ok(logs) => {
                tracing::debug!("Retrieved {} historical logs for device: {}", logs.len(), device_id);
                logs
            }
            Err(e) => {
                tracing::warn!("Error fetching historical data for device {}: {}", device_id, e);
                Vec::new()
            }
        }
    }

    async fn fetch_historical_data(&self, device_id: &str, limit: usize) -> Result<Vec<DataLog>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let path = paths::device_logs(device_id)?;
        let value = self.store.get_last_by_child(&path, "timestamp", limit).await?;
        let now = now_ms();
        let mut logs = decode_children(value, "data log", |key, raw| DataLog::decode(Some(key), raw, now));
        newest_first(&mut logs);
        logs.truncate(limit);
        Ok(logs)
    }

    pub async fn add_data_log(&self, new: NewDataLog) -> Result<DataLog, DataError> {
        let now = now_ms();
        let id = self.ids.next(now);
        let path = paths::data_log(&new.device_id, &id)?;
        let log = DataLog::from_new(new, id, now);

        self.store.set(&path, serde_json::to_value(&log)?).await.map_err(|e| {
            tracing::error!("Error adding data log for device {}: {}", log.device_id, e);
            e
        })?;

        tracing::info!("Added data log {} for device: {}", log.id, log.device_id);
        Ok(log)
    }

    /// Every device's logs in one list, newest first.
    pub async fn get_all_data_logs(&self) -> Vec<DataLog> {
        let value = match self.store.get(paths::DATA_LOGS).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Error fetching all data logs: {}", e);
                return Vec::new();
            }
        };

        let now = now_ms();
        let mut logs: Vec<DataLog> = children(value)
            .into_iter()
            .flat_map(|(_device_id, device_logs)| {
                decode_children(Some(device_logs), "data log", |key, raw| DataLog::decode(Some(key), raw, now))
            })
            .collect();

        newest_first(&mut logs);
        tracing::debug!("Retrieved {} total logs", logs.len());
        logs
    }

    // ---- Alerts ----

    pub fn alert_stream(&self) -> SnapshotStream<Alert> {
        self.store
            .subscribe(paths::ALERTS)
            .map(|snapshot| match snapshot {
                Ok(value) => decode_children(value, "alert", |key, raw| Alert::decode(Some(key), raw)),
                Err(e) => {
                    tracing::warn!("Error subscribing to alerts: {}", e);
                    Vec::new()
                }
            })
            .boxed()
    }

    pub fn subscribe_to_alerts<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: FnMut(Vec<Alert>) + Send + 'static,
    {
        SubscriptionHandle::spawn(self.alert_stream(), callback)
    }

    pub async fn create_alert(&self, new: NewAlert) -> Result<Alert, DataError> {
        let now = now_ms();
        let id = self.ids.next(now);
        let path = paths::alert(&id)?;
        let alert = Alert::from_new(new, id, now);

        self.store.set(&path, serde_json::to_value(&alert)?).await?;
        tracing::info!("Created {:?} alert {} for device: {}", alert.kind, alert.id, alert.device_id);
        Ok(alert)
    }

    /// Mark an alert acknowledged. Only the flag is merged; failures are logged.
    pub async fn acknowledge_alert(&self, alert_id: &str) {
        let result = match paths::alert(alert_id) {
            Ok(path) => self.store.update(&path, single_field("acknowledged", Value::Bool(true))).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::warn!("Error acknowledging alert {}: {}", alert_id, e);
        }
    }

    // ---- Control signals ----

    pub fn control_signal_stream(&self, device_id: &str) -> SnapshotStream<ControlSignal> {
        let path = match paths::device_signals(device_id) {
            Ok(path) => path,
            Err(e) => return empty_stream("control signals", e),
        };

        let device_id = device_id.to_string();
        self.store
            .subscribe(&path)
            .map(move |snapshot| match snapshot {
                Ok(value) => {
                    decode_children(value, "control signal", |key, raw| ControlSignal::decode(Some(key), raw))
                }
                Err(e) => {
                    tracing::warn!("Error subscribing to control signals for device {}: {}", device_id, e);
                    Vec::new()
                }
            })
            .boxed()
    }

    pub fn subscribe_to_control_signals<F>(&self, device_id: &str, callback: F) -> SubscriptionHandle
    where
        F: FnMut(Vec<ControlSignal>) + Send + 'static,
    {
        SubscriptionHandle::spawn(self.control_signal_stream(device_id), callback)
    }

    /// Queue `command` for a device as a pending signal. Requires a caller;
    /// nothing is written without one.
    pub async fn send_control_signal(
        &self,
        device_id: &str,
        command: Command,
        caller: Option<&Caller>,
    ) -> Result<ControlSignal, DataError> {
        let caller = caller.ok_or(DataError::Unauthenticated)?;

        let now = now_ms();
        let id = self.ids.next(now);
        let path = paths::control_signal(device_id, &id)?;
        let signal = ControlSignal::pending(id, now, device_id, command, &caller.uid);

        self.store.set(&path, serde_json::to_value(&signal)?).await?;
        tracing::info!("{} sent {:?} to device: {}", caller.uid, command, device_id);
        Ok(signal)
    }

    /// Record the outcome of a signal. Only `status` is merged; failures are logged.
    pub async fn update_control_signal_status(&self, device_id: &str, signal_id: &str, status: SignalStatus) {
        let result = match (paths::control_signal(device_id, signal_id), serde_json::to_value(status)) {
            (Ok(path), Ok(status)) => self.store.update(&path, single_field("status", status)).await,
            (Err(e), _) => Err(e),
            (_, Err(e)) => Err(StoreError::InvalidResponse(e.to_string())),
        };

        if let Err(e) = result {
            tracing::warn!("Error updating control signal {} for device {}: {}", signal_id, device_id, e);
        }
    }

    // ---- Cleanup ----

    pub fn unsubscribe(&self, mut handle: SubscriptionHandle) {
        handle.detach();
    }
}

fn empty_stream<T: Send + 'static>(what: &str, err: StoreError) -> SnapshotStream<T> {
    tracing::warn!("Error setting up {} subscription: {}", what, err);
    futures::stream::once(async { Vec::new() }).boxed()
}

fn single_field(name: &str, value: Value) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(name.to_string(), value);
    fields
}

/// Keyed children of a snapshot. Sequential numeric keys come back from the
/// store as an array, with holes as nulls.
fn children(value: Option<Value>) -> Vec<(String, Value)> {
    match value {
        Some(Value::Object(map)) => map.into_iter().collect(),
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .filter(|(_, item)| !item.is_null())
            .map(|(i, item)| (i.to_string(), item))
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_children<T>(
    value: Option<Value>,
    what: &str,
    decode: impl Fn(&str, &Value) -> DecodeResult<T>,
) -> Vec<T> {
    children(value)
        .into_iter()
        .filter_map(|(key, raw)| match decode(&key, &raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!("Dropping malformed {} {}: {}", what, key, e);
                None
            }
        })
        .collect()
}

fn newest_first(logs: &mut [DataLog]) {
    logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
