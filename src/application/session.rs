// Connection context - owns the backend session and reports connectivity
use crate::application::data_service::DataService;
use crate::application::error::{ConnectionError, StoreError};
use crate::application::realtime_store::RealtimeStore;
use crate::domain::connection::{ConfigError, ConnectionConfig};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};

/// Where the connection configuration is persisted between runs.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Raw serialized configuration, `None` when nothing has been saved
    async fn load(&self) -> Result<Option<String>, ConfigError>;

    async fn save(&self, config: &ConnectionConfig) -> Result<(), ConfigError>;

    async fn clear(&self) -> Result<(), ConfigError>;
}

/// Opens backend sessions.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn RealtimeStore>, StoreError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    pub project_id: Option<String>,
    pub error: Option<String>,
}

struct Session {
    store: Arc<dyn RealtimeStore>,
    data: DataService,
}

/// Holds the single live backend session. Checking the connection tears
/// the previous session down before opening the next one.
pub struct ConnectionContext {
    configs: Arc<dyn ConfigSource>,
    connector: Arc<dyn BackendConnector>,
    session: RwLock<Option<Session>>,
    checking: Mutex<()>,
    status: watch::Sender<ConnectionStatus>,
}

impl ConnectionContext {
    pub fn new(configs: Arc<dyn ConfigSource>, connector: Arc<dyn BackendConnector>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        Self {
            configs,
            connector,
            session: RwLock::new(None),
            checking: Mutex::new(()),
            status,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Data access bound to the live session, if there is one.
    pub async fn data_service(&self) -> Option<DataService> {
        self.session.read().await.as_ref().map(|s| s.data.clone())
    }

    /// Load the persisted configuration and check the required fields.
    pub async fn validate_config(&self) -> Result<ConnectionConfig, ConfigError> {
        match self.configs.load().await? {
            None => Err(ConfigError::NotFound),
            Some(raw) => ConnectionConfig::parse(&raw),
        }
    }

    pub async fn save_config(&self, config: ConnectionConfig) -> Result<(), ConfigError> {
        let value = serde_json::to_value(&config).map_err(|_| ConfigError::Malformed)?;
        let config = ConnectionConfig::from_value(value)?;
        self.configs.save(&config).await?;
        tracing::info!("Saved configuration for project {}", config.project_id);
        Ok(())
    }

    /// Forget the saved configuration and drop the session.
    pub async fn reset_config(&self) -> Result<(), ConfigError> {
        let _checking = self.checking.lock().await;
        self.disconnect().await;
        self.configs.clear().await?;
        self.status.send_replace(ConnectionStatus::default());
        Ok(())
    }

    /// Reconnect with the saved configuration and probe the store once.
    pub async fn check_connection(&self) -> Result<(), ConnectionError> {
        let _checking = self.checking.lock().await;
        self.status.send_modify(|status| status.error = None);

        let result = self.connect().await;
        match &result {
            Ok(project_id) => {
                tracing::info!("Connected to project {}", project_id);
                self.status.send_replace(ConnectionStatus {
                    connected: true,
                    project_id: Some(project_id.clone()),
                    error: None,
                });
            }
            Err(e) => {
                tracing::error!("Connection check failed: {}", e);
                // A failed check never leaves the previous session serving data.
                self.disconnect().await;
                self.status.send_modify(|status| {
                    status.connected = false;
                    status.error = Some(e.to_string());
                });
            }
        }

        result.map(|_| ())
    }

    async fn connect(&self) -> Result<String, ConnectionError> {
        let config = self.validate_config().await?;
        self.status
            .send_modify(|status| status.project_id = Some(config.project_id.clone()));

        self.disconnect().await;

        let store = self
            .connector
            .connect(&config)
            .await
            .map_err(|e| ConnectionError::categorize(&e))?;

        if let Err(e) = store.probe().await {
            if let Err(teardown) = store.shutdown().await {
                tracing::warn!("Error closing failed session: {}", teardown);
            }
            return Err(ConnectionError::categorize(&e));
        }

        let data = DataService::new(store.clone());
        *self.session.write().await = Some(Session { store, data });
        Ok(config.project_id)
    }

    /// Tear down the live session. Teardown errors are logged, not returned.
    pub async fn disconnect(&self) {
        let session = self.session.write().await.take();
        if let Some(session) = session {
            if let Err(e) = session.store.shutdown().await {
                tracing::warn!("Error closing backend session: {}", e);
            }
            tracing::info!("Backend session closed");
        }
        self.status.send_modify(|status| status.connected = false);
    }
}
