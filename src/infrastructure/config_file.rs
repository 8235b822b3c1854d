// Persisted connection configuration - a JSON file at a fixed path
use crate::application::session::ConfigSource;
use crate::domain::connection::{ConfigError, ConnectionConfig};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn load(&self) -> Result<Option<String>, ConfigError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::Io(e.to_string())),
        }
    }

    async fn save(&self, config: &ConnectionConfig) -> Result<(), ConfigError> {
        let raw = serde_json::to_string_pretty(config).map_err(|_| ConfigError::Malformed)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::Io(e.to_string()))?;
        }
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| ConfigError::Io(e.to_string()))
    }

    async fn clear(&self) -> Result<(), ConfigError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConfigError::Io(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            api_key: "key".into(),
            auth_domain: "plant.firebaseapp.com".into(),
            project_id: "plant".into(),
            storage_bucket: "plant.appspot.com".into(),
            messaging_sender_id: "1".into(),
            app_id: "1:1:web:1".into(),
            database_url: None,
            measurement_id: None,
        }
    }

    #[tokio::test]
    async fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileConfigSource::new(dir.path().join("nested/firebase.json"));

        assert_eq!(source.load().await.unwrap(), None);

        source.save(&config()).await.unwrap();
        let raw = source.load().await.unwrap().unwrap();
        assert_eq!(ConnectionConfig::parse(&raw).unwrap(), config());

        source.clear().await.unwrap();
        assert_eq!(source.load().await.unwrap(), None);
        source.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firebase.json");
        std::fs::write(&path, "{ apiKey: ").unwrap();

        let raw = FileConfigSource::new(path).load().await.unwrap().unwrap();
        assert_eq!(ConnectionConfig::parse(&raw), Err(ConfigError::Malformed));
    }
}
