use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub auth: AuthSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Firebase,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Database secret or ID token sent as the `auth` query parameter
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl StoreSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            config_path: default_config_path(),
            request_timeout_secs: default_request_timeout_secs(),
            auth_token: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthSettings {
    /// Bearer token -> user id
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_config_path() -> PathBuf {
    PathBuf::from("config/firebase.json")
}

fn default_request_timeout_secs() -> u64 {
    10
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(
            config::Environment::with_prefix("DASHBOARD")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
