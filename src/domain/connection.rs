// Connection configuration - the locally persisted backend credentials
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Fields that must be present and non-empty, in the order they are reported.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "apiKey",
    "authDomain",
    "projectId",
    "storageBucket",
    "messagingSenderId",
    "appId",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("No Firebase configuration found. Please configure Firebase first.")]
    NotFound,
    #[error("Invalid Firebase configuration format. Please reconfigure Firebase.")]
    Malformed,
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("Could not access the Firebase configuration: {0}")]
    Io(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
    #[serde(rename = "databaseURL", default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_id: Option<String>,
}

impl ConnectionConfig {
    /// Parse and validate a serialized configuration object.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(raw).map_err(|_| ConfigError::Malformed)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let Value::Object(map) = &value else {
            return Err(ConfigError::Malformed);
        };

        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|field| {
                map.get(**field)
                    .and_then(Value::as_str)
                    .is_none_or(|s| s.trim().is_empty())
            })
            .map(|field| field.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(ConfigError::MissingFields(missing));
        }

        serde_json::from_value(value).map_err(|_| ConfigError::Malformed)
    }

    /// Realtime database root. Projects without an explicit URL use the
    /// default instance name.
    pub fn database_url(&self) -> String {
        match &self.database_url {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("https://{}-default-rtdb.firebaseio.com", self.project_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full() -> Value {
        json!({
            "apiKey": "key",
            "authDomain": "plant.firebaseapp.com",
            "projectId": "plant",
            "storageBucket": "plant.appspot.com",
            "messagingSenderId": "123",
            "appId": "1:123:web:abc"
        })
    }

    #[test]
    fn test_parse_valid_config() {
        let config = ConnectionConfig::parse(&full().to_string()).unwrap();
        assert_eq!(config.project_id, "plant");
        assert_eq!(config.database_url(), "https://plant-default-rtdb.firebaseio.com");
    }

    #[test]
    fn test_explicit_database_url() {
        let mut raw = full();
        raw["databaseURL"] = json!("https://plant-eu.firebasedatabase.app/");
        let config = ConnectionConfig::from_value(raw).unwrap();
        assert_eq!(config.database_url(), "https://plant-eu.firebasedatabase.app");
    }

    #[test]
    fn test_missing_fields_reported_in_order() {
        let mut raw = full();
        raw["appId"] = json!("");
        raw.as_object_mut().unwrap().remove("apiKey");

        let err = ConnectionConfig::from_value(raw).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingFields(vec!["apiKey".to_string(), "appId".to_string()])
        );
        assert_eq!(err.to_string(), "Missing required fields: apiKey, appId");
    }

    #[test]
    fn test_malformed_config() {
        assert_eq!(ConnectionConfig::parse("{not json"), Err(ConfigError::Malformed));
        assert_eq!(ConnectionConfig::parse("[1,2]"), Err(ConfigError::Malformed));
    }
}
