// Error taxonomy for store access, data operations and connectivity
use crate::domain::connection::ConfigError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid path `{0}`")]
    InvalidPath(String),
    #[error("session closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("User must be authenticated to send control signals")]
    Unauthenticated,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// User-facing connectivity failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConnectionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid API key. Please check your Firebase configuration.")]
    InvalidApiKey,
    #[error("Invalid Project ID. Please check your Firebase configuration.")]
    InvalidProjectId,
    #[error("Network error. Please check your internet connection.")]
    Network,
    #[error("{0}")]
    Other(String),
}

impl ConnectionError {
    /// Map a failed probe onto one of the user-facing categories.
    pub fn categorize(err: &StoreError) -> Self {
        match err {
            StoreError::Network(_) => ConnectionError::Network,
            StoreError::Status { status: 401 | 403, body } if !body.contains("Permission denied") => {
                ConnectionError::InvalidApiKey
            }
            StoreError::Status { status: 404, .. } => ConnectionError::InvalidProjectId,
            other => Self::from_message(&other.to_string()),
        }
    }

    /// Categorize by the text of the error, keeping the raw text otherwise.
    pub fn from_message(message: &str) -> Self {
        if message.contains("auth/invalid-api-key") {
            ConnectionError::InvalidApiKey
        } else if message.contains("projectId") {
            ConnectionError::InvalidProjectId
        } else if message.to_lowercase().contains("network") {
            ConnectionError::Network
        } else {
            ConnectionError::Other(message.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_store_errors() {
        assert_eq!(
            ConnectionError::categorize(&StoreError::Network("connection refused".into())),
            ConnectionError::Network
        );
        assert_eq!(
            ConnectionError::categorize(&StoreError::Status { status: 404, body: String::new() }),
            ConnectionError::InvalidProjectId
        );
        assert_eq!(
            ConnectionError::categorize(&StoreError::Status { status: 401, body: "bad key".into() }),
            ConnectionError::InvalidApiKey
        );
        assert!(matches!(
            ConnectionError::categorize(&StoreError::Status {
                status: 401,
                body: "Permission denied".into()
            }),
            ConnectionError::Other(_)
        ));
    }

    #[test]
    fn test_categorize_messages() {
        assert_eq!(
            ConnectionError::from_message("Firebase: Error (auth/invalid-api-key)."),
            ConnectionError::InvalidApiKey
        );
        assert_eq!(
            ConnectionError::from_message("\"projectId\" not provided"),
            ConnectionError::InvalidProjectId
        );
        assert_eq!(
            ConnectionError::from_message("Network request failed"),
            ConnectionError::Network
        );
        assert_eq!(
            ConnectionError::from_message("quota exceeded").to_string(),
            "quota exceeded"
        );
    }

    #[test]
    fn test_config_error_passes_message_through() {
        let err = ConnectionError::from(ConfigError::NotFound);
        assert_eq!(
            err.to_string(),
            "No Firebase configuration found. Please configure Firebase first."
        );
    }
}
