// Error responses for HTTP handlers
use crate::application::error::{ConnectionError, DataError, StoreError};
use crate::domain::connection::ConfigError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug)]
pub enum AppError {
    NotConnected,
    BadRequest(String),
    Unauthorized(String),
    Config(ConfigError),
    Connection(ConnectionError),
    Store(StoreError),
    Internal(String),
}

impl From<DataError> for AppError {
    fn from(e: DataError) -> Self {
        match e {
            DataError::Unauthenticated => AppError::Unauthorized(DataError::Unauthenticated.to_string()),
            DataError::Store(StoreError::InvalidPath(path)) => {
                AppError::BadRequest(format!("invalid identifier `{}`", path))
            }
            DataError::Store(e) => AppError::Store(e),
            DataError::Encode(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}

impl From<ConnectionError> for AppError {
    fn from(e: ConnectionError) -> Self {
        AppError::Connection(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotConnected => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Not connected to the database".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Config(ConfigError::Io(msg)) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Config(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::Connection(ConnectionError::Config(e)) => (StatusCode::CONFLICT, e.to_string()),
            AppError::Connection(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Store(StoreError::Closed) => (
                StatusCode::SERVICE_UNAVAILABLE,
                StoreError::Closed.to_string(),
            ),
            AppError::Store(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::warn!("Request failed ({}): {}", status, message);
        }

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}
