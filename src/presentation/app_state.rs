// Application state for HTTP handlers
use crate::application::data_service::DataService;
use crate::application::session::ConnectionContext;
use crate::presentation::auth::TokenTable;
use crate::presentation::error::AppError;
use std::sync::Arc;

pub struct AppState {
    pub connection: Arc<ConnectionContext>,
    pub tokens: TokenTable,
}

impl AppState {
    /// Data access for routes that need a live session.
    pub async fn data(&self) -> Result<DataService, AppError> {
        self.connection.data_service().await.ok_or(AppError::NotConnected)
    }
}
