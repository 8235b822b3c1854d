// Route table for the dashboard API
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    acknowledge_alert, add_log, alerts_stream, chart_stream, check_connection, connection_status,
    create_alert, device_logs, disconnect, health_check, list_logs, reset_config, save_config,
    send_signal, signals_stream, update_signal_status,
};
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/connection", get(connection_status))
        .route("/connection/check", post(check_connection))
        .route("/connection/disconnect", post(disconnect))
        .route("/connection/config", put(save_config).delete(reset_config))
        .route("/logs", get(list_logs).post(add_log))
        .route("/devices/:id/logs", get(device_logs))
        .route("/devices/:id/chart", get(chart_stream))
        .route("/devices/:id/signals", post(send_signal))
        .route("/devices/:id/signals/stream", get(signals_stream))
        .route("/devices/:id/signals/:signal_id/status", put(update_signal_status))
        .route("/alerts", post(create_alert))
        .route("/alerts/stream", get(alerts_stream))
        .route("/alerts/:id/acknowledge", post(acknowledge_alert))
}
