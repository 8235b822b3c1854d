// HTTP request handlers
use crate::application::session::ConnectionStatus;
use crate::application::views::{AlertsView, DataVisualization, DeviceControlView};
use crate::domain::alert::{Alert, NewAlert};
use crate::domain::chart::ChartSpec;
use crate::domain::connection::ConnectionConfig;
use crate::domain::control_signal::{Command, ControlSignal, SignalStatus};
use crate::domain::data_log::{DataLog, NewDataLog};
use crate::presentation::app_state::AppState;
use crate::presentation::error::AppError;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::watch;

const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct ChartQuery {
    pub title: Option<String>,
    pub unit: Option<String>,
    pub warning: Option<f64>,
    pub critical: Option<f64>,
}

#[derive(Deserialize)]
pub struct SendSignalRequest {
    pub command: Command,
}

#[derive(Deserialize)]
pub struct SignalStatusRequest {
    pub status: SignalStatus,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

// ---- Connection ----

pub async fn connection_status(State(state): State<Arc<AppState>>) -> Json<ConnectionStatus> {
    Json(state.connection.status())
}

pub async fn check_connection(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConnectionStatus>, AppError> {
    state.connection.check_connection().await?;
    Ok(Json(state.connection.status()))
}

pub async fn disconnect(State(state): State<Arc<AppState>>) -> Json<ConnectionStatus> {
    state.connection.disconnect().await;
    Json(state.connection.status())
}

/// Accepts any JSON object so missing fields are reported by name.
pub async fn save_config(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<Value>,
) -> Result<StatusCode, AppError> {
    let config = ConnectionConfig::from_value(raw)?;
    state.connection.save_config(config).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset_config(State(state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    state.connection.reset_config().await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- Data logs ----

pub async fn list_logs(State(state): State<Arc<AppState>>) -> Result<Json<Vec<DataLog>>, AppError> {
    let data = state.data().await?;
    Ok(Json(data.get_all_data_logs().await))
}

pub async fn add_log(
    State(state): State<Arc<AppState>>,
    Json(log): Json<NewDataLog>,
) -> Result<(StatusCode, Json<DataLog>), AppError> {
    let data = state.data().await?;
    let log = data.add_data_log(log).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

pub async fn device_logs(
    Path(device_id): Path<String>,
    Query(query): Query<HistoryQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DataLog>>, AppError> {
    let data = state.data().await?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Ok(Json(data.get_historical_data(&device_id, limit).await))
}

/// Live chart frames. Falls back to sample data when no session is connected.
pub async fn chart_stream(
    Path(device_id): Path<String>,
    Query(query): Query<ChartQuery>,
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let title = query.title.unwrap_or_else(|| device_id.clone());
    let spec = ChartSpec::new(device_id, title, query.unit.unwrap_or_default())
        .with_thresholds(query.warning, query.critical);

    let chart = DataVisualization::mount(state.connection.data_service().await, spec);
    let updates = chart.watch();
    view_events(chart, updates)
}

// ---- Alerts ----

pub async fn alerts_stream(
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let view = AlertsView::mount(&state.data().await?);
    let updates = view.watch();
    Ok(view_events(view, updates))
}

pub async fn create_alert(
    State(state): State<Arc<AppState>>,
    Json(alert): Json<NewAlert>,
) -> Result<(StatusCode, Json<Alert>), AppError> {
    let data = state.data().await?;
    let alert = data.create_alert(alert).await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

pub async fn acknowledge_alert(
    Path(alert_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, AppError> {
    let data = state.data().await?;
    data.acknowledge_alert(&alert_id).await;
    Ok(StatusCode::NO_CONTENT)
}

// ---- Control signals ----

pub async fn signals_stream(
    Path(device_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let view = DeviceControlView::mount(&state.data().await?, &device_id);
    let updates = view.watch();
    Ok(view_events(view, updates))
}

pub async fn send_signal(
    Path(device_id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendSignalRequest>,
) -> Result<(StatusCode, Json<ControlSignal>), AppError> {
    let data = state.data().await?;
    let caller = state.tokens.caller(&headers);
    let signal = data
        .send_control_signal(&device_id, request.command, caller.as_ref())
        .await?;
    Ok((StatusCode::CREATED, Json(signal)))
}

pub async fn update_signal_status(
    Path((device_id, signal_id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignalStatusRequest>,
) -> Result<StatusCode, AppError> {
    let data = state.data().await?;
    data.update_control_signal_status(&device_id, &signal_id, request.status)
        .await;
    Ok(StatusCode::NO_CONTENT)
}

/// Stream every render state of a view as an SSE event. The view (and its
/// subscription) lives as long as the client stays connected.
fn view_events<V, T>(
    view: V,
    mut updates: watch::Receiver<T>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    V: Send + 'static,
    T: Serialize + Send + Sync + 'static,
{
    let stream = async_stream::stream! {
        let _view = view;
        loop {
            let event = {
                let state = updates.borrow_and_update();
                Event::default().json_data(&*state)
            };
            match event {
                Ok(event) => yield Ok::<_, Infallible>(event),
                Err(e) => tracing::warn!("Failed to encode view state: {}", e),
            }
            if updates.changed().await.is_err() {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
