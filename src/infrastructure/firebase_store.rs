// Firebase Realtime Database adapter over the REST and streaming API
use crate::application::error::StoreError;
use crate::application::paths::segments;
use crate::application::realtime_store::{RealtimeStore, ValueStream};
use crate::application::session::BackendConnector;
use crate::domain::connection::ConnectionConfig;
use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use reqwest::{header, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const RECONNECT_DELAY: Duration = Duration::from_millis(500);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// REST client for one database. Listeners reopen their event stream after
/// a dropped connection and end only on shutdown, cancel or a refused open.
#[derive(Debug, Clone)]
pub struct FirebaseStore {
    client: reqwest::Client,
    database_url: String,
    auth_token: Option<String>,
    request_timeout: Duration,
    closed: Arc<watch::Sender<bool>>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    path: String,
    #[serde(default)]
    data: Value,
}

impl FirebaseStore {
    pub fn new(database_url: String, auth_token: Option<String>, request_timeout: Duration) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            client: reqwest::Client::new(),
            database_url: database_url.trim_end_matches('/').to_string(),
            auth_token,
            request_timeout,
            closed: Arc::new(closed),
        }
    }

    fn build_url(&self, path: &str) -> String {
        let encoded: Vec<String> = segments(path)
            .iter()
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}.json", self.database_url, encoded.join("/"))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, StoreError> {
        if *self.closed.borrow() {
            return Err(StoreError::Closed);
        }

        let mut builder = self.client.request(method, self.build_url(path));
        if let Some(token) = &self.auth_token {
            builder = builder.query(&[("auth", token)]);
        }
        Ok(builder)
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        let response = builder.send().await.map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let body = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(StoreError::Status { status, body });
        }

        Ok(response)
    }

    async fn read_value(&self, builder: RequestBuilder) -> Result<Option<Value>, StoreError> {
        let response = self.execute(builder.timeout(self.request_timeout)).await?;
        let value = response.json::<Value>().await.map_err(transport_error)?;
        Ok(non_null(value))
    }

    async fn write(&self, method: Method, path: &str, body: &impl serde::Serialize) -> Result<(), StoreError> {
        let builder = self
            .request(method, path)?
            .query(&[("print", "silent")])
            .timeout(self.request_timeout)
            .json(body);
        self.execute(builder).await.map(|_| ())
    }

    async fn open_event_stream(&self, path: &str) -> Result<Response, StoreError> {
        let builder = self
            .request(Method::GET, path)?
            .header(header::ACCEPT, "text/event-stream");
        self.execute(builder).await
    }
}

/// Sleep before reopening a listener. True when the store closed meanwhile.
async fn wait_or_closed(closed: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = closed.changed() => return true,
        _ = tokio::time::sleep(delay) => {}
    }
    *closed.borrow()
}

fn transport_error(e: reqwest::Error) -> StoreError {
    if e.is_decode() {
        StoreError::InvalidResponse(e.to_string())
    } else {
        StoreError::Network(e.to_string())
    }
}

fn non_null(value: Value) -> Option<Value> {
    (!value.is_null()).then_some(value)
}

#[async_trait]
impl RealtimeStore for FirebaseStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let builder = self.request(Method::GET, path)?;
        self.read_value(builder).await
    }

    async fn get_last_by_child(
        &self,
        path: &str,
        child: &str,
        limit: usize,
    ) -> Result<Option<Value>, StoreError> {
        // orderBy takes a JSON string literal
        let order_by = Value::String(child.to_string()).to_string();
        let builder = self
            .request(Method::GET, path)?
            .query(&[("orderBy", order_by), ("limitToLast", limit.to_string())]);

        match self.read_value(builder).await {
            // Without an `.indexOn` rule the server refuses ordered queries.
            Err(StoreError::Status { status: 400, body }) if body.contains("Index not defined") => {
                tracing::warn!("No index on {} under {}, ordering on the client", child, path);
                self.get(path).await
            }
            result => result,
        }
    }

    fn subscribe(&self, path: &str) -> ValueStream {
        let store = self.clone();
        let path = path.to_string();

        Box::pin(async_stream::stream! {
            let mut closed = store.closed.subscribe();
            let mut delay = RECONNECT_DELAY;

            while !*closed.borrow() {
                let response = match store.open_event_stream(&path).await {
                    Ok(response) => response,
                    Err(_) if *closed.borrow() => break,
                    Err(StoreError::Network(e)) => {
                        tracing::warn!("Could not listen to {}, retrying in {:?}: {}", path, delay, e);
                        if wait_or_closed(&mut closed, delay).await {
                            break;
                        }
                        delay = (delay * 2).min(MAX_RECONNECT_DELAY);
                        continue;
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };

                tracing::debug!("Listening to {}", path);
                delay = RECONNECT_DELAY;
                let mut body = response.bytes_stream();
                let mut parser = EventStreamParser::default();
                let mut cancelled = false;

                while !cancelled {
                    let next = tokio::select! {
                        _ = closed.changed() => None,
                        chunk = body.next() => Some(chunk),
                    };

                    let chunk = match next {
                        None => break,
                        Some(None) => {
                            tracing::debug!("Server ended the listener on {}", path);
                            break;
                        }
                        Some(Some(Err(e))) => {
                            tracing::warn!("Listener on {} dropped: {}", path, e);
                            break;
                        }
                        Some(Some(Ok(chunk))) => chunk,
                    };

                    for event in parser.feed(&chunk) {
                        match StreamAction::from_event(&event) {
                            StreamAction::Snapshot(value) => yield Ok(value),
                            StreamAction::Refetch => yield store.get(&path).await,
                            StreamAction::Ignore => {}
                            StreamAction::Cancel(reason) => {
                                yield Err(StoreError::Status { status: 401, body: reason });
                                cancelled = true;
                                break;
                            }
                        }
                    }
                }

                let stop = cancelled || *closed.borrow();
                if stop || wait_or_closed(&mut closed, delay).await {
                    break;
                }
            }
            tracing::debug!("Stopped listening to {}", path);
        })
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.write(Method::PUT, path, &value).await
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.write(Method::PATCH, path, &fields).await
    }

    async fn shutdown(&self) -> Result<(), StoreError> {
        self.closed.send_replace(true);
        Ok(())
    }
}

/// Opens a [`FirebaseStore`] for a validated configuration.
#[derive(Debug, Clone)]
pub struct FirebaseConnector {
    pub auth_token: Option<String>,
    pub request_timeout: Duration,
}

#[async_trait]
impl BackendConnector for FirebaseConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn RealtimeStore>, StoreError> {
        let url = config.database_url();
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(StoreError::InvalidPath(url));
        }

        tracing::info!("Opening realtime database session at {}", url);
        Ok(Arc::new(FirebaseStore::new(
            url,
            self.auth_token.clone(),
            self.request_timeout,
        )))
    }
}

/// What a listener does with one server-sent event.
#[derive(Debug, PartialEq)]
enum StreamAction {
    Snapshot(Option<Value>),
    Refetch,
    Ignore,
    Cancel(String),
}

impl StreamAction {
    fn from_event(event: &ServerEvent) -> Self {
        match event.name.as_str() {
            "put" | "patch" => match serde_json::from_str::<StreamPayload>(&event.data) {
                // A put at the root carries the whole value.
                Ok(payload) if event.name == "put" && payload.path == "/" => {
                    StreamAction::Snapshot(non_null(payload.data))
                }
                _ => StreamAction::Refetch,
            },
            "cancel" => StreamAction::Cancel(
                serde_json::from_str::<Option<String>>(&event.data)
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| "Permission denied".to_string()),
            ),
            "auth_revoked" => StreamAction::Cancel("Authentication revoked".to_string()),
            _ => StreamAction::Ignore,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ServerEvent {
    name: String,
    data: String,
}

/// Incremental `text/event-stream` parser. Chunks may split lines anywhere.
#[derive(Debug, Default)]
struct EventStreamParser {
    buffer: BytesMut,
    event: String,
    data: String,
}

impl EventStreamParser {
    fn feed(&mut self, chunk: &[u8]) -> Vec<ServerEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw = self.buffer.split_to(pos + 1);
            let text = String::from_utf8_lossy(&raw[..pos]).into_owned();
            let line = text.strip_suffix('\r').unwrap_or(&text);

            if line.is_empty() {
                if !self.event.is_empty() || !self.data.is_empty() {
                    events.push(ServerEvent {
                        name: std::mem::take(&mut self.event),
                        data: std::mem::take(&mut self.data),
                    });
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = value.to_string(),
                "data" => {
                    if !self.data.is_empty() {
                        self.data.push('\n');
                    }
                    self.data.push_str(value);
                }
                _ => {}
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use crate::application::data_service::DataService;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn store(url: &str) -> FirebaseStore {
        FirebaseStore::new(url.to_string(), Some("secret".into()), Duration::from_secs(2))
    }

    #[test]
    fn test_build_url() {
        let store = store("https://plant-default-rtdb.firebaseio.com/");
        assert_eq!(
            store.build_url("dataLogs/pump 1"),
            "https://plant-default-rtdb.firebaseio.com/dataLogs/pump%201.json"
        );
        assert_eq!(store.build_url(""), "https://plant-default-rtdb.firebaseio.com/.json");
    }

    #[test]
    fn test_parser_handles_split_chunks() {
        let mut parser = EventStreamParser::default();
        assert!(parser.feed(b"event: put\r\ndata: {\"path\":\"/\",").is_empty());
        let events = parser.feed(b"\"data\":{\"a\":1}}\r\n\r\n: comment\n\nevent: keep-alive\ndata: null\n\n");

        assert_eq!(
            events,
            vec![
                ServerEvent { name: "put".into(), data: "{\"path\":\"/\",\"data\":{\"a\":1}}".into() },
                ServerEvent { name: "keep-alive".into(), data: "null".into() },
            ]
        );
    }

    #[test]
    fn test_stream_actions() {
        let event = |name: &str, data: &str| ServerEvent { name: name.into(), data: data.into() };

        assert_eq!(
            StreamAction::from_event(&event("put", r#"{"path":"/","data":{"k":1}}"#)),
            StreamAction::Snapshot(Some(json!({ "k": 1 })))
        );
        assert_eq!(
            StreamAction::from_event(&event("put", r#"{"path":"/","data":null}"#)),
            StreamAction::Snapshot(None)
        );
        assert_eq!(
            StreamAction::from_event(&event("put", r#"{"path":"/k","data":2}"#)),
            StreamAction::Refetch
        );
        assert_eq!(
            StreamAction::from_event(&event("patch", r#"{"path":"/","data":{"k":2}}"#)),
            StreamAction::Refetch
        );
        assert_eq!(StreamAction::from_event(&event("keep-alive", "null")), StreamAction::Ignore);
        assert_eq!(
            StreamAction::from_event(&event("cancel", "null")),
            StreamAction::Cancel("Permission denied".into())
        );
    }

    type Seen = Arc<Mutex<Vec<(String, HashMap<String, String>, Option<Value>)>>>;

    async fn fake_database() -> (String, Seen) {
        let seen: Seen = Arc::default();
        let get_seen = seen.clone();
        let patch_seen = seen.clone();

        let app = Router::new().route(
            "/*path",
            get(move |Path(path): Path<String>, Query(query): Query<HashMap<String, String>>| {
                let seen = get_seen.clone();
                async move {
                    let ordered = query.contains_key("orderBy");
                    seen.lock().unwrap().push((path.clone(), query, None));
                    match path.as_str() {
                        "alerts/a1.json" => Ok(Json(json!({ "message": "hot" }))),
                        "dataLogs/d1.json" if ordered => Err((
                            StatusCode::BAD_REQUEST,
                            Json(json!({
                                "error": "Index not defined, add \".indexOn\": \"timestamp\", for path \"/dataLogs/d1\", to the rules"
                            })),
                        )),
                        "dataLogs/d1.json" => Ok(Json(json!({
                            "l1": { "timestamp": 1000, "value": 1.5, "unit": "bar", "deviceId": "d1", "status": "normal" },
                            "l2": { "timestamp": 2000, "value": 2.5, "unit": "bar", "deviceId": "d1", "status": "warning" }
                        }))),
                        "empty.json" => Ok(Json(Value::Null)),
                        _ => Err((StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))),
                    }
                }
            })
            .patch(
                move |Path(path): Path<String>,
                      Query(query): Query<HashMap<String, String>>,
                      Json(body): Json<Value>| {
                    let seen = patch_seen.clone();
                    async move {
                        seen.lock().unwrap().push((path, query, Some(body)));
                        StatusCode::NO_CONTENT
                    }
                },
            ),
        );

        (serve(app).await, seen)
    }

    async fn next(listener: &mut ValueStream) -> Option<Result<Option<Value>, StoreError>> {
        tokio::time::timeout(Duration::from_secs(5), listener.next())
            .await
            .expect("listener item in time")
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_get_and_errors_against_fake_database() {
        let (url, seen) = fake_database().await;
        let store = store(&url);

        assert_eq!(store.get("alerts/a1").await.unwrap(), Some(json!({ "message": "hot" })));
        assert_eq!(store.get("empty").await.unwrap(), None);
        assert_eq!(
            store.get("missing").await,
            Err(StoreError::Status { status: 404, body: "Not found".into() })
        );

        let requests = seen.lock().unwrap();
        assert_eq!(requests[0].1.get("auth").map(String::as_str), Some("secret"));
    }

    #[tokio::test]
    async fn test_update_sends_patch_with_fields_only() {
        let (url, seen) = fake_database().await;
        let store = store(&url);

        let mut fields = Map::new();
        fields.insert("acknowledged".into(), json!(true));
        store.update("alerts/a1", fields).await.unwrap();

        let requests = seen.lock().unwrap();
        let (path, query, body) = requests.last().unwrap();
        assert_eq!(path, "alerts/a1.json");
        assert_eq!(query.get("print").map(String::as_str), Some("silent"));
        assert_eq!(body.as_ref(), Some(&json!({ "acknowledged": true })));
    }

    #[tokio::test]
    async fn test_ordered_read_without_index_falls_back_to_full_read() {
        let (url, seen) = fake_database().await;
        let data = DataService::new(Arc::new(store(&url)));

        let logs = data.get_historical_data("d1", 2).await;

        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].id, "l2");
        assert_eq!(logs[1].timestamp, 1000);
        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].1.contains_key("orderBy"));
        assert!(!requests[1].1.contains_key("orderBy"));
    }

    #[tokio::test]
    async fn test_listener_reopens_after_stream_ends() {
        let opened = Arc::new(AtomicUsize::new(0));
        let counter = opened.clone();
        let app = Router::new().route(
            "/*path",
            get(move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    (
                        [(CONTENT_TYPE, "text/event-stream")],
                        format!("event: put\ndata: {{\"path\":\"/\",\"data\":{{\"n\":{}}}}}\n\n", n),
                    )
                }
            }),
        );
        let store = store(&serve(app).await);
        let mut listener = store.subscribe("readings");

        assert_eq!(next(&mut listener).await, Some(Ok(Some(json!({ "n": 1 })))));
        assert_eq!(next(&mut listener).await, Some(Ok(Some(json!({ "n": 2 })))));
        assert!(opened.load(Ordering::SeqCst) >= 2);

        store.shutdown().await.unwrap();
        assert_eq!(next(&mut listener).await, None);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_requests() {
        let store = store("http://127.0.0.1:9");
        store.shutdown().await.unwrap();
        assert_eq!(store.get("alerts").await, Err(StoreError::Closed));
    }
}
