// Domain layer - Records stored under the realtime database paths
pub mod alert;
pub mod chart;
pub mod connection;
pub mod control_signal;
pub mod data_log;
pub mod decode;
pub mod push_id;

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
