// Control signal domain model - operator commands queued for a device
use super::decode::{self, DecodeResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Start,
    Stop,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Pending,
    Executed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSignal {
    pub id: String,
    pub timestamp: i64,
    pub device_id: String,
    pub command: Command,
    pub status: SignalStatus,
    pub executed_by: String,
}

impl ControlSignal {
    /// A freshly issued command, waiting for the device side to execute it.
    pub fn pending(id: String, timestamp: i64, device_id: &str, command: Command, executed_by: &str) -> Self {
        Self {
            id,
            timestamp,
            device_id: device_id.to_string(),
            command,
            status: SignalStatus::Pending,
            executed_by: executed_by.to_string(),
        }
    }

    pub fn decode(key: Option<&str>, raw: &Value) -> DecodeResult<Self> {
        let obj = decode::object(raw)?;

        Ok(Self {
            id: decode::record_id(obj, key),
            timestamp: decode::timestamp(obj, "timestamp")?,
            device_id: decode::string(obj, "deviceId")?,
            command: decode::variant(obj, "command")?,
            status: decode::variant(obj, "status")?,
            executed_by: decode::string(obj, "executedBy")?,
        })
    }
}

/// The `n` most recent signals, oldest first.
pub fn most_recent(signals: &[ControlSignal], n: usize) -> Vec<ControlSignal> {
    let mut sorted = signals.to_vec();
    sorted.sort_by_key(|s| s.timestamp);
    let skip = sorted.len().saturating_sub(n);
    sorted.into_iter().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signal(id: &str, timestamp: i64) -> ControlSignal {
        ControlSignal::pending(id.to_string(), timestamp, "d1", Command::Start, "uid")
    }

    #[test]
    fn test_decode_signal() {
        let raw = json!({
            "id": "s1",
            "timestamp": 5,
            "deviceId": "d1",
            "command": "stop",
            "status": "executed",
            "executedBy": "operator"
        });

        let signal = ControlSignal::decode(None, &raw).unwrap();
        assert_eq!(signal.command, Command::Stop);
        assert_eq!(signal.status, SignalStatus::Executed);
        assert_eq!(signal.executed_by, "operator");
    }

    #[test]
    fn test_decode_rejects_unknown_command() {
        let raw = json!({
            "timestamp": 5, "deviceId": "d1", "command": "explode",
            "status": "pending", "executedBy": "u"
        });
        assert!(ControlSignal::decode(Some("k"), &raw).is_err());
    }

    #[test]
    fn test_most_recent() {
        let signals = vec![signal("c", 30), signal("a", 10), signal("d", 40), signal("b", 20)];
        let ids: Vec<_> = most_recent(&signals, 3).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);

        assert_eq!(most_recent(&signals[..1], 3).len(), 1);
    }
}
