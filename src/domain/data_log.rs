// Data log domain model - one sampled value from a device
use super::decode::{self, DecodeResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Normal,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataLog {
    pub id: String,
    pub timestamp: i64,
    pub value: f64,
    pub unit: String,
    pub device_id: String,
    pub status: LogStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A data log as submitted by a writer, before id and timestamp are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDataLog {
    pub value: f64,
    pub unit: String,
    pub device_id: String,
    pub status: LogStatus,
    #[serde(default)]
    pub message: Option<String>,
}

impl DataLog {
    pub fn from_new(new: NewDataLog, id: String, timestamp: i64) -> Self {
        Self {
            id,
            timestamp,
            value: new.value,
            unit: new.unit,
            device_id: new.device_id,
            status: new.status,
            message: new.message,
        }
    }

    /// Decode a raw value stored under `dataLogs/{deviceId}/{key}`.
    ///
    /// The shape check requires numeric `timestamp` and `value`, string `unit`
    /// and `deviceId`, and a known `status`. A missing `id` falls back to the
    /// store key and a zero `timestamp` to `now_ms`.
    pub fn decode(key: Option<&str>, raw: &Value, now_ms: i64) -> DecodeResult<Self> {
        let obj = decode::object(raw)?;
        let timestamp = decode::timestamp(obj, "timestamp")?;
        let value = decode::number(obj, "value")?;
        let unit = decode::string(obj, "unit")?;
        let device_id = decode::string(obj, "deviceId")?;
        let status = decode::variant(obj, "status")?;

        Ok(Self {
            id: decode::record_id(obj, key),
            timestamp: if timestamp == 0 { now_ms } else { timestamp },
            value,
            unit,
            device_id,
            status,
            message: decode::optional_string(obj, "message"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decode::DecodeError;
    use serde_json::json;

    #[test]
    fn test_decode_valid_log() {
        let raw = json!({
            "id": "log-1",
            "timestamp": 1_700_000_000_000i64,
            "value": 21.5,
            "unit": "°C",
            "deviceId": "d1",
            "status": "warning",
            "message": "High"
        });

        let log = DataLog::decode(Some("key"), &raw, 0).unwrap();
        assert_eq!(log.id, "log-1");
        assert_eq!(log.value, 21.5);
        assert_eq!(log.status, LogStatus::Warning);
        assert_eq!(log.message.as_deref(), Some("High"));
    }

    #[test]
    fn test_decode_fills_defaults() {
        let raw = json!({
            "timestamp": 0,
            "value": 3,
            "unit": "bar",
            "deviceId": "d1",
            "status": "normal"
        });

        let log = DataLog::decode(Some("-Nabc"), &raw, 42).unwrap();
        assert_eq!(log.id, "-Nabc");
        assert_eq!(log.timestamp, 42);
        assert_eq!(log.value, 3.0);
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        let wrong_value = json!({
            "timestamp": 1, "value": "3", "unit": "bar", "deviceId": "d1", "status": "normal"
        });
        assert_eq!(
            DataLog::decode(None, &wrong_value, 0),
            Err(DecodeError::InvalidField("value"))
        );

        let bad_status = json!({
            "timestamp": 1, "value": 3, "unit": "bar", "deviceId": "d1", "status": "ok"
        });
        assert!(matches!(
            DataLog::decode(None, &bad_status, 0),
            Err(DecodeError::UnknownVariant { field: "status", .. })
        ));

        assert!(DataLog::decode(None, &json!("text"), 0).is_err());
    }

    #[test]
    fn test_serializes_camel_case() {
        let log = DataLog::from_new(
            NewDataLog {
                value: 1.0,
                unit: "V".to_string(),
                device_id: "d1".to_string(),
                status: LogStatus::Critical,
                message: None,
            },
            "id".to_string(),
            5,
        );
        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(value["deviceId"], "d1");
        assert_eq!(value["status"], "critical");
        assert!(value.get("message").is_none());
    }
}
