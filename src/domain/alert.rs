// Alert domain model - threshold breaches reported for a device
use super::decode::{self, DecodeResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
    pub device_id: String,
    pub value: f64,
    pub threshold: f64,
    pub acknowledged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
    pub device_id: String,
    pub value: f64,
    pub threshold: f64,
}

impl Alert {
    pub fn from_new(new: NewAlert, id: String, timestamp: i64) -> Self {
        Self {
            id,
            timestamp,
            kind: new.kind,
            message: new.message,
            device_id: new.device_id,
            value: new.value,
            threshold: new.threshold,
            acknowledged: false,
        }
    }

    /// Decode a raw value stored under `alerts/{key}`. A missing
    /// `acknowledged` flag reads as not acknowledged.
    pub fn decode(key: Option<&str>, raw: &Value) -> DecodeResult<Self> {
        let obj = decode::object(raw)?;

        Ok(Self {
            id: decode::record_id(obj, key),
            timestamp: decode::timestamp(obj, "timestamp")?,
            kind: decode::variant(obj, "type")?,
            message: decode::string(obj, "message")?,
            device_id: decode::string(obj, "deviceId")?,
            value: decode::number(obj, "value")?,
            threshold: decode::number(obj, "threshold")?,
            acknowledged: decode::boolean(obj, "acknowledged").unwrap_or(false),
        })
    }
}

/// Number of alerts still waiting for an operator.
pub fn unacknowledged_count(alerts: &[Alert]) -> usize {
    alerts.iter().filter(|a| !a.acknowledged).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_alert() {
        let raw = json!({
            "timestamp": 10,
            "type": "critical",
            "message": "Pressure high",
            "deviceId": "pump-1",
            "value": 12.0,
            "threshold": 10
        });

        let alert = Alert::decode(Some("-Nkey"), &raw).unwrap();
        assert_eq!(alert.id, "-Nkey");
        assert_eq!(alert.kind, AlertKind::Critical);
        assert_eq!(alert.threshold, 10.0);
        assert!(!alert.acknowledged);
    }

    #[test]
    fn test_decode_rejects_partial_alert() {
        // What a full-value overwrite with `{acknowledged: true}` leaves behind.
        let raw = json!({ "acknowledged": true });
        assert!(Alert::decode(Some("a1"), &raw).is_err());
    }

    #[test]
    fn test_kind_serializes_as_type() {
        let alert = Alert::from_new(
            NewAlert {
                kind: AlertKind::Warning,
                message: "m".to_string(),
                device_id: "d".to_string(),
                value: 1.0,
                threshold: 2.0,
            },
            "id".to_string(),
            1,
        );
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["type"], "warning");
        assert_eq!(value["acknowledged"], false);
    }

    #[test]
    fn test_unacknowledged_count() {
        let mut a = Alert::decode(
            Some("a"),
            &json!({"timestamp": 1, "type": "warning", "message": "", "deviceId": "d", "value": 1, "threshold": 1}),
        )
        .unwrap();
        let b = a.clone();
        a.acknowledged = true;
        assert_eq!(unacknowledged_count(&[a, b]), 1);
    }
}
