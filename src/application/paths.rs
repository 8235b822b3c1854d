// Store paths for the three record kinds
use crate::application::error::StoreError;

pub const DATA_LOGS: &str = "dataLogs";
pub const ALERTS: &str = "alerts";
pub const CONTROL_SIGNALS: &str = "controlSignals";

/// Check one path segment: non-empty and free of the characters the
/// database reserves in keys.
pub fn key(segment: &str) -> Result<&str, StoreError> {
    let reserved = |c: char| matches!(c, '/' | '.' | '#' | '$' | '[' | ']') || c.is_control();
    if segment.is_empty() || segment.chars().any(reserved) {
        return Err(StoreError::InvalidPath(segment.to_string()));
    }
    Ok(segment)
}

pub fn device_logs(device_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}/{}", DATA_LOGS, key(device_id)?))
}

pub fn data_log(device_id: &str, log_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}/{}", device_logs(device_id)?, key(log_id)?))
}

pub fn alert(alert_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}/{}", ALERTS, key(alert_id)?))
}

pub fn device_signals(device_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}/{}", CONTROL_SIGNALS, key(device_id)?))
}

pub fn control_signal(device_id: &str, signal_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}/{}", device_signals(device_id)?, key(signal_id)?))
}

/// Split a slash-separated path into its non-empty segments.
pub fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(device_logs("pump-1").unwrap(), "dataLogs/pump-1");
        assert_eq!(alert("-Nabc").unwrap(), "alerts/-Nabc");
        assert_eq!(control_signal("d1", "s1").unwrap(), "controlSignals/d1/s1");
    }

    #[test]
    fn test_rejects_reserved_characters() {
        for bad in ["", "a/b", "a.b", "#x", "$x", "[0]"] {
            assert!(key(bad).is_err(), "{bad:?} should be rejected");
        }
        assert_eq!(
            device_logs("../alerts"),
            Err(StoreError::InvalidPath("../alerts".to_string()))
        );
    }

    #[test]
    fn test_segments() {
        assert_eq!(segments("/dataLogs//d1/"), vec!["dataLogs", "d1"]);
        assert!(segments("").is_empty());
    }
}
