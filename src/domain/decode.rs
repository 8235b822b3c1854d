// Typed decode helpers for loosely-typed store payloads
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a raw store value could not be turned into a record.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("expected an object, found {0}")]
    NotAnObject(&'static str),
    #[error("field `{0}` is missing or has the wrong type")]
    InvalidField(&'static str),
    #[error("field `{field}` has unknown value `{value}`")]
    UnknownVariant { field: &'static str, value: String },
}

pub type DecodeResult<T> = Result<T, DecodeError>;

pub fn object(raw: &Value) -> DecodeResult<&Map<String, Value>> {
    match raw {
        Value::Object(map) => Ok(map),
        Value::Null => Err(DecodeError::NotAnObject("null")),
        Value::Bool(_) => Err(DecodeError::NotAnObject("boolean")),
        Value::Number(_) => Err(DecodeError::NotAnObject("number")),
        Value::String(_) => Err(DecodeError::NotAnObject("string")),
        Value::Array(_) => Err(DecodeError::NotAnObject("array")),
    }
}

pub fn number(obj: &Map<String, Value>, field: &'static str) -> DecodeResult<f64> {
    obj.get(field)
        .and_then(Value::as_f64)
        .ok_or(DecodeError::InvalidField(field))
}

/// Epoch milliseconds. The store hands back integers, but a float is accepted too.
pub fn timestamp(obj: &Map<String, Value>, field: &'static str) -> DecodeResult<i64> {
    let value = obj.get(field).ok_or(DecodeError::InvalidField(field))?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .ok_or(DecodeError::InvalidField(field))
}

pub fn string(obj: &Map<String, Value>, field: &'static str) -> DecodeResult<String> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(DecodeError::InvalidField(field))
}

pub fn boolean(obj: &Map<String, Value>, field: &'static str) -> DecodeResult<bool> {
    obj.get(field)
        .and_then(Value::as_bool)
        .ok_or(DecodeError::InvalidField(field))
}

/// Non-empty string field, if present.
pub fn optional_string(obj: &Map<String, Value>, field: &str) -> Option<String> {
    obj.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Lowercase string enum such as `"warning"` or `"pending"`.
pub fn variant<T: DeserializeOwned>(obj: &Map<String, Value>, field: &'static str) -> DecodeResult<T> {
    let raw = string(obj, field)?;
    serde_json::from_value(Value::String(raw.clone())).map_err(|_| DecodeError::UnknownVariant {
        field,
        value: raw,
    })
}

/// Record id: the stored `id` field, then the store key, then `"unknown"`.
pub fn record_id(obj: &Map<String, Value>, key: Option<&str>) -> String {
    optional_string(obj, "id")
        .or_else(|| key.filter(|k| !k.is_empty()).map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_rejects_scalars() {
        assert_eq!(object(&json!(null)), Err(DecodeError::NotAnObject("null")));
        assert_eq!(object(&json!([1, 2])), Err(DecodeError::NotAnObject("array")));
        assert!(object(&json!({})).is_ok());
    }

    #[test]
    fn test_timestamp_accepts_float() {
        let raw = json!({ "a": 1700000000000i64, "b": 1700000000000.0, "c": "now" });
        let obj = object(&raw).unwrap();
        assert_eq!(timestamp(obj, "a"), Ok(1_700_000_000_000));
        assert_eq!(timestamp(obj, "b"), Ok(1_700_000_000_000));
        assert_eq!(timestamp(obj, "c"), Err(DecodeError::InvalidField("c")));
    }

    #[test]
    fn test_record_id_fallbacks() {
        let with_id = json!({ "id": "abc" });
        let empty_id = json!({ "id": "" });
        assert_eq!(record_id(object(&with_id).unwrap(), Some("key")), "abc");
        assert_eq!(record_id(object(&empty_id).unwrap(), Some("key")), "key");
        assert_eq!(record_id(object(&empty_id).unwrap(), None), "unknown");
    }
}
