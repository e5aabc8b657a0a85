//! Bidirectional value codec.
//!
//! Storage and JSON embedding need dialect-safe payloads: datetimes become
//! ISO-8601 strings (normalized to UTC at the column level) and byte
//! strings become base64. Inside JSON documents both are wrapped in marker
//! objects — `{"datetime": "…"}` and `{"bytes": "…"}` — so decoding can
//! restore the native types. Unknown single-key maps pass through
//! untouched.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use indexmap::IndexMap;

use crate::value::{format_datetime, parse_datetime, Value};

const DATETIME_MARKER: &str = "datetime";
const BYTES_MARKER: &str = "bytes";

/// Encode a value for storage or transport.
///
/// Maps are treated as rows: each entry is a column value, where scalars
/// normalize in place and nested containers switch to JSON encoding.
/// Lists at the top level are sequences of rows.
pub fn serialize(value: &Value) -> Value {
    match value {
        Value::Map(row) => Value::Map(
            row.iter()
                .map(|(key, value)| (key.clone(), serialize_column(value)))
                .collect(),
        ),
        Value::List(rows) => Value::List(rows.iter().map(serialize).collect()),
        other => serialize_column(other),
    }
}

/// Encode a single column value: normalize datetimes to UTC, keep bytes
/// native, and push containers through the JSON encoder.
pub fn serialize_column(value: &Value) -> Value {
    match value {
        Value::DateTime(dt) => Value::DateTime(*dt),
        Value::Map(_) | Value::List(_) => serialize_json(value),
        other => other.clone(),
    }
}

/// Encode a value embedded in a JSON document, wrapping datetimes and
/// bytes in their marker objects.
pub fn serialize_json(value: &Value) -> Value {
    match value {
        Value::DateTime(dt) => {
            let mut marker = IndexMap::new();
            marker.insert(DATETIME_MARKER.to_string(), Value::Str(format_datetime(dt)));
            Value::Map(marker)
        }
        Value::Bytes(bytes) => {
            let mut marker = IndexMap::new();
            marker.insert(BYTES_MARKER.to_string(), Value::Str(BASE64.encode(bytes)));
            Value::Map(marker)
        }
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(key, value)| (key.clone(), serialize_json(value)))
                .collect(),
        ),
        Value::List(items) => Value::List(items.iter().map(serialize_json).collect()),
        other => other.clone(),
    }
}

/// Invert [`serialize`].
pub fn deserialize(value: &Value) -> Value {
    match value {
        Value::Map(row) => Value::Map(
            row.iter()
                .map(|(key, value)| (key.clone(), deserialize_column(value)))
                .collect(),
        ),
        Value::List(rows) => Value::List(rows.iter().map(deserialize).collect()),
        other => other.clone(),
    }
}

pub fn deserialize_column(value: &Value) -> Value {
    match value {
        Value::Map(_) | Value::List(_) => deserialize_json(value),
        other => other.clone(),
    }
}

/// Invert [`serialize_json`], restoring marker objects to native values.
/// Markers that fail to parse pass through unchanged.
pub fn deserialize_json(value: &Value) -> Value {
    match value {
        Value::Map(map) => {
            if map.len() == 1 {
                if let Some(Value::Str(text)) = map.get(DATETIME_MARKER) {
                    if let Some(dt) = parse_datetime(text) {
                        return Value::DateTime(dt);
                    }
                }
                if let Some(Value::Str(text)) = map.get(BYTES_MARKER) {
                    if let Ok(bytes) = BASE64.decode(text) {
                        return Value::Bytes(bytes);
                    }
                }
            }
            Value::Map(
                map.iter()
                    .map(|(key, value)| (key.clone(), deserialize_json(value)))
                    .collect(),
            )
        }
        Value::List(items) => Value::List(items.iter().map(deserialize_json).collect()),
        other => other.clone(),
    }
}

// =============================================================================
// serde_json bridging
// =============================================================================

/// Convert an encoded value into a `serde_json::Value` for text storage.
/// Only JSON-safe variants remain after [`serialize_json`].
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::Number((*n).into()),
        Value::Float(x) => serde_json::Number::from_f64(*x)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::DateTime(dt) => serde_json::Value::String(format_datetime(dt)),
        Value::Bytes(bytes) => serde_json::Value::String(BASE64.encode(bytes)),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), to_json(value)))
                .collect(),
        ),
    }
}

pub fn from_json(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Value::Map(
            map.iter()
                .map(|(key, value)| (key.clone(), from_json(value)))
                .collect(),
        ),
    }
}

/// Serialize a column value to the JSON text stored in a JSON column.
pub fn to_json_text(value: &Value) -> String {
    to_json(&serialize_json(value)).to_string()
}

/// Parse stored JSON text back into a native value tree.
pub fn from_json_text(text: &str) -> Option<Value> {
    let parsed: serde_json::Value = serde_json::from_str(text).ok()?;
    Some(deserialize_json(&from_json(&parsed)))
}
