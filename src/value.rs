//! Native values and rows.
//!
//! A [`Value`] is the engine's own value tree: the scalar column types plus
//! datetimes, byte strings, and arbitrarily nested lists and maps for JSON
//! columns. Rows are ordered maps from column name to value; equality
//! ignores insertion order, like any map.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use indexmap::IndexMap;

/// An ordered mapping of column name to value.
pub type Row = IndexMap<String, Value>;

/// A native value, before codec encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Render the value the way filters read in error messages:
    /// strings and datetimes quoted, scalars bare, null as `null`.
    pub(crate) fn display(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(x) => x.to_string(),
            Value::Str(s) => format!("'{s}'"),
            Value::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
            Value::DateTime(dt) => format!("'{}'", format_datetime(dt)),
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(Value::display).collect();
                format!("[{}]", rendered.join(", "))
            }
            Value::Map(_) => "{…}".to_string(),
        }
    }
}

/// ISO-8601 with microseconds, the wire form used for storage and markers.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, false)
}

pub(crate) fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Value {
    fn from(value: &[u8; N]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Value::DateTime(value.with_timezone(&Utc))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(value: IndexMap<String, Value>) -> Self {
        Value::Map(value)
    }
}

/// Build a [`Row`] from `"column" => value` pairs.
#[macro_export]
macro_rules! row {
    () => { $crate::Row::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut row = $crate::Row::new();
        $(row.insert($key.to_string(), $crate::Value::from($value));)+
        row
    }};
}

/// Build a [`Value::Map`] from `"key" => value` pairs.
#[macro_export]
macro_rules! vmap {
    () => { $crate::Value::Map($crate::Row::new()) };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Row::new();
        $(map.insert($key.to_string(), $crate::Value::from($value));)+
        $crate::Value::Map(map)
    }};
}

/// Build a [`Value::List`] from values.
#[macro_export]
macro_rules! vlist {
    () => { $crate::Value::List(Vec::new()) };
    ($($value:expr),+ $(,)?) => {
        $crate::Value::List(vec![$($crate::Value::from($value)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(1i64), Value::Int(1));
        assert_eq!(Value::from("foo"), Value::Str("foo".into()));
        assert_eq!(Value::from(Option::<i64>::None), Value::Null);
        assert_eq!(
            Value::from(vec![1i64, 2]),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_datetime_roundtrip() {
        // The wire form carries microseconds.
        let now = DateTime::from_timestamp_micros(Utc::now().timestamp_micros()).unwrap();
        let parsed = parse_datetime(&format_datetime(&now)).unwrap();
        assert_eq!(parsed, now);
    }

    #[test]
    fn test_row_macro() {
        let row = row! { "n" => 1i64, "s" => "foo" };
        assert_eq!(row["n"], Value::Int(1));
        assert_eq!(row["s"], Value::Str("foo".into()));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(1).display(), "1");
        assert_eq!(Value::Str("a".into()).display(), "'a'");
        assert_eq!(Value::Null.display(), "null");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Int(2)]).display(),
            "[1, 2]"
        );
    }
}
