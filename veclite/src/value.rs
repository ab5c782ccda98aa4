//! The row value type shared by the relational store, the filter
//! algebra, and the public table API.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::collections::BTreeMap;

/// A single cell value, typed according to a column's declared
/// [`crate::schema::ColumnType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Blob(Vec<u8>),
    Json(serde_json::Value),
    /// Sentinel meaning "no value was supplied" — the skip marker for
    /// `gt/gte/lt/lte` (the "unset" sentinel used to drop a between bound).
    Unset,
}

/// A row: column name to value, in no particular order.
pub type Row = BTreeMap<String, Value>;

impl Value {
    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    /// Render the value as SQL-bindable text for predicates that need a
    /// plain string (`ilike` patterns, JSON key names).
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Value::Null | Value::Unset => Ok(ToSqlOutput::from(rusqlite::types::Null)),
            Value::Integer(i) => Ok(ToSqlOutput::from(*i)),
            Value::Real(r) => Ok(ToSqlOutput::from(*r)),
            Value::Text(s) => Ok(ToSqlOutput::from(s.as_str())),
            Value::Bool(b) => Ok(ToSqlOutput::from(*b as i64)),
            Value::Blob(b) => Ok(ToSqlOutput::from(b.as_slice())),
            Value::Json(j) => Ok(ToSqlOutput::from(j.to_string())),
        }
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Value::Null),
            ValueRef::Integer(i) => Ok(Value::Integer(i)),
            ValueRef::Real(r) => Ok(Value::Real(r)),
            ValueRef::Text(t) => {
                let s = std::str::from_utf8(t).map_err(|e| FromSqlError::Other(Box::new(e)))?;
                Ok(Value::Text(s.to_string()))
            }
            ValueRef::Blob(b) => Ok(Value::Blob(b.to_vec())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_detection() {
        assert!(Value::Unset.is_unset());
        assert!(!Value::Integer(0).is_unset());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(42i64), Value::Integer(42));
        assert_eq!(Value::from("hi"), Value::Text("hi".to_string()));
        assert_eq!(Value::from(true), Value::Bool(true));
    }
}
