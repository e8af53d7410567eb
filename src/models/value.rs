//! Typed cell values and their canonical JSON encoding.
//!
//! Rows are decoded into [`SqlValue`] first and only then turned into JSON,
//! so that temporal and arbitrary-precision values get one well-defined text
//! form instead of whatever a serializer would pick.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as JsonValue;

/// A result row: column name to value, in column order.
pub type Row = serde_json::Map<String, JsonValue>;

/// A single decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Exact DECIMAL/NUMERIC text as sent by the server
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Json(JsonValue),
    List(Vec<SqlValue>),
    Map(Vec<(String, SqlValue)>),
}

impl SqlValue {
    /// Recursively convert into JSON, rendering dates and decimals as text.
    pub fn into_json(self) -> JsonValue {
        match self {
            SqlValue::Null => JsonValue::Null,
            SqlValue::Bool(v) => JsonValue::Bool(v),
            SqlValue::Int(v) => JsonValue::Number(v.into()),
            SqlValue::UInt(v) => JsonValue::Number(v.into()),
            SqlValue::Float(v) => serde_json::Number::from_f64(v)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(v.to_string())),
            SqlValue::Decimal(v) | SqlValue::Text(v) => JsonValue::String(v),
            SqlValue::Bytes(v) => decode_binary_value(&v),
            SqlValue::Date(v) => JsonValue::String(v.format("%Y-%m-%d").to_string()),
            SqlValue::Time(v) => JsonValue::String(v.format("%H:%M:%S%.f").to_string()),
            SqlValue::DateTime(v) => {
                JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            SqlValue::Json(v) => v,
            SqlValue::List(items) => {
                JsonValue::Array(items.into_iter().map(SqlValue::into_json).collect())
            }
            SqlValue::Map(entries) => JsonValue::Object(canonical_row(entries)),
        }
    }
}

/// Build a row from decoded cells, keeping column order.
pub fn canonical_row(cells: Vec<(String, SqlValue)>) -> Row {
    cells
        .into_iter()
        .map(|(name, value)| (name, value.into_json()))
        .collect()
}

/// Decode binary data to JSON: UTF-8 text when valid, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}
