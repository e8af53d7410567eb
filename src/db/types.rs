//! Database-agnostic type mappings.
//!
//! Row decoding uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders extract a typed [`SqlValue`]
//!
//! Canonical text forms for temporal and decimal values are applied later by
//! [`SqlValue::into_json`].

use crate::models::{DatabaseType, Row as JsonRow, SqlValue, canonical_row};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Date,
    Time,
    DateTime,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC affinity has no exact representation
        if db == DatabaseType::SQLite {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    // Temporal types, most specific first
    if lower.contains("datetime") || lower.contains("timestamp") {
        return TypeCategory::DateTime;
    }
    if lower == "date" {
        return TypeCategory::Date;
    }
    if lower == "time" {
        return TypeCategory::Time;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("int") {
        return TypeCategory::Integer;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "enum" || lower == "set" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Whether a MySQL type name is an exact DECIMAL/NUMERIC type.
pub fn is_decimal_type_name(name: &str) -> bool {
    let name = name.to_lowercase();
    name.contains("decimal") || name.contains("numeric")
}

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        is_decimal_type_name(ty.name())
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Row Decoding Trait
// =============================================================================

/// Decode a database row into ordered, typed cells.
pub trait RowDecode {
    fn to_sql_values(&self) -> Vec<(String, SqlValue)>;

    /// Decode and canonicalise into a JSON row.
    fn to_json_row(&self) -> JsonRow {
        canonical_row(self.to_sql_values())
    }
}

impl RowDecode for MySqlRow {
    fn to_sql_values(&self) -> Vec<(String, SqlValue)> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::MySQL);
                (col.name().to_string(), mysql::decode_column(self, idx, category))
            })
            .collect()
    }
}

impl RowDecode for SqliteRow {
    fn to_sql_values(&self) -> Vec<(String, SqlValue)> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::SQLite);
                (col.name().to_string(), sqlite::decode_column(self, idx, category))
            })
            .collect()
    }
}

/// Wrap an optional decoded value, treating NULL and decode failures alike.
fn opt<T>(value: Result<Option<T>, sqlx::Error>, f: impl FnOnce(T) -> SqlValue) -> Option<SqlValue> {
    match value {
        Ok(Some(v)) => Some(f(v)),
        Ok(None) => Some(SqlValue::Null),
        Err(_) => None,
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> SqlValue {
        let decoded = match category {
            TypeCategory::Decimal => opt(row.try_get::<Option<RawDecimal>, _>(idx), |v| {
                SqlValue::Decimal(v.0)
            }),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => opt(row.try_get::<Option<bool>, _>(idx), SqlValue::Bool),
            TypeCategory::Float => opt(row.try_get::<Option<f64>, _>(idx), SqlValue::Float)
                .or_else(|| {
                    opt(row.try_get::<Option<f32>, _>(idx), |v| {
                        SqlValue::Float(v as f64)
                    })
                }),
            TypeCategory::Date => opt(row.try_get::<Option<NaiveDate>, _>(idx), SqlValue::Date),
            TypeCategory::Time => opt(row.try_get::<Option<NaiveTime>, _>(idx), SqlValue::Time),
            TypeCategory::DateTime => opt(
                row.try_get::<Option<NaiveDateTime>, _>(idx),
                SqlValue::DateTime,
            ),
            TypeCategory::Json => opt(
                row.try_get::<Option<serde_json::Value>, _>(idx),
                SqlValue::Json,
            ),
            TypeCategory::Binary => opt(row.try_get::<Option<Vec<u8>>, _>(idx), SqlValue::Bytes),
            TypeCategory::Text | TypeCategory::Unknown => None,
        };

        decoded.unwrap_or_else(|| decode_fallback(row, idx))
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Option<SqlValue> {
        opt(row.try_get::<Option<i64>, _>(idx), SqlValue::Int)
            .or_else(|| opt(row.try_get::<Option<u64>, _>(idx), SqlValue::UInt))
    }

    fn decode_fallback(row: &MySqlRow, idx: usize) -> SqlValue {
        if let Some(v) = opt(row.try_get::<Option<String>, _>(idx), SqlValue::Text) {
            return v;
        }
        if let Some(v) = opt(row.try_get::<Option<Vec<u8>>, _>(idx), SqlValue::Bytes) {
            return v;
        }
        tracing::debug!(column = idx, "Undecodable MySQL value, returning null");
        SqlValue::Null
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, category: TypeCategory) -> SqlValue {
        // SQLite is dynamically typed: the stored value decides, the declared
        // type only refines booleans and temporal text.
        let storage = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return SqlValue::Null,
            Ok(raw) => raw.type_info().name().to_string(),
            Err(_) => return SqlValue::Null,
        };

        let refined = match category {
            TypeCategory::Boolean => opt(row.try_get::<Option<bool>, _>(idx), SqlValue::Bool),
            TypeCategory::Date => opt(row.try_get::<Option<NaiveDate>, _>(idx), SqlValue::Date),
            TypeCategory::Time => opt(row.try_get::<Option<NaiveTime>, _>(idx), SqlValue::Time),
            TypeCategory::DateTime => opt(
                row.try_get::<Option<NaiveDateTime>, _>(idx),
                SqlValue::DateTime,
            ),
            _ => None,
        };
        if let Some(value) = refined {
            return value;
        }

        let decoded = match storage.as_str() {
            "INTEGER" => opt(row.try_get::<Option<i64>, _>(idx), SqlValue::Int),
            "REAL" => opt(row.try_get::<Option<f64>, _>(idx), SqlValue::Float),
            "BLOB" => opt(row.try_get::<Option<Vec<u8>>, _>(idx), SqlValue::Bytes),
            _ => opt(row.try_get::<Option<String>, _>(idx), |v| {
                if category == TypeCategory::Json {
                    serde_json::from_str(&v)
                        .map(SqlValue::Json)
                        .unwrap_or(SqlValue::Text(v))
                } else {
                    SqlValue::Text(v)
                }
            }),
        };
        decoded.unwrap_or(SqlValue::Null)
    }
}
