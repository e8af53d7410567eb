//! Query-related data models.
//!
//! This module defines types for SQL query requests and results.

use super::value::Row;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default row limit for query results.
pub const DEFAULT_ROW_LIMIT: u32 = 100;

/// Maximum allowed row limit.
pub const MAX_ROW_LIMIT: u32 = 1000;

/// A positional parameter bound into a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl QueryParam {
    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for QueryParam {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// One independent query call. There is no prepared-statement identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Default: 100, clamped to 1..=1000
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub params: Vec<QueryParam>,
}

impl QueryRequest {
    /// Create a new query request with default options.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: None,
            params: Vec::new(),
        }
    }

    /// Add a parameter to this query.
    pub fn with_param(mut self, param: impl Into<QueryParam>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Replace all parameters.
    pub fn with_params(mut self, params: Vec<QueryParam>) -> Self {
        self.params = params;
        self
    }

    /// Set the row limit.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Get the effective row limit (with bounds checking).
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .map(|l| l.clamp(1, MAX_ROW_LIMIT))
            .unwrap_or(DEFAULT_ROW_LIMIT)
    }
}

/// Outcome of one query. Failures carry the query text and the error message.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryResult {
    pub success: bool,
    pub query: String,
    /// Rows returned to the caller, after truncation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Row>>,
    #[serde(default)]
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    /// Successful result.
    pub fn ok(query: impl Into<String>, rows: Vec<Row>, truncated: bool) -> Self {
        Self {
            success: true,
            query: query.into(),
            row_count: Some(rows.len()),
            data: Some(rows),
            truncated,
            error: None,
        }
    }

    /// Failed result.
    pub fn failure(query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            query: query.into(),
            row_count: None,
            data: None,
            truncated: false,
            error: Some(error.into()),
        }
    }

    /// Rows in the result (empty on failure).
    pub fn rows(&self) -> &[Row] {
        self.data.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_types() {
        assert_eq!(QueryParam::Null.type_name(), "null");
        assert_eq!(QueryParam::Int(42).type_name(), "int");
        assert_eq!(QueryParam::from("hello").type_name(), "string");
    }

    #[test]
    fn test_query_param_untagged_json() {
        let params: Vec<QueryParam> = serde_json::from_str(r#"[null, true, 7, 1.5, "x"]"#).unwrap();
        assert_eq!(
            params,
            vec![
                QueryParam::Null,
                QueryParam::Bool(true),
                QueryParam::Int(7),
                QueryParam::Float(1.5),
                QueryParam::String("x".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_request_defaults() {
        let req = QueryRequest::new("SELECT * FROM incidents");
        assert_eq!(req.effective_limit(), DEFAULT_ROW_LIMIT);
        assert!(req.params.is_empty());
    }

    #[test]
    fn test_query_request_bounds() {
        let req = QueryRequest::new("SELECT 1").with_limit(99999);
        assert_eq!(req.effective_limit(), MAX_ROW_LIMIT);

        let req = QueryRequest::new("SELECT 1").with_limit(0);
        assert_eq!(req.effective_limit(), 1);
    }

    #[test]
    fn test_failure_keeps_query() {
        let result = QueryResult::failure("SELECT * FROM missing", "no such table: missing");
        assert!(!result.success);
        assert_eq!(result.query, "SELECT * FROM missing");
        assert!(result.rows().is_empty());

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["error"], "no such table: missing");
    }

    #[test]
    fn test_ok_counts_rows() {
        let mut row = Row::new();
        row.insert("id".to_string(), serde_json::json!(1));
        let result = QueryResult::ok("SELECT id FROM t", vec![row], true);
        assert_eq!(result.row_count, Some(1));
        assert!(result.truncated);
    }
}
