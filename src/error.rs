//! Error types for the DevLake MCP Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Each variant maps to one failure kind of the query access layer so callers can
//! tell a retry-worthy connection hiccup apart from a rejected query.

use crate::db::retry::{ErrorClass, classify_sqlx_error};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Transient connection error: {message}")]
    TransientConnection {
        message: String,
        /// MySQL error number, if the driver reported one
        code: Option<u16>,
    },

    #[error("Connection failed: {message}")]
    FatalConnection { message: String, suggestion: String },

    #[error("Query execution failed: {message}")]
    QueryExecution {
        message: String,
        query: String,
        /// e.g., "42S02" for unknown table
        sql_state: Option<String>,
    },

    #[error("Validation denied: {reason}")]
    ValidationDenied {
        reason: String,
        matched_patterns: Vec<String>,
    },

    #[error(
        "Rate limit exceeded for '{caller}' on '{operation}': at most {limit} calls per {window_secs}s"
    )]
    RateLimitExceeded {
        caller: String,
        operation: String,
        limit: usize,
        window_secs: u64,
    },

    #[error("Session token has expired")]
    TokenExpired,

    #[error("Invalid session token")]
    TokenInvalid,

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout { operation: String, elapsed_secs: u64 },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a transient connection error.
    pub fn transient(message: impl Into<String>, code: Option<u16>) -> Self {
        Self::TransientConnection {
            message: message.into(),
            code,
        }
    }

    /// Create a fatal connection error with a helpful suggestion.
    pub fn fatal(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::FatalConnection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a query execution error carrying the offending query text.
    pub fn query_execution(
        message: impl Into<String>,
        query: impl Into<String>,
        sql_state: Option<String>,
    ) -> Self {
        Self::QueryExecution {
            message: message.into(),
            query: query.into(),
            sql_state,
        }
    }

    /// Create a validation denial.
    pub fn validation_denied(reason: impl Into<String>, matched_patterns: Vec<String>) -> Self {
        Self::ValidationDenied {
            reason: reason.into(),
            matched_patterns,
        }
    }

    /// Create a rate limit error.
    pub fn rate_limit_exceeded(
        caller: impl Into<String>,
        operation: impl Into<String>,
        limit: usize,
        window_secs: u64,
    ) -> Self {
        Self::RateLimitExceeded {
            caller: caller.into(),
            operation: operation.into(),
            limit,
            window_secs,
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Map a driver error raised while running `query`.
    ///
    /// Errors the retry table deems transient keep their connection-level kind;
    /// everything else becomes a query execution error with the query attached.
    pub fn from_query_error(err: sqlx::Error, query: &str) -> Self {
        if classify_sqlx_error(&err) == ErrorClass::Transient {
            return Self::from(err);
        }
        match err {
            sqlx::Error::Database(db_err) => {
                let sql_state = db_err.code().map(|c| c.to_string());
                Self::query_execution(db_err.message(), query, sql_state)
            }
            other => Self::query_execution(other.to_string(), query, None),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::FatalConnection { suggestion, .. } => Some(suggestion),
            Self::TransientConnection { .. } => {
                Some("The database connection dropped; retry the call shortly")
            }
            Self::QueryExecution { .. } => Some("Check the SQL syntax and referenced objects"),
            Self::RateLimitExceeded { .. } => Some("Back off and retry after the window elapses"),
            Self::TokenExpired => Some("Request a new session token"),
            _ => None,
        }
    }

    /// Retry classification of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::TransientConnection { .. } => ErrorClass::Transient,
            _ => ErrorClass::Fatal,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

/// Convert sqlx errors raised while establishing or probing a connection.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if classify_sqlx_error(&err) == ErrorClass::Transient {
            let code = crate::db::retry::mysql_error_number(&err);
            return DbError::transient(err.to_string(), code);
        }
        match err {
            sqlx::Error::Configuration(msg) => DbError::fatal(
                msg.to_string(),
                "Check the connection settings (host, port, credentials, database)",
            ),
            sqlx::Error::Database(db_err) => {
                let suggestion = match db_err.code().as_deref() {
                    Some("28000") => "Verify DB_USER and DB_PASSWORD",
                    Some("42000") => "Check that the database in DB_DATABASE exists",
                    _ => "Check the database server logs for details",
                };
                DbError::fatal(db_err.message(), suggestion)
            }
            sqlx::Error::Tls(tls_err) => DbError::fatal(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::PoolClosed => {
                DbError::fatal("Connection pool is closed", "Reconnect to the database")
            }
            other => DbError::fatal(
                other.to_string(),
                "Check network connectivity and database server status",
            ),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Build suggestion data as JSON value.
fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert DbError to MCP ErrorData for semantic error categorization.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        match &err {
            DbError::ValidationDenied {
                matched_patterns, ..
            } => rmcp::ErrorData::invalid_params(
                err.to_string(),
                Some(serde_json::json!({
                    "security_check": "failed",
                    "matched_patterns": matched_patterns,
                })),
            ),
            DbError::InvalidInput { .. }
            | DbError::RateLimitExceeded { .. }
            | DbError::QueryExecution { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), suggestion_data(err.suggestion()))
            }
            DbError::TokenExpired | DbError::TokenInvalid => {
                rmcp::ErrorData::invalid_request(err.to_string(), suggestion_data(err.suggestion()))
            }
            DbError::TransientConnection { .. }
            | DbError::FatalConnection { .. }
            | DbError::Timeout { .. }
            | DbError::Internal { .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), suggestion_data(err.suggestion()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::fatal("Access denied", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_retryable() {
        assert!(DbError::transient("server gone away", Some(2006)).is_retryable());
        assert!(!DbError::fatal("auth", "creds").is_retryable());
        assert!(!DbError::validation_denied("drop", vec![]).is_retryable());
        assert!(!DbError::query_execution("syntax", "SELEC 1", None).is_retryable());
    }

    #[test]
    fn test_io_error_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = DbError::from(sqlx::Error::Io(io));
        assert!(matches!(err, DbError::TransientConnection { code: None, .. }));
    }

    #[test]
    fn test_configuration_error_is_fatal() {
        let err = DbError::from(sqlx::Error::Configuration("bad url".into()));
        assert!(matches!(err, DbError::FatalConnection { .. }));
    }

    #[test]
    fn test_query_error_keeps_query_text() {
        let err = DbError::from_query_error(sqlx::Error::RowNotFound, "SELECT 1");
        match err {
            DbError::QueryExecution { query, .. } => assert_eq!(query, "SELECT 1"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_validation_maps_to_invalid_params() {
        let err = DbError::validation_denied("Dangerous SQL keyword detected: drop", vec![]);
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.code.0, -32602);
        let data = mcp_err.data.unwrap();
        assert_eq!(data["security_check"], "failed");
    }

    #[test]
    fn test_rate_limit_maps_to_invalid_params() {
        let err = DbError::rate_limit_exceeded("alice", "execute_query", 100, 60);
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.code.0, -32602);
        assert!(mcp_err.message.contains("alice"));
    }

    #[test]
    fn test_token_errors_map_to_invalid_request() {
        let mcp_err: rmcp::ErrorData = DbError::TokenExpired.into();
        assert_eq!(mcp_err.code.0, -32600);
        assert_eq!(mcp_err.data.unwrap()["suggestion"], "Request a new session token");
    }

    #[test]
    fn test_connection_maps_to_internal_error() {
        let err = DbError::fatal("failed", "try again");
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.code.0, -32603);
        assert_eq!(mcp_err.data.unwrap()["suggestion"], "try again");
    }
}
