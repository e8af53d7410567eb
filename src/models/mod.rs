//! Data models for the DevLake MCP Server.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod value;

// Re-export commonly used types
pub use connection::{
    ConnectReport, ConnectionInfo, ConnectionStatus, DatabaseType, PoolConfig,
};
pub use query::{DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT, QueryParam, QueryRequest, QueryResult};
pub use value::{Row, SqlValue, canonical_row};
