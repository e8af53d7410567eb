//! DevLake MCP Server Library
//!
//! MCP (Model Context Protocol) tools that give AI assistants read-only,
//! validated access to Konflux DevLake analytics data in MySQL.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod security;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{DbError, DbResult};
pub use mcp::DevLakeService;
pub use tools::ToolHandler;
