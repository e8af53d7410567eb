//! MCP server integration module.
//!
//! Binds the DevLake tool handlers to the MCP protocol using rmcp.

pub mod service;

pub use service::DevLakeService;
