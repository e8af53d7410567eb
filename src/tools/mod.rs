//! MCP tool implementations.
//!
//! - `database`: connect, list databases/tables, describe tables, ad-hoc SELECTs
//! - `devlake`: incident and deployment analytics over the `lake` schema
//! - `handler`: the rate limit → security gate → execute → mask pipeline

pub mod database;
pub mod devlake;
pub mod handler;

pub use database::{ExecuteQueryInput, GetTableSchemaInput, ListTablesInput};
pub use devlake::{AnalyticsOutput, DeploymentsInput, IncidentsInput};
pub use handler::{SecurityStats, ToolHandler};
