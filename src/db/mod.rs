//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection pool ownership with bounded connect retries
//! - Query execution
//! - Type mappings

pub mod executor;
pub mod pool;
pub mod retry;
pub mod types;

pub use executor::QueryExecutor;
pub use pool::{ConnectionPool, DbPool};
pub use retry::{ErrorClass, RetryPolicy, RetryState, retry_async};
