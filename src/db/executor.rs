//! Query execution engine.
//!
//! This module runs one statement on a connection borrowed from the shared
//! [`ConnectionPool`]:
//! - lazy connect when no pool is live
//! - positional parameter binding
//! - read timeout around execute-and-fetch
//! - in-memory row limit applied after the fetch
//!
//! The executor uses database-specific implementations organized in submodules
//! with an intentionally parallel structure.

use crate::db::pool::{ConnectionPool, DbPool};
use crate::db::types::RowDecode;
use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, QueryRequest, QueryResult, Row};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Query executor that handles database query execution.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    pool: Arc<ConnectionPool>,
}

impl QueryExecutor {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Run `query` and return at most `limit` rows.
    pub async fn execute(&self, query: &str, limit: u32) -> QueryResult {
        self.execute_request(&QueryRequest::new(query).with_limit(limit))
            .await
    }

    /// Run a request. Failures are reported in the result, never raised.
    pub async fn execute_request(&self, request: &QueryRequest) -> QueryResult {
        match self.try_execute(request).await {
            Ok((rows, truncated)) => QueryResult::ok(&request.query, rows, truncated),
            Err(e) => {
                warn!(query = %request.query, error = %e, "Query failed");
                QueryResult::failure(&request.query, e.to_string())
            }
        }
    }

    /// Run a request, returning the (limited) rows and whether more were fetched.
    pub async fn try_execute(&self, request: &QueryRequest) -> DbResult<(Vec<Row>, bool)> {
        let start = Instant::now();
        let row_limit = request.effective_limit() as usize;
        let read_timeout = self.pool.read_timeout();

        let param_types: Vec<&str> = request.params.iter().map(QueryParam::type_name).collect();
        debug!(
            query = %request.query,
            params = ?param_types,
            limit = row_limit,
            timeout_secs = read_timeout.as_secs(),
            "Executing query"
        );

        let pool = self.pool.get_or_connect().await?;
        let mut rows = match &pool {
            DbPool::MySql(p) => {
                mysql::fetch_rows(p, &request.query, &request.params, read_timeout).await?
            }
            DbPool::SQLite(p) => {
                sqlite::fetch_rows(p, &request.query, &request.params, read_timeout).await?
            }
        };

        let total_rows = rows.len();
        let truncated = total_rows > row_limit;
        if truncated {
            rows.truncate(row_limit);
            debug!(total_rows, limit = row_limit, "Query result truncated");
        }

        debug!(
            rows = rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query completed"
        );
        Ok((rows, truncated))
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn timeout_error(operation: &str, timeout: Duration) -> DbError {
    DbError::timeout(operation, timeout.as_secs())
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below acquires one connection, which is returned to the pool
// when it goes out of scope: on success, on error, and when the caller drops
// the future mid-flight.

mod mysql {
    use super::*;
    use sqlx::mysql::MySqlArguments;
    use sqlx::{Executor, MySqlPool};

    pub async fn fetch_rows(
        pool: &MySqlPool,
        sql: &str,
        params: &[QueryParam],
        query_timeout: Duration,
    ) -> DbResult<Vec<Row>> {
        let mut conn = pool.acquire().await?;

        // Without params, use the text protocol so statements like SHOW work
        let fetched = if params.is_empty() {
            timeout(query_timeout, (&mut *conn).fetch_all(sql)).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            timeout(query_timeout, query.fetch_all(&mut *conn)).await
        };

        match fetched {
            Ok(Ok(rows)) => Ok(rows.iter().map(RowDecode::to_json_row).collect()),
            Ok(Err(e)) => Err(DbError::from_query_error(e, sql)),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    fn bind_param<'q>(
        query: sqlx::query::Query<'q, sqlx::MySql, MySqlArguments>,
        param: &'q QueryParam,
    ) -> sqlx::query::Query<'q, sqlx::MySql, MySqlArguments> {
        match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::sqlite::SqliteArguments;
    use sqlx::{Executor, SqlitePool};

    pub async fn fetch_rows(
        pool: &SqlitePool,
        sql: &str,
        params: &[QueryParam],
        query_timeout: Duration,
    ) -> DbResult<Vec<Row>> {
        let mut conn = pool.acquire().await?;

        let fetched = if params.is_empty() {
            timeout(query_timeout, (&mut *conn).fetch_all(sql)).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            timeout(query_timeout, query.fetch_all(&mut *conn)).await
        };

        match fetched {
            Ok(Ok(rows)) => Ok(rows.iter().map(RowDecode::to_json_row).collect()),
            Ok(Err(e)) => Err(DbError::from_query_error(e, sql)),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    fn bind_param<'q>(
        query: sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>,
        param: &'q QueryParam,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>> {
        match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
        }
    }
}
