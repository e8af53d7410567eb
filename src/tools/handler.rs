//! Per-call pipeline shared by every tool.
//!
//! Each call is throttled per caller and tool, screened by the security
//! gate, executed, and finally has its result rows masked.

use super::database::{self, LIST_DATABASES_SQL};
use super::devlake::{AnalyticsOutput, AnalyticsQuery, DeploymentsInput, IncidentsInput};
use crate::db::{ConnectionPool, QueryExecutor};
use crate::error::DbResult;
use crate::models::{ConnectReport, QueryRequest, QueryResult};
use crate::security::{
    IdentifierKind, RateLimiter, ResultMasker, SecurityGate, SessionTokenStore, ValidationVerdict,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Snapshot of the per-caller security state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SecurityStats {
    pub active_session_tokens: usize,
    pub rate_limit_entries: usize,
}

/// Runs tool calls against the shared pool.
///
/// Cloning is cheap; all clones share the pool, limiter and token store.
#[derive(Debug, Clone)]
pub struct ToolHandler {
    executor: QueryExecutor,
    gate: SecurityGate,
    masker: ResultMasker,
    rate_limiter: Arc<RateLimiter>,
    sessions: Arc<SessionTokenStore>,
}

impl ToolHandler {
    pub fn new(
        pool: Arc<ConnectionPool>,
        rate_limiter: Arc<RateLimiter>,
        sessions: Arc<SessionTokenStore>,
    ) -> Self {
        Self {
            executor: QueryExecutor::new(pool),
            gate: SecurityGate::new(),
            masker: ResultMasker::new(),
            rate_limiter,
            sessions,
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        self.executor.pool()
    }

    pub fn sessions(&self) -> &Arc<SessionTokenStore> {
        &self.sessions
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub async fn connect_database(&self, caller: &str) -> DbResult<ConnectReport> {
        self.rate_limiter.check(caller, "connect_database").await?;
        Ok(self.pool().connect().await)
    }

    pub async fn list_databases(&self, caller: &str) -> DbResult<QueryResult> {
        self.run(caller, "list_databases", &[], QueryRequest::new(LIST_DATABASES_SQL))
            .await
    }

    pub async fn list_tables(&self, caller: &str, database: &str) -> DbResult<QueryResult> {
        let checks = [self.gate.check_identifier(IdentifierKind::Database, database)];
        let request = QueryRequest::new(database::list_tables_sql(database));
        self.run(caller, "list_tables", &checks, request).await
    }

    pub async fn get_table_schema(
        &self,
        caller: &str,
        database: &str,
        table: &str,
    ) -> DbResult<QueryResult> {
        let checks = [
            self.gate.check_identifier(IdentifierKind::Database, database),
            self.gate.check_identifier(IdentifierKind::Table, table),
        ];
        let request = QueryRequest::new(database::table_schema_sql(database, table));
        self.run(caller, "get_table_schema", &checks, request).await
    }

    pub async fn execute_query(
        &self,
        caller: &str,
        query: &str,
        limit: Option<u32>,
    ) -> DbResult<QueryResult> {
        let checks = [database::screen_read_only(query), self.gate.check_query(query)];
        let mut request = QueryRequest::new(query);
        request.limit = limit;
        self.run(caller, "execute_query", &checks, request).await
    }

    pub async fn get_incidents(
        &self,
        caller: &str,
        input: &IncidentsInput,
    ) -> DbResult<AnalyticsOutput> {
        self.rate_limiter.check(caller, "get_incidents").await?;
        let query = input.build(chrono::Local::now().naive_local())?;
        Ok(self.run_analytics(query).await)
    }

    pub async fn get_deployments(
        &self,
        caller: &str,
        input: &DeploymentsInput,
    ) -> DbResult<AnalyticsOutput> {
        self.rate_limiter.check(caller, "get_deployments").await?;
        let query = input.build(chrono::Local::now().naive_local())?;
        Ok(self.run_analytics(query).await)
    }

    pub async fn security_stats(&self) -> SecurityStats {
        SecurityStats {
            active_session_tokens: self.sessions.stats().await.active_session_tokens,
            rate_limit_entries: self.rate_limiter.tracked_keys().await,
        }
    }

    /// Throttle, gate, execute, mask. The first denial wins.
    async fn run(
        &self,
        caller: &str,
        tool: &str,
        checks: &[ValidationVerdict],
        request: QueryRequest,
    ) -> DbResult<QueryResult> {
        self.rate_limiter.check(caller, tool).await?;

        if let Some(denied) = checks.iter().find(|v| !v.allowed) {
            warn!(caller, tool, reason = %denied.reason, "Tool call denied by security gate");
            denied.clone().into_result()?;
        }

        info!(caller, tool, "Running tool query");
        let result = self.executor.execute_request(&request).await;
        Ok(self.mask_result(result))
    }

    async fn run_analytics(&self, query: AnalyticsQuery) -> AnalyticsOutput {
        let result = self.executor.execute_request(&query.request).await;
        let result = self.mask_result(result);
        query.into_output(result)
    }

    fn mask_result(&self, mut result: QueryResult) -> QueryResult {
        result.data = result
            .data
            .take()
            .map(|rows| rows.into_iter().map(|row| self.masker.mask_row(row)).collect());
        result
    }
}
