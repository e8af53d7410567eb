//! Integration tests for the tool pipeline: rate limit, security gate,
//! execution and masking, against an in-memory SQLite `lake` schema.

use devlake_mcp_server::db::{ConnectionPool, QueryExecutor};
use devlake_mcp_server::error::DbError;
use devlake_mcp_server::models::PoolConfig;
use devlake_mcp_server::security::{RateLimiter, SessionTokenStore};
use devlake_mcp_server::tools::{IncidentsInput, ToolHandler};
use std::sync::Arc;
use std::time::Duration;

const CALLER: &str = "test-client";

/// Handler over one in-memory connection with `lake.incidents` attached.
async fn setup_handler(limiter: RateLimiter) -> ToolHandler {
    let pool = Arc::new(ConnectionPool::new(PoolConfig::sqlite("sqlite::memory:")));
    let setup = QueryExecutor::new(pool.clone());

    for statement in [
        "ATTACH DATABASE ':memory:' AS lake",
        "CREATE TABLE lake.incidents (
            id TEXT PRIMARY KEY,
            incident_key TEXT NOT NULL,
            title TEXT,
            status TEXT,
            component TEXT,
            reporter TEXT,
            created_date TEXT,
            updated_date TEXT,
            resolution_date TEXT
        )",
        "INSERT INTO lake.incidents VALUES
            ('a1', 'INC-1', 'Build outage', 'OPEN', 'build-service', 'ops@konflux.dev',
             '2024-03-01 10:00:00', '2024-03-01 10:00:00', NULL),
            ('a2', 'INC-1', 'Build outage', 'DONE', 'build-service', 'ops@konflux.dev',
             '2024-03-01 10:00:00', '2024-03-02 09:00:00', '2024-03-02 09:00:00'),
            ('b1', 'INC-2', 'UI latency', 'OPEN', 'ui', 'dev@konflux.dev',
             '2024-03-05 08:00:00', '2024-03-05 08:00:00', NULL)",
    ] {
        let result = setup.execute(statement, 10).await;
        assert!(result.success, "setup failed: {:?}", result.error);
    }

    ToolHandler::new(pool, Arc::new(limiter), Arc::new(SessionTokenStore::default()))
}

#[tokio::test]
async fn test_execute_query_rejects_writes_before_execution() {
    let handler = setup_handler(RateLimiter::default()).await;

    let err = handler
        .execute_query(CALLER, "DELETE FROM lake.incidents", None)
        .await
        .unwrap_err();
    match err {
        DbError::ValidationDenied { reason, .. } => assert_eq!(
            reason,
            "Query contains dangerous keyword 'DELETE'. Only SELECT queries are allowed for security reasons."
        ),
        other => panic!("unexpected error: {:?}", other),
    }

    let err = handler
        .execute_query(CALLER, "PRAGMA table_info(incidents)", None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("must start with SELECT"));

    // Nothing was deleted
    let result = handler
        .execute_query(CALLER, "SELECT COUNT(*) AS n FROM lake.incidents", None)
        .await
        .unwrap();
    assert_eq!(result.rows()[0]["n"], 3);
}

#[tokio::test]
async fn test_execute_query_masks_and_limits() {
    let handler = setup_handler(RateLimiter::default()).await;

    let result = handler
        .execute_query(
            CALLER,
            "SELECT id, reporter, created_date FROM lake.incidents ORDER BY id",
            Some(2),
        )
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.row_count, Some(2));
    assert!(result.truncated);
    assert_eq!(result.rows()[0]["reporter"], "***@***");
    assert_eq!(result.rows()[0]["id"], "a1");
}

#[tokio::test]
async fn test_identifier_checks_guard_schema_tools() {
    let handler = setup_handler(RateLimiter::default()).await;

    let err = handler
        .list_tables(CALLER, "information_schema")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("is reserved"));

    let err = handler
        .get_table_schema(CALLER, "lake", "incidents`; DROP TABLE x")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::ValidationDenied { .. }));

    // Valid names reach the database; SQLite has no SHOW, so the failure is structured
    let result = handler.list_tables(CALLER, "lake").await.unwrap();
    assert!(!result.success);
    assert_eq!(result.query, "SHOW TABLES FROM `lake`");
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_rate_limit_is_per_tool() {
    let window = Duration::from_secs(2);
    let handler = setup_handler(RateLimiter::new(2, window)).await;

    for _ in 0..2 {
        handler
            .execute_query(CALLER, "SELECT 1", None)
            .await
            .unwrap();
    }
    let err = handler
        .execute_query(CALLER, "SELECT 1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::RateLimitExceeded { limit: 2, .. }));

    // Denied before validation too
    let err = handler
        .execute_query(CALLER, "DROP TABLE x", None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::RateLimitExceeded { .. }));

    assert!(handler.list_databases(CALLER).await.is_ok());
    assert!(handler.execute_query("other", "SELECT 1", None).await.is_ok());

    tokio::time::sleep(window + Duration::from_millis(100)).await;
    assert!(handler.execute_query(CALLER, "SELECT 1", None).await.is_ok());

    let stats = handler.security_stats().await;
    assert_eq!(stats.rate_limit_entries, 3);
    assert_eq!(stats.active_session_tokens, 0);
}

#[tokio::test]
async fn test_incidents_are_deduplicated() {
    let handler = setup_handler(RateLimiter::default()).await;

    let output = handler
        .get_incidents(CALLER, &IncidentsInput::default())
        .await
        .unwrap();
    let result = &output.result;
    assert!(result.success, "query failed: {:?}", result.error);
    assert_eq!(result.row_count, Some(2));

    let rows = result.rows();
    // Newest created first; INC-1 shows its latest version
    assert_eq!(rows[0]["incident_key"], "INC-2");
    assert_eq!(rows[1]["incident_key"], "INC-1");
    assert_eq!(rows[1]["status"], "DONE");
    assert_eq!(rows[1]["reporter"], "***@***");
    assert_eq!(output.filters["status"], "all");
}

#[tokio::test]
async fn test_incident_filters() {
    let handler = setup_handler(RateLimiter::default()).await;

    let input = IncidentsInput {
        status: Some("OPEN".into()),
        start_date: Some("2024-03-01".into()),
        end_date: Some("2024-03-04".into()),
        ..Default::default()
    };
    let output = handler.get_incidents(CALLER, &input).await.unwrap();
    let rows = output.result.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "a1");
    assert_eq!(output.filters["end_date"], "2024-03-04 23:59:59");

    // Injection attempts in filter values are just unmatched data
    let input = IncidentsInput {
        component: Some("ui' OR '1'='1".into()),
        ..Default::default()
    };
    let output = handler.get_incidents(CALLER, &input).await.unwrap();
    assert!(output.result.success);
    assert_eq!(output.result.row_count, Some(0));
    assert_eq!(output.filters["component"], "ui OR 1=1");
}

#[tokio::test]
async fn test_incidents_reject_unknown_date_field() {
    let handler = setup_handler(RateLimiter::default()).await;

    let input = IncidentsInput {
        date_field: Some("finished_date".into()),
        ..Default::default()
    };
    let err = handler.get_incidents(CALLER, &input).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_connect_database_tool() {
    let handler = setup_handler(RateLimiter::default()).await;

    let report = handler.connect_database(CALLER).await.unwrap();
    assert!(report.success);
    assert_eq!(report.attempts, 0);
}
