//! Integration tests for query execution against SQLite.

use devlake_mcp_server::db::{ConnectionPool, QueryExecutor};
use devlake_mcp_server::models::{PoolConfig, QueryParam, QueryRequest};
use serde_json::json;
use std::sync::Arc;

/// Executor over a single in-memory connection with a small incidents table.
async fn setup_executor() -> QueryExecutor {
    let pool = Arc::new(ConnectionPool::new(PoolConfig::sqlite("sqlite::memory:")));
    let executor = QueryExecutor::new(pool);

    for statement in [
        "CREATE TABLE incidents (
            id INTEGER PRIMARY KEY,
            incident_key TEXT NOT NULL,
            status TEXT,
            created_date DATETIME,
            resolved_on DATE,
            cost TEXT,
            score REAL,
            payload BLOB
        )",
        "INSERT INTO incidents VALUES
            (1, 'INC-1', 'DONE', '2024-03-05 14:07:09', '2024-03-06', '99.990', 1.5, x'68656c6c6f'),
            (2, 'INC-2', 'OPEN', '2024-03-07 08:00:00', NULL, '0.10', NULL, x'fffe'),
            (3, 'INC-3', 'OPEN', '2024-03-08 09:30:00', NULL, NULL, 2.0, NULL)",
    ] {
        let result = executor.execute(statement, 100).await;
        assert!(result.success, "setup failed: {:?}", result.error);
    }
    executor
}

#[tokio::test]
async fn test_limit_truncates_after_fetch() {
    let executor = setup_executor().await;

    let result = executor
        .execute("SELECT id FROM incidents ORDER BY id", 2)
        .await;
    assert!(result.success);
    assert_eq!(result.row_count, Some(2));
    assert_eq!(result.rows().len(), 2);
    assert!(result.truncated);

    let result = executor
        .execute("SELECT id FROM incidents ORDER BY id", 10)
        .await;
    assert_eq!(result.row_count, Some(3));
    assert!(!result.truncated);
}

#[tokio::test]
async fn test_lazy_connect_on_first_query() {
    let pool = Arc::new(ConnectionPool::new(PoolConfig::sqlite("sqlite::memory:")));
    let executor = QueryExecutor::new(pool.clone());
    assert!(!pool.test_connection().await);

    let result = executor.execute("SELECT 1 AS one", 10).await;
    assert!(result.success);
    assert_eq!(result.rows()[0]["one"], 1);
    assert!(pool.test_connection().await);
}

#[tokio::test]
async fn test_values_are_canonical() {
    let executor = setup_executor().await;

    let result = executor
        .execute(
            "SELECT created_date, resolved_on, cost, score, payload FROM incidents ORDER BY id",
            10,
        )
        .await;
    assert!(result.success, "query failed: {:?}", result.error);

    let rows = result.rows();
    assert_eq!(rows[0]["created_date"], "2024-03-05T14:07:09");
    assert_eq!(rows[0]["resolved_on"], "2024-03-06");
    // Decimal text is preserved exactly, trailing zero included
    assert_eq!(rows[0]["cost"], "99.990");
    assert_eq!(rows[0]["score"], 1.5);
    assert_eq!(rows[0]["payload"], "hello");

    assert_eq!(rows[1]["resolved_on"], json!(null));
    // Invalid UTF-8 falls back to base64
    assert_eq!(rows[1]["payload"], "//4=");
    assert_eq!(rows[2]["cost"], json!(null));
}

#[tokio::test]
async fn test_columns_keep_select_order() {
    let executor = setup_executor().await;

    let result = executor
        .execute("SELECT status, id, incident_key FROM incidents WHERE id = 1", 10)
        .await;
    let columns: Vec<&String> = result.rows()[0].keys().collect();
    assert_eq!(columns, ["status", "id", "incident_key"]);
}

#[tokio::test]
async fn test_bound_params() {
    let executor = setup_executor().await;

    let request = QueryRequest::new("SELECT incident_key FROM incidents WHERE status = ? AND id > ?")
        .with_param("OPEN")
        .with_param(2i64);
    let result = executor.execute_request(&request).await;
    assert!(result.success);
    assert_eq!(result.rows().len(), 1);
    assert_eq!(result.rows()[0]["incident_key"], "INC-3");

    // A quote inside a bound value is data, not SQL
    let request = QueryRequest::new("SELECT COUNT(*) AS n FROM incidents WHERE status = ?")
        .with_params(vec![QueryParam::from("OPEN' OR '1'='1")]);
    let result = executor.execute_request(&request).await;
    assert_eq!(result.rows()[0]["n"], 0);
}

#[tokio::test]
async fn test_failure_carries_query_text() {
    let executor = setup_executor().await;

    let result = executor.execute("SELECT * FROM lake.missing", 10).await;
    assert!(!result.success);
    assert_eq!(result.query, "SELECT * FROM lake.missing");
    assert!(result.data.is_none());
    assert!(result.error.unwrap().contains("Query execution failed"));

    // The connection went back to the pool: the next query still works
    let result = executor.execute("SELECT COUNT(*) AS n FROM incidents", 10).await;
    assert_eq!(result.rows()[0]["n"], 3);
}

#[tokio::test]
async fn test_result_serialization_shape() {
    let executor = setup_executor().await;

    let result = executor.execute("SELECT id FROM incidents WHERE id = 1", 10).await;
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(
        json,
        json!({
            "success": true,
            "query": "SELECT id FROM incidents WHERE id = 1",
            "row_count": 1,
            "data": [{"id": 1}],
            "truncated": false
        })
    );
}

/// Requires a running MySQL server. Set TEST_MYSQL_URL to run.
#[tokio::test]
async fn test_mysql_decimal_and_datetime_text() {
    let mysql_url = match std::env::var("TEST_MYSQL_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: TEST_MYSQL_URL not set");
            return;
        }
    };

    let config = devlake_mcp_server::Config {
        database_url: Some(mysql_url),
        ..Default::default()
    };
    let pool = Arc::new(ConnectionPool::new(config.pool_config().unwrap()));
    let executor = QueryExecutor::new(pool);

    let result = executor
        .execute(
            "SELECT CAST('99.990' AS DECIMAL(10,3)) AS price, \
             CAST('2024-03-05 14:07:09' AS DATETIME) AS at",
            10,
        )
        .await;
    assert!(result.success, "query failed: {:?}", result.error);
    assert_eq!(result.rows()[0]["price"], "99.990");
    assert_eq!(result.rows()[0]["at"], "2024-03-05T14:07:09");
}
