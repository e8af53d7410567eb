//! Connection pool management.
//!
//! One [`ConnectionPool`] owns the process-wide database pool. Pool creation is
//! driven through the [`RetryPolicy`] so that a briefly unreachable server does
//! not fail startup, and every created pool is verified with a health check
//! before it is published to callers.

use crate::db::retry::{RetryPolicy, retry_async};
use crate::error::{DbError, DbResult};
use crate::models::{ConnectReport, ConnectionStatus, DatabaseType, PoolConfig};
use sqlx::{
    MySqlPool, SqlitePool, mysql::MySqlConnectOptions, mysql::MySqlPoolOptions,
    sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions,
};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Database-specific connection pool (avoids AnyPool limitations).
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    SQLite(SqlitePool),
}

impl DbPool {
    /// Close the connection pool.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::SQLite(pool) => pool.close().await,
        }
    }

    /// Whether `close` has been called on this pool.
    pub fn is_closed(&self) -> bool {
        match self {
            DbPool::MySql(pool) => pool.is_closed(),
            DbPool::SQLite(pool) => pool.is_closed(),
        }
    }

    /// Get the database type for this pool.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbPool::MySql(_) => DatabaseType::MySQL,
            DbPool::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Number of open connections (idle and in use).
    pub fn size(&self) -> u32 {
        match self {
            DbPool::MySql(pool) => pool.size(),
            DbPool::SQLite(pool) => pool.size(),
        }
    }
}

#[derive(Debug, Clone)]
struct LivePool {
    pool: DbPool,
    version: String,
}

/// Owner of the shared database pool.
///
/// At most one pool is live at a time. Queries borrow a connection from it for
/// the duration of one statement; the pool itself is the only shared state.
#[derive(Debug)]
pub struct ConnectionPool {
    config: PoolConfig,
    retry_policy: RetryPolicy,
    live: RwLock<Option<LivePool>>,
    /// Serializes pool creation so concurrent callers never build two pools
    connect_lock: Mutex<()>,
}

impl ConnectionPool {
    /// Create an unconnected pool owner. No sockets are opened until `connect`.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            retry_policy: RetryPolicy::default(),
            live: RwLock::new(None),
            connect_lock: Mutex::new(()),
        }
    }

    /// Replace the retry policy used for pool creation.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Bound on executing and fetching one query.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.config.read_timeout_secs)
    }

    /// Bound on the short health-check and liveness statements.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.config.write_timeout_secs)
    }

    /// Establish the pool unless a live one exists.
    ///
    /// Never fails with an error: the outcome, including the last underlying
    /// error on exhaustion, is reported in the returned [`ConnectReport`].
    pub async fn connect(&self) -> ConnectReport {
        let info = self.config.info();
        match self.establish().await {
            (Ok((live, reused)), attempts) => ConnectReport {
                success: true,
                message: Some(if reused {
                    "Already connected".to_string()
                } else {
                    format!(
                        "Connected to {} database '{}'",
                        self.config.db_type, self.config.database
                    )
                }),
                version: Some(live.version),
                connection_info: info,
                error: None,
                attempts,
            },
            (Err(err), attempts) => ConnectReport {
                success: false,
                message: Some(format!("Failed to connect after {} attempt(s)", attempts)),
                version: None,
                connection_info: info,
                error: Some(err.to_string()),
                attempts,
            },
        }
    }

    /// Tear down any existing pool, then connect again.
    pub async fn reconnect(&self) -> ConnectReport {
        info!("Reconnecting to database");
        self.close().await;
        self.connect().await
    }

    /// Close every connection and forget the pool. Idempotent.
    pub async fn close(&self) {
        let previous = self.live.write().await.take();
        match previous {
            Some(live) => {
                live.pool.close().await;
                info!(database = %self.config.database, "Database pool closed");
            }
            None => debug!("Close requested with no live pool"),
        }
    }

    /// Liveness probe. A missing or broken pool reports `false`.
    pub async fn test_connection(&self) -> bool {
        let Some(pool) = self.current().await else {
            return false;
        };
        match self.ping(&pool).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Connection test failed");
                false
            }
        }
    }

    /// Connection details and liveness. Never includes the password.
    pub async fn connection_info(&self) -> ConnectionStatus {
        ConnectionStatus {
            info: self.config.info(),
            connected: self.current().await.is_some(),
        }
    }

    /// The live pool, connecting first if there is none.
    pub async fn get_or_connect(&self) -> DbResult<DbPool> {
        if let Some(pool) = self.current().await {
            return Ok(pool);
        }
        debug!("No live pool, connecting lazily");
        self.establish().await.0.map(|(live, _)| live.pool)
    }

    /// The live pool, if any.
    pub async fn current(&self) -> Option<DbPool> {
        self.live
            .read()
            .await
            .as_ref()
            .filter(|live| !live.pool.is_closed())
            .map(|live| live.pool.clone())
    }

    /// Returns the live pool (and whether it was reused) plus the number of
    /// creation attempts made by this call.
    async fn establish(&self) -> (DbResult<(LivePool, bool)>, u32) {
        let _guard = self.connect_lock.lock().await;

        let existing = self
            .live
            .read()
            .await
            .as_ref()
            .filter(|live| !live.pool.is_closed())
            .cloned();
        if let Some(live) = existing {
            debug!("Reusing live pool");
            return (Ok((live, true)), 0);
        }

        info!(
            db_type = %self.config.db_type,
            host = %self.config.host,
            port = self.config.port,
            database = %self.config.database,
            "Connecting to database"
        );

        let outcome = retry_async(&self.retry_policy, "connect", |attempt| async move {
            debug!(attempt, "Creating connection pool");
            let pool = self.create_pool().await?;
            match self.health_check(&pool).await {
                Ok(version) => Ok(LivePool { pool, version }),
                Err(e) => {
                    pool.close().await;
                    Err(e)
                }
            }
        })
        .await;

        let attempts = outcome.state.attempts;
        match outcome.result {
            Ok(live) => {
                info!(
                    version = %live.version,
                    attempts,
                    min_size = self.config.min_size,
                    max_size = self.config.max_size,
                    "Connected successfully"
                );
                *self.live.write().await = Some(live.clone());
                (Ok((live, false)), attempts)
            }
            Err(e) => {
                warn!(error = %e, attempts, "Failed to establish database pool");
                (Err(e), attempts)
            }
        }
    }

    /// Create a connection pool for the configuration.
    async fn create_pool(&self) -> DbResult<DbPool> {
        let config = &self.config;
        let acquire_timeout = Duration::from_secs(config.connect_timeout_secs);
        let max_lifetime = Some(Duration::from_secs(config.recycle_secs));

        match config.db_type {
            DatabaseType::MySQL => {
                let mut options = MySqlConnectOptions::new()
                    .host(&config.host)
                    .port(config.port)
                    .username(&config.user)
                    .password(&config.password)
                    .charset("utf8mb4");
                if !config.database.is_empty() {
                    options = options.database(&config.database);
                }

                let pool = MySqlPoolOptions::new()
                    .min_connections(config.min_size)
                    .max_connections(config.max_size)
                    .acquire_timeout(acquire_timeout)
                    .max_lifetime(max_lifetime)
                    .connect_with(options)
                    .await?;
                Ok(DbPool::MySql(pool))
            }
            DatabaseType::SQLite => {
                let options = SqliteConnectOptions::from_str(&config.database).map_err(|e| {
                    DbError::fatal(
                        format!("Invalid SQLite connection string: {}", e),
                        "Check the connection URL format: sqlite:path/to/db.sqlite",
                    )
                })?;

                let pool = SqlitePoolOptions::new()
                    .min_connections(config.min_size)
                    .max_connections(config.max_size)
                    .acquire_timeout(acquire_timeout)
                    .max_lifetime(max_lifetime)
                    .connect_with(options)
                    .await?;
                Ok(DbPool::SQLite(pool))
            }
        }
    }

    /// Verify a freshly created pool and return the server version.
    async fn health_check(&self, pool: &DbPool) -> DbResult<String> {
        let sql = match pool {
            DbPool::MySql(_) => "SELECT VERSION()",
            DbPool::SQLite(_) => "SELECT sqlite_version()",
        };
        let version = self.run_probe(pool, sql).await?;
        debug!(version = %version, "Health check passed");
        Ok(version)
    }

    /// Run a text-valued probe statement under the write timeout.
    async fn run_probe(&self, pool: &DbPool, sql: &str) -> DbResult<String> {
        let probe = async {
            match pool {
                DbPool::MySql(p) => sqlx::query_scalar::<_, String>(sql).fetch_one(p).await,
                DbPool::SQLite(p) => sqlx::query_scalar::<_, String>(sql).fetch_one(p).await,
            }
        };
        self.within_write_timeout(sql, probe).await
    }

    /// `SELECT 1` under the write timeout. Both backends return an integer.
    async fn ping(&self, pool: &DbPool) -> DbResult<()> {
        const PING: &str = "SELECT 1";
        let probe = async {
            match pool {
                DbPool::MySql(p) => sqlx::query_scalar::<_, i64>(PING).fetch_one(p).await,
                DbPool::SQLite(p) => sqlx::query_scalar::<_, i64>(PING).fetch_one(p).await,
            }
        };
        self.within_write_timeout(PING, probe).await.map(|_| ())
    }

    async fn within_write_timeout<T>(
        &self,
        sql: &str,
        probe: impl std::future::Future<Output = Result<T, sqlx::Error>>,
    ) -> DbResult<T> {
        let timeout = self.write_timeout();
        match tokio::time::timeout(timeout, probe).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(DbError::transient(
                format!("'{}' did not answer within {}s", sql, timeout.as_secs()),
                None,
            )),
        }
    }
}
