//! Connection-related data models.
//!
//! This module defines the pool configuration and the connection status
//! reports handed back to callers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Pool configuration defaults
pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_POOL_MIN_SIZE: u32 = 5;
pub const DEFAULT_POOL_MAX_SIZE: u32 = 50;
pub const DEFAULT_POOL_RECYCLE_SECS: u64 = 300;

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Pool configuration. Fixed once the pool is created.
///
/// For SQLite, `database` holds the connection URL (e.g. `sqlite::memory:`)
/// and the network fields are informational only.
#[derive(Clone, Serialize)]
pub struct PoolConfig {
    pub db_type: DatabaseType,
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub password: String,
    pub database: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub min_size: u32,
    pub max_size: u32,
    /// Connections older than this are replaced regardless of health
    pub recycle_secs: u64,
}

impl PoolConfig {
    /// MySQL configuration with default timeouts and pool sizing.
    pub fn mysql(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            db_type: DatabaseType::MySQL,
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            database: database.into(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT_SECS,
            min_size: DEFAULT_POOL_MIN_SIZE,
            max_size: DEFAULT_POOL_MAX_SIZE,
            recycle_secs: DEFAULT_POOL_RECYCLE_SECS,
        }
    }

    /// SQLite configuration. A single connection unless resized.
    pub fn sqlite(url: impl Into<String>) -> Self {
        Self {
            db_type: DatabaseType::SQLite,
            host: "localhost".to_string(),
            port: 0,
            user: String::new(),
            password: String::new(),
            database: url.into(),
            min_size: 1,
            max_size: 1,
            ..Self::mysql("localhost", 0, "", "", "")
        }
    }

    /// Override pool sizing.
    pub fn with_pool_size(mut self, min_size: u32, max_size: u32) -> Self {
        self.min_size = min_size;
        self.max_size = max_size;
        self
    }

    /// Override connect/read/write timeouts (seconds).
    pub fn with_timeouts(mut self, connect: u64, read: u64, write: u64) -> Self {
        self.connect_timeout_secs = connect;
        self.read_timeout_secs = read;
        self.write_timeout_secs = write;
        self
    }

    /// Override the recycle age (seconds).
    pub fn with_recycle(mut self, recycle_secs: u64) -> Self {
        self.recycle_secs = recycle_secs;
        self
    }

    /// Validate sizing and timeouts and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_size == 0 {
            return Err("pool max size must be greater than 0".to_string());
        }
        if self.min_size > self.max_size {
            return Err(format!(
                "pool min size ({}) cannot exceed pool max size ({})",
                self.min_size, self.max_size
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err("connect timeout must be greater than 0".to_string());
        }
        if self.db_type == DatabaseType::MySQL && self.host.trim().is_empty() {
            return Err("database host cannot be empty".to_string());
        }
        Ok(())
    }

    /// Connection details that are safe to show (no password).
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            database: self.database.clone(),
        }
    }
}

impl std::fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("write_timeout_secs", &self.write_timeout_secs)
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .field("recycle_secs", &self.recycle_secs)
            .finish()
    }
}

/// Connection details returned to callers. Never includes the password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: String,
}

/// Connection details plus liveness of the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConnectionStatus {
    #[serde(flatten)]
    pub info: ConnectionInfo,
    pub connected: bool,
}

/// Outcome of a connect attempt.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConnectReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub connection_info: ConnectionInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Pool creation attempts made by this call (0 when an existing pool was reused)
    pub attempts: u32,
}
