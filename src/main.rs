//! DevLake MCP Server - Main entry point.
//!
//! Serves Konflux DevLake analytics tools over MCP (stdio or HTTP).

use clap::Parser;
use devlake_mcp_server::config::{Config, TransportMode};
use devlake_mcp_server::db::ConnectionPool;
use devlake_mcp_server::security::{RateLimiter, SessionTokenStore};
use devlake_mcp_server::tools::ToolHandler;
use devlake_mcp_server::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// How often expired session tokens and idle rate-limit windows are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Initialize the tracing subscriber. Logs go to stderr; stdout carries MCP frames.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Periodically drop expired session tokens and idle rate-limit windows.
fn spawn_sweeper(handler: ToolHandler) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let tokens = handler.sessions().cleanup_expired().await;
            let windows = handler.rate_limiter().purge_idle().await;
            let stats = handler.security_stats().await;
            debug!(
                expired_tokens = tokens,
                idle_windows = windows,
                active_session_tokens = stats.active_session_tokens,
                rate_limit_entries = stats.rate_limit_entries,
                "Security state sweep"
            );
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    init_tracing(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }
    let pool_config = config.pool_config()?;

    info!(
        transport = %config.transport,
        db_type = %pool_config.db_type,
        host = %pool_config.host,
        database = %pool_config.database,
        "Starting DevLake MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = Arc::new(ConnectionPool::new(pool_config));
    let handler = ToolHandler::new(
        pool.clone(),
        Arc::new(RateLimiter::default()),
        Arc::new(SessionTokenStore::default()),
    );

    // Queries connect lazily, so a failed startup connect is not fatal
    let report = pool.connect().await;
    if report.success {
        info!(
            version = report.version.as_deref().unwrap_or("unknown"),
            attempts = report.attempts,
            "Connected to database"
        );
    } else {
        warn!(
            error = report.error.as_deref().unwrap_or("unknown"),
            attempts = report.attempts,
            "Initial database connection failed; will retry on first query"
        );
    }

    spawn_sweeper(handler.clone());

    let result = match config.transport {
        TransportMode::Stdio => {
            info!("Using stdio transport");
            StdioTransport::new(handler).run().await
        }
        TransportMode::Http => {
            info!(
                host = %config.server_host,
                port = config.server_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            HttpTransport::new(
                handler,
                &config.server_host,
                config.server_port,
                &config.mcp_endpoint,
            )
            .run()
            .await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
