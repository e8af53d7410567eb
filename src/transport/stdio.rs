//! Stdio transport for the MCP server.
//!
//! JSON-RPC frames are read from stdin and written to stdout, so all
//! logging must go to stderr.

use crate::error::{DbError, DbResult};
use crate::mcp::DevLakeService;
use crate::tools::ToolHandler;
use crate::transport::{Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use tracing::{info, warn};

/// Rate-limit identity of the single stdio client.
pub const STDIO_CALLER: &str = "stdio";

pub struct StdioTransport {
    handler: ToolHandler,
}

impl StdioTransport {
    pub fn new(handler: ToolHandler) -> Self {
        Self { handler }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!("Starting MCP server with stdio transport");

        let service = DevLakeService::new(self.handler.clone(), STDIO_CALLER);
        let running_service = service
            .serve(stdio())
            .await
            .map_err(|e| DbError::internal(format!("Failed to start stdio transport: {}", e)))?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                match result {
                    Ok(_quit_reason) => info!("Stdio transport completed normally"),
                    Err(e) => {
                        warn!(error = %e, "Stdio transport error");
                        self.handler.pool().close().await;
                        return Err(DbError::internal(format!("Stdio transport error: {}", e)));
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        if shutdown_requested {
            tokio::spawn(async {
                wait_for_signal().await;
                warn!("Received second signal, forcing immediate exit");
                std::process::exit(1);
            });
        }

        info!("Closing database connections");
        self.handler.pool().close().await;

        if shutdown_requested {
            // A blocking stdin read cannot be interrupted by select!
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ConnectionPool;
    use crate::models::PoolConfig;
    use crate::security::{RateLimiter, SessionTokenStore};
    use std::sync::Arc;

    #[test]
    fn test_stdio_transport_creation() {
        let pool = Arc::new(ConnectionPool::new(PoolConfig::sqlite("sqlite::memory:")));
        let handler = ToolHandler::new(
            pool,
            Arc::new(RateLimiter::default()),
            Arc::new(SessionTokenStore::default()),
        );
        let transport = StdioTransport::new(handler);
        assert_eq!(transport.name(), "stdio");
    }
}
