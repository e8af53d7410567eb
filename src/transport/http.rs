//! HTTP transport with Streamable HTTP support for the MCP server.

use crate::error::{DbError, DbResult};
use crate::mcp::DevLakeService;
use crate::tools::ToolHandler;
use crate::transport::{Transport, wait_for_signal};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Grace period for open SSE streams once shutdown starts.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport. Each MCP session gets its own service instance and
/// therefore its own rate-limit identity (`http-<n>`).
pub struct HttpTransport {
    handler: ToolHandler,
    host: String,
    port: u16,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(
        handler: ToolHandler,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            handler,
            host: host.into(),
            port,
            endpoint: endpoint.into(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbResult<()> {
        let bind_addr = self.bind_addr();
        info!("Starting MCP server with HTTP transport on {}", bind_addr);

        let handler = self.handler.clone();
        let sessions = Arc::new(AtomicU64::new(0));
        let service = StreamableHttpService::new(
            move || {
                let n = sessions.fetch_add(1, Ordering::Relaxed) + 1;
                Ok(DevLakeService::new(handler.clone(), format!("http-{}", n)))
            },
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // nest_service rejects "/"
        let app = if self.endpoint == "/" {
            axum::Router::new().fallback_service(service)
        } else {
            axum::Router::new().nest_service(&self.endpoint, service)
        };

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbError::fatal(
                format!("Failed to bind to {}: {}", bind_addr, e),
                "Check that SERVER_PORT is available",
            )
        })?;

        info!(endpoint = %self.endpoint, "MCP endpoint ready");

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();
        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        // SSE streams can keep the server alive indefinitely after shutdown starts
        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        self.handler.pool().close().await;
                        return Err(DbError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for connections to close (send signal again to force exit)..."
                );
                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        info!("Closing database connections");
        self.handler.pool().close().await;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
