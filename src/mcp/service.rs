//! MCP service implementation using rmcp.
//!
//! `DevLakeService` exposes the DevLake tools over MCP. Every tool goes
//! through the shared [`ToolHandler`] so throttling, validation and masking
//! apply uniformly.

use crate::models::{ConnectReport, QueryResult};
use crate::tools::{
    AnalyticsOutput, DeploymentsInput, ExecuteQueryInput, GetTableSchemaInput, IncidentsInput,
    ListTablesInput, ToolHandler,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

#[derive(Clone)]
pub struct DevLakeService {
    handler: ToolHandler,
    /// Rate-limit identity of the client behind this service instance
    caller: String,
    tool_router: ToolRouter<Self>,
}

impl DevLakeService {
    pub fn new(handler: ToolHandler, caller: impl Into<String>) -> Self {
        Self {
            handler,
            caller: caller.into(),
            tool_router: Self::tool_router(),
        }
    }

    pub fn caller(&self) -> &str {
        &self.caller
    }
}

#[tool_router]
impl DevLakeService {
    #[tool(
        description = "Connect to the Konflux DevLake database.\nReturns the server version and connection details. Reuses a live pool when one exists."
    )]
    async fn connect_database(&self) -> Result<Json<ConnectReport>, McpError> {
        self.handler
            .connect_database(&self.caller)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "List all databases on the DevLake server.")]
    async fn list_databases(&self) -> Result<Json<QueryResult>, McpError> {
        self.handler
            .list_databases(&self.caller)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "List all tables in a database.\nThe database name may only contain letters, digits and underscores; system databases are rejected."
    )]
    async fn list_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
    ) -> Result<Json<QueryResult>, McpError> {
        self.handler
            .list_tables(&self.caller, input.database.trim())
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "Describe the columns of a table (name, type, nullability, key, default).")]
    async fn get_table_schema(
        &self,
        Parameters(input): Parameters<GetTableSchemaInput>,
    ) -> Result<Json<QueryResult>, McpError> {
        self.handler
            .get_table_schema(&self.caller, input.database.trim(), input.table.trim())
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Execute a read-only SELECT query against DevLake.\nWrite and DDL keywords (DROP, DELETE, UPDATE, INSERT, CREATE, ALTER, TRUNCATE, GRANT, REVOKE, EXEC, EXECUTE) are rejected.\nReturns at most `limit` rows (default 100, max 1000); sensitive values such as emails and IP addresses are masked."
    )]
    async fn execute_query(
        &self,
        Parameters(input): Parameters<ExecuteQueryInput>,
    ) -> Result<Json<QueryResult>, McpError> {
        self.handler
            .execute_query(&self.caller, &input.query, input.limit)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Retrieve unique incidents from DevLake, keeping only the most recent version of each incident_key.\nFilter by status, component and a date range (start_date/end_date, or days_back) on created_date, resolution_date or updated_date.\nResults are sorted by creation date, newest first (default 100, max 500)."
    )]
    async fn get_incidents(
        &self,
        Parameters(input): Parameters<IncidentsInput>,
    ) -> Result<Json<AnalyticsOutput>, McpError> {
        self.handler
            .get_incidents(&self.caller, &input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Retrieve successful deployments from DevLake, deduplicated per deployment (component deployments collapse onto their base id).\nFilter by project, environment (default PRODUCTION) and a date range on finished_date, created_date or updated_date.\nResults are sorted by finish date, newest first (default 50, max 200)."
    )]
    async fn get_deployments(
        &self,
        Parameters(input): Parameters<DeploymentsInput>,
    ) -> Result<Json<AnalyticsOutput>, McpError> {
        self.handler
            .get_deployments(&self.caller, &input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }
}

#[tool_handler]
impl ServerHandler for DevLakeService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "devlake-mcp-server".to_owned(),
                title: Some("Konflux DevLake MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Read-only access to Konflux DevLake analytics.\n\
                \n\
                ## Workflow\n\
                1. `connect_database` verifies the connection (queries also connect on demand)\n\
                2. `list_databases`, `list_tables` and `get_table_schema` explore the `lake` schema\n\
                3. `get_incidents` and `get_deployments` answer the common questions directly\n\
                4. `execute_query` runs any other SELECT\n\
                \n\
                ## Limits\n\
                - Only SELECT statements are accepted; suspicious input is rejected\n\
                - Calls are rate limited per client and tool\n\
                - Emails, phone numbers, card numbers, SSNs and IP addresses in results are masked"
                    .to_string(),
            ),
        }
    }
}
