//! MCP server implementation for openbio-rs.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use tracing::info;

use crate::agent::config::AgentConfig;
use crate::agent::orchestrator::{Orchestrator, QueryResult};

use super::params::AskParams;

/// openbio-rs MCP server.
#[derive(Clone)]
pub struct OpenBioMcpServer {
    tool_router: ToolRouter<Self>,
    orchestrator: Arc<Orchestrator>,
}

#[tool_router]
impl OpenBioMcpServer {
    /// Answer a biology question through the routed tool agents.
    #[tool(
        name = "ask",
        description = "Answer a natural-language biology or bioinformatics question. Routes the question to BLAST sequence alignment, NCBI E-utilities (gene, snp, omim) or web search, evaluates the evidence for up to five rounds and writes an answer. Returns JSON with the answer, status, evaluation rounds and optionally the per-node trace."
    )]
    async fn ask(
        &self,
        Parameters(params): Parameters<AskParams>,
    ) -> Result<CallToolResult, McpError> {
        let json = self.answer(&params).await?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

#[tool_handler]
impl ServerHandler for OpenBioMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "openbio-rs".to_string(),
                title: Some("openbio-rs MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "openbio-rs answers bioinformatics questions (gene locations and aliases, \
                 SNP-gene associations, disease genes, DNA sequence alignment). Use the \
                 `ask` tool with one question per call."
                    .to_string(),
            ),
        }
    }
}

impl OpenBioMcpServer {
    /// Creates a server backed by the configured provider and HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the LLM provider or HTTP client cannot be created.
    pub fn new(config: &AgentConfig) -> Result<Self, crate::error::Error> {
        Ok(Self::with_orchestrator(Orchestrator::from_config(config)?))
    }

    /// Creates a server around an existing orchestrator.
    #[must_use]
    pub fn with_orchestrator(orchestrator: Orchestrator) -> Self {
        Self {
            tool_router: Self::tool_router(),
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Runs one question and renders the result as JSON.
    async fn answer(&self, params: &AskParams) -> Result<String, McpError> {
        info!(question = %params.question, "mcp ask");
        let result = self
            .orchestrator
            .ask(&params.question)
            .await
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
        render(result, params.include_trace)
    }
}

fn render(mut result: QueryResult, include_trace: bool) -> Result<String, McpError> {
    if !include_trace {
        result.trace.clear();
        result.history.clear();
    }
    serde_json::to_string_pretty(&result)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {e}"), None))
}
