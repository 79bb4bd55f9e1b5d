//! MCP transport layer for stdio and streamable HTTP.

use rmcp::ServiceExt;
use rmcp::transport::io::stdio;
use tracing::info;

use super::server::OpenBioMcpServer;

/// Starts the MCP server with stdio transport.
///
/// The server reads JSON-RPC messages from stdin and writes responses to stdout.
///
/// # Errors
///
/// Returns an error if the server fails to start or encounters a runtime error.
pub async fn serve_stdio(server: OpenBioMcpServer) -> anyhow::Result<()> {
    info!("MCP server on stdio");
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}

/// Starts the MCP server with streamable HTTP transport.
///
/// Listens on the given host and port for MCP connections at `/mcp`. Every
/// session shares the same orchestrator.
///
/// # Errors
///
/// Returns an error if the server fails to bind or encounters a runtime error.
pub async fn serve_http(server: OpenBioMcpServer, host: &str, port: u16) -> anyhow::Result<()> {
    use rmcp::transport::streamable_http_server::{
        StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
    };
    use std::sync::Arc;

    let ct = tokio_util::sync::CancellationToken::new();

    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            cancellation_token: ct.child_token(),
            ..Default::default()
        },
    );

    let router = axum::Router::new().nest_service("/mcp", service);
    let addr = format!("{host}:{port}");
    let tcp_listener = tokio::net::TcpListener::bind(&addr).await?;

    // stdout is reserved for command output; logs go to stderr
    info!(addr = %addr, "MCP server listening on http://{addr}/mcp");

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            ct.cancel();
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::agent::testing::{ScriptedApi, ScriptedProvider};
    use crate::agent::{AgentConfig, Orchestrator, PromptSet};

    fn server() -> OpenBioMcpServer {
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        OpenBioMcpServer::with_orchestrator(Orchestrator::with_prompts(
            Arc::new(ScriptedProvider::new(Vec::<&str>::new())),
            Arc::new(ScriptedApi::new()),
            &config,
            &PromptSet::defaults(),
        ))
    }

    #[tokio::test]
    async fn test_serve_http_reports_bind_failure() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|_| unreachable!());
        let port = taken
            .local_addr()
            .unwrap_or_else(|_| unreachable!())
            .port();

        let result = serve_http(server(), "127.0.0.1", port).await;
        let err = result.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(!err.is_empty());
    }
}
