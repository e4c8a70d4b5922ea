//! Standalone stdio MCP entry point (spec.md §4.11 "local stdio/JSON-RPC
//! child process"). Probes the running daemon's `/api/health` first, then
//! opens its own read-only-ish set of adapters against the same project
//! root: the relational store runs in WAL mode (many readers, one writer)
//! and the vector index is immutable between daemon-triggered rebuilds, so
//! a second process can safely serve search/fetch/remember without routing
//! through the daemon.

use std::path::Path;

use rmcp::service::ServiceExt;
use rmcp::transport::io::stdio;

use oak_ci_application::RetrievalService;
use oak_ci_infrastructure::config::ConfigLoader;
use oak_ci_infrastructure::di;
use oak_ci_server::mcp::McpServer;

use crate::client::DaemonClient;

pub async fn run(project_root: &Path, daemon_port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = daemon_port {
        DaemonClient::new(port)
            .health()
            .await
            .map_err(|e| anyhow::anyhow!("daemon on port {port} is unreachable, start it first with `oak-ci start`: {e}"))?;
    }

    let config = ConfigLoader::new(project_root).load()?;
    let ports = di::bootstrap(project_root, &config).await?;
    let retrieval = std::sync::Arc::new(RetrievalService::new(
        ports.vector_store,
        ports.embedder,
        config.retrieval.high_confidence_threshold,
        config.retrieval.medium_confidence_threshold,
    ));
    let server = McpServer::new(retrieval, ports.activity_store);

    let (stdin, stdout) = stdio();
    let service = server.serve((stdin, stdout)).await?;
    service.waiting().await?;
    Ok(())
}
