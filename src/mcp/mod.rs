pub mod protocol;
pub mod server;
pub mod tools;
pub mod validation;


use crate::search::SearchEngine;
use self::server::DocsServer;
use std::sync::Arc;

/// Serve the engine over stdio until the client disconnects, then flush
/// process-local engine state.
pub async fn serve(engine: Arc<SearchEngine>) -> crate::Result<()> {
    let server = DocsServer::new(Arc::clone(&engine))
        .map_err(|e| crate::CascadeError::Mcp(format!("Failed to start MCP server: {e:#}")))?;

    server
        .serve_stdio()
        .await
        .map_err(|e| crate::CascadeError::Mcp(format!("MCP session failed: {e:#}")))?;

    engine.shutdown().await
}
