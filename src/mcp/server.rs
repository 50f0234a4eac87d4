//! Stdio transport for the documentation tools.
//!
//! Reads one JSON-RPC frame per line from stdin and answers on stdout.
//! The dispatch surface is fixed: `initialize` and its notification,
//! `tools/list`, `tools/call` into the four documentation tools, and
//! `ping`. Tool arguments are checked against the advertised schemas
//! before the engine runs. Logging goes to stderr so stdout stays a clean
//! protocol channel.

use crate::mcp::protocol::{
    Frame, InitializeParams, JSONRPC_VERSION, MCP_VERSION, Reply, RpcError, ToolSpec,
};
use crate::mcp::tools;
use crate::mcp::validation::ArgumentValidator;
use crate::search::SearchEngine;
use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Lifecycle of one stdio session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInitialize,
    Initializing,
    Ready,
    Closed,
}

pub struct DocsServer {
    engine: Arc<SearchEngine>,
    specs: Vec<ToolSpec>,
    arguments: ArgumentValidator,
    state: RwLock<SessionState>,
}

impl DocsServer {
    pub fn new(engine: Arc<SearchEngine>) -> Result<Self> {
        let specs = tools::specs();
        let arguments = ArgumentValidator::for_tools(&specs)?;

        Ok(Self {
            engine,
            specs,
            arguments,
            state: RwLock::new(SessionState::AwaitingInitialize),
        })
    }

    #[inline]
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Serve until the client closes stdin.
    pub async fn serve_stdio(&self) -> Result<()> {
        info!("Serving documentation tools over stdio");

        let mut reader = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();

        let mut line = String::new();
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .await
                .context("Failed to read from stdin")?;
            if read == 0 {
                info!("Client closed stdin, shutting down");
                break;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some(reply) = self.handle_line(line).await else {
                continue;
            };
            let encoded = serde_json::to_string(&reply).context("Failed to encode reply")?;
            stdout.write_all(encoded.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }

        *self.state.write().await = SessionState::Closed;
        Ok(())
    }

    /// Parse and answer one frame. Notifications produce no output.
    pub async fn handle_line(&self, line: &str) -> Option<Reply> {
        let frame: Frame = match serde_json::from_str(line) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Dropping unparseable frame: {e}");
                return Some(Reply::fail(None, RpcError::parse(&e.to_string())));
            }
        };

        if frame.jsonrpc != JSONRPC_VERSION {
            return Some(Reply::fail(
                frame.id,
                RpcError::malformed(&format!("jsonrpc must be \"{JSONRPC_VERSION}\"")),
            ));
        }

        self.handle_frame(frame).await
    }

    pub async fn handle_frame(&self, frame: Frame) -> Option<Reply> {
        let Some(id) = frame.id else {
            self.handle_notification(&frame.method).await;
            return None;
        };

        let outcome = match frame.method.as_str() {
            "initialize" => self.initialize(frame.params).await,
            "tools/list" => Ok(self.list_tools()),
            "tools/call" => self.call_tool(frame.params).await,
            "ping" => Ok(json!({})),
            other => Err(RpcError::unknown_method(other)),
        };

        Some(match outcome {
            Ok(result) => Reply::ok(id, result),
            Err(error) => {
                warn!("Request '{}' failed: {}", frame.method, error.message);
                Reply::fail(Some(id), error)
            }
        })
    }

    async fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" | "initialized" => {
                *self.state.write().await = SessionState::Ready;
                info!("Client ready, tools available");
            }
            "notifications/cancelled" => {
                debug!("Client cancelled an in-flight request");
            }
            other => {
                warn!("Ignoring unknown notification: {other}");
            }
        }
    }

    async fn initialize(&self, params: Value) -> Result<Value, RpcError> {
        let params: InitializeParams = serde_json::from_value(params)
            .map_err(|e| RpcError::invalid_params(format!("Bad initialize params: {e}")))?;

        if params.protocol_version != MCP_VERSION {
            return Err(RpcError::invalid_params(format!(
                "Unsupported protocol version {} (this server speaks {MCP_VERSION})",
                params.protocol_version
            )));
        }

        *self.state.write().await = SessionState::Initializing;
        info!(
            "Client connected: {} {}",
            params.client_info.name, params.client_info.version
        );

        Ok(json!({
            "protocolVersion": MCP_VERSION,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Local documentation retrieval with cascade search. Call \
                             search_docs with keywords or a natural-language question; \
                             show_context previews exactly what a result would inject \
                             into context."
        }))
    }

    fn list_tools(&self) -> Value {
        json!({ "tools": self.specs })
    }

    async fn call_tool(&self, params: Value) -> Result<Value, RpcError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("Tool call without a tool name".to_string()))?;
        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        self.arguments
            .check(name, &arguments)
            .map_err(RpcError::invalid_params)?;

        let reply = tools::dispatch(&self.engine, name, &arguments)
            .await
            .ok_or_else(|| RpcError::internal(format!("Tool '{name}' has no binding")))?;

        serde_json::to_value(reply)
            .map_err(|e| RpcError::internal(format!("Failed to encode tool reply: {e}")))
    }
}
