//! Wire types for the MCP stdio surface.
//!
//! The server speaks JSON-RPC 2.0 framed one message per line. Incoming
//! traffic is a single [`Frame`] shape: a present `id` makes it a request,
//! an absent one a notification. Outgoing traffic is a [`Reply`]. Only the
//! slice of MCP version 2025-06-18 this four-tool server needs is
//! modelled: initialization, tool listing and tool calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MCP_VERSION: &str = "2025-06-18";
pub const JSONRPC_VERSION: &str = "2.0";

/// One incoming JSON-RPC message.
#[derive(Debug, Clone, Deserialize)]
pub struct Frame {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Option<RequestId>,
}

/// Request ids may be strings or integers and are echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

/// One outgoing JSON-RPC message.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Result {
        jsonrpc: &'static str,
        result: Value,
        id: RequestId,
    },
    Error {
        jsonrpc: &'static str,
        error: RpcError,
        id: Option<RequestId>,
    },
}

impl Reply {
    #[inline]
    pub fn ok(id: RequestId, result: Value) -> Self {
        Reply::Result {
            jsonrpc: JSONRPC_VERSION,
            result,
            id,
        }
    }

    #[inline]
    pub fn fail(id: Option<RequestId>, error: RpcError) -> Self {
        Reply::Error {
            jsonrpc: JSONRPC_VERSION,
            error,
            id,
        }
    }
}

/// JSON-RPC error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    #[inline]
    pub fn parse(detail: &str) -> Self {
        Self {
            code: -32700,
            message: format!("Unparseable frame: {detail}"),
        }
    }

    #[inline]
    pub fn malformed(detail: &str) -> Self {
        Self {
            code: -32600,
            message: format!("Not a JSON-RPC 2.0 request: {detail}"),
        }
    }

    #[inline]
    pub fn unknown_method(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Unsupported method: {method}"),
        }
    }

    #[inline]
    pub fn invalid_params(detail: String) -> Self {
        Self {
            code: -32602,
            message: detail,
        }
    }

    #[inline]
    pub fn internal(detail: String) -> Self {
        Self {
            code: -32603,
            message: detail,
        }
    }
}

/// Payload of `initialize`. Client capabilities are accepted but unused;
/// this server negotiates nothing beyond the protocol version.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    pub client_info: PeerInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    pub name: String,
    pub version: String,
}

/// Declared shape of one documentation tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Result payload of one tool invocation: a single text block carrying
/// pretty-printed JSON, plus the error flag MCP clients key on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolReply {
    pub content: Vec<TextBlock>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl TextBlock {
    fn new(text: String) -> Self {
        Self {
            kind: "text".to_string(),
            text,
        }
    }
}

impl ToolReply {
    /// Successful reply carrying a pretty-printed JSON payload.
    pub fn json<P: Serialize>(payload: &P) -> Self {
        match serde_json::to_string_pretty(payload) {
            Ok(text) => Self {
                content: vec![TextBlock::new(text)],
                is_error: false,
            },
            Err(e) => Self::error(format!("Failed to encode payload: {e}")),
        }
    }

    /// Failed reply carrying the error text.
    pub fn error(message: String) -> Self {
        Self {
            content: vec![TextBlock::new(message)],
            is_error: true,
        }
    }

    /// Text of the first content block; empty when there is none.
    pub fn text(&self) -> &str {
        self.content.first().map(|b| b.text.as_str()).unwrap_or_default()
    }
}
