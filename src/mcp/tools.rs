//! The four documentation tools and their engine bindings.
//!
//! The dispatch surface is closed over exactly these tools, so each one is
//! a declared spec plus an async function on the shared engine rather than
//! a registry entry. Engine failures become `isError` tool replies so the
//! protocol stream stays healthy.

use crate::mcp::protocol::{ToolReply, ToolSpec};
use crate::search::{SearchEngine, SearchOptions};
use serde_json::{Value, json};
use tracing::debug;

pub const SEARCH_DOCS: &str = "search_docs";
pub const SHOW_CONTEXT: &str = "show_context";
pub const LIST_DOCS: &str = "list_docs";
pub const ADD_DOC: &str = "add_doc";

/// Declarations for every tool this server exposes, in listing order.
/// The schemas double as the argument validation source.
pub fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: SEARCH_DOCS.to_string(),
            description: "Search indexed documentation with full transparency about which \
                          retrieval layer served the result"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Keywords or a natural-language question"
                    },
                    "doc_name": {
                        "type": "string",
                        "description": "Optional: restrict to one documentation by name"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results (default: 5)"
                    },
                    "threshold": {
                        "type": "number",
                        "description": "Optional: minimum semantic similarity for the hybrid layer"
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: SHOW_CONTEXT.to_string(),
            description: "Show exactly what would be injected into context for a query, \
                          with an estimated token count"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Keywords or a natural-language question"
                    },
                    "doc_name": {
                        "type": "string",
                        "description": "Optional: restrict to one documentation by name"
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: LIST_DOCS.to_string(),
            description: "List all indexed documentations with their section counts".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: ADD_DOC.to_string(),
            description: "Ingest or replace a documentation from its JSON representation"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "document": {
                        "type": "object",
                        "description": "Documentation JSON: {name, display_name, version, base_url, sections[]}"
                    }
                },
                "required": ["document"],
                "additionalProperties": false
            }),
        },
    ]
}

/// Route one schema-validated tool call to its engine binding. `None`
/// means the name has a spec but no binding, which is a server bug.
pub async fn dispatch(engine: &SearchEngine, tool: &str, args: &Value) -> Option<ToolReply> {
    debug!("Dispatching tool call: {tool}");

    match tool {
        SEARCH_DOCS => Some(search_docs(engine, args).await),
        SHOW_CONTEXT => Some(show_context(engine, args).await),
        LIST_DOCS => Some(list_docs(engine).await),
        ADD_DOC => Some(add_doc(engine, args).await),
        _ => None,
    }
}

async fn search_docs(engine: &SearchEngine, args: &Value) -> ToolReply {
    let query = args.get("query").and_then(Value::as_str).unwrap_or_default();
    let options = SearchOptions {
        doc_name: args
            .get("doc_name")
            .and_then(Value::as_str)
            .map(str::to_string),
        max_results: args
            .get("max_results")
            .and_then(Value::as_u64)
            .map(|v| v as usize),
        threshold: args
            .get("threshold")
            .and_then(Value::as_f64)
            .map(|v| v as f32),
        deadline: None,
    };

    match engine.search(query, &options).await {
        Ok(response) => ToolReply::json(&response),
        Err(e) => ToolReply::error(format!("Search failed: {e}")),
    }
}

async fn show_context(engine: &SearchEngine, args: &Value) -> ToolReply {
    let query = args.get("query").and_then(Value::as_str).unwrap_or_default();
    let doc_name = args.get("doc_name").and_then(Value::as_str);

    match engine.show_context(query, doc_name).await {
        Ok(preview) => ToolReply::json(&preview),
        Err(e) => ToolReply::error(format!("Context preview failed: {e}")),
    }
}

async fn list_docs(engine: &SearchEngine) -> ToolReply {
    match engine.list_documents().await {
        Ok(docs) => ToolReply::json(&json!({
            "count": docs.len(),
            "docs": docs,
        })),
        Err(e) => ToolReply::error(format!("Listing failed: {e}")),
    }
}

async fn add_doc(engine: &SearchEngine, args: &Value) -> ToolReply {
    let Some(document) = args.get("document") else {
        return ToolReply::error("Missing required parameter: document".to_string());
    };

    match engine.add_document_json(document).await {
        Ok(report) => ToolReply::json(&report),
        Err(e) => ToolReply::error(format!("Ingest failed: {e}")),
    }
}
