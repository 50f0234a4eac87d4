//! Argument validation for tool calls.
//!
//! Every tool's `inputSchema` is compiled once at server construction and
//! enforced against incoming arguments before the engine is touched, so a
//! malformed call fails with a precise invalid-params error instead of a
//! confusing engine error. The same schemas the server advertises through
//! `tools/list` are the ones enforced here.

use crate::mcp::protocol::ToolSpec;
use anyhow::{Result, anyhow};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

pub struct ArgumentValidator {
    schemas: HashMap<String, JSONSchema>,
}

impl ArgumentValidator {
    /// Compile the input schema of every declared tool.
    pub fn for_tools(tools: &[ToolSpec]) -> Result<Self> {
        let mut schemas = HashMap::with_capacity(tools.len());

        for tool in tools {
            let compiled = JSONSchema::options()
                .with_draft(Draft::Draft7)
                .compile(&tool.input_schema)
                .map_err(|e| anyhow!("Invalid input schema for tool '{}': {e}", tool.name))?;
            schemas.insert(tool.name.clone(), compiled);
        }

        debug!("Compiled argument schemas for {} tools", schemas.len());
        Ok(Self { schemas })
    }

    #[inline]
    pub fn knows_tool(&self, tool: &str) -> bool {
        self.schemas.contains_key(tool)
    }

    /// Check one tool call's arguments, reporting every violation joined
    /// into a single message.
    pub fn check(&self, tool: &str, arguments: &Value) -> Result<(), String> {
        let Some(schema) = self.schemas.get(tool) else {
            return Err(format!("Unknown tool: {tool}"));
        };

        if let Err(errors) = schema.validate(arguments) {
            let details: Vec<String> = errors
                .map(|e| format!("{}: {e}", e.instance_path))
                .collect();
            return Err(details.join("; "));
        }

        Ok(())
    }
}
