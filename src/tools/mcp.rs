//! MCP tool proxying.
//!
//! The transport is up to the caller: anything that can list and call tools
//! implements [`McpServer`], and [`mcp_tools`] wraps each remote tool so it can
//! be registered like a local one.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Tool, ToolError, ToolInvocation};
use crate::agent::RunContext;

pub const MCP_TOOL_PREFIX: &str = "mcp__";

/// Qualified registry name of a remote tool.
pub fn make_mcp_name(server: &str, tool: &str) -> String {
    format!("{}{server}__{tool}", MCP_TOOL_PREFIX)
}

/// Splits a qualified name back into `(server, tool)`.
pub fn parse_mcp_name(name: &str) -> Option<(&str, &str)> {
    name.strip_prefix(MCP_TOOL_PREFIX)?.split_once("__")
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        uri: String,
        #[serde(default)]
        text: Option<String>,
    },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolResult {
    pub content: Vec<McpContent>,
    #[serde(default)]
    pub is_error: bool,
}

impl McpToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn to_string_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                McpContent::Text { text } => Some(text.clone()),
                McpContent::Resource { text, uri } => {
                    Some(text.clone().unwrap_or_else(|| uri.clone()))
                }
                McpContent::Image { mime_type, .. } => Some(format!("[image: {}]", mime_type)),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A connected MCP server.
#[async_trait]
pub trait McpServer: Send + Sync {
    fn name(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<McpToolDefinition>, ToolError>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult, ToolError>;
}

/// Proxy that forwards invocations to one remote tool.
pub struct McpTool {
    server: Arc<dyn McpServer>,
    qualified_name: String,
    definition: McpToolDefinition,
}

impl McpTool {
    pub fn new(server: Arc<dyn McpServer>, definition: McpToolDefinition) -> Self {
        let qualified_name = make_mcp_name(server.name(), &definition.name);
        Self {
            server,
            qualified_name,
            definition,
        }
    }

    pub fn server_name(&self) -> &str {
        self.server.name()
    }

    pub fn tool_name(&self) -> &str {
        &self.definition.name
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.qualified_name
    }

    fn description(&self) -> &str {
        &self.definition.description
    }

    fn parameters(&self) -> Value {
        self.definition.input_schema.clone()
    }

    async fn invoke(
        &self,
        arguments: Value,
        _ctx: &RunContext,
    ) -> Result<ToolInvocation, ToolError> {
        let result = self
            .server
            .call_tool(&self.definition.name, arguments)
            .await?;

        if result.is_error {
            return Err(ToolError::Mcp {
                server: self.server.name().to_string(),
                message: result.to_string_content(),
            });
        }
        Ok(ToolInvocation::value(result.to_string_content()))
    }
}

/// Wraps every tool the server advertises.
pub async fn mcp_tools(server: Arc<dyn McpServer>) -> Result<Vec<Arc<dyn Tool>>, ToolError> {
    let definitions = server.list_tools().await?;
    Ok(definitions
        .into_iter()
        .map(|definition| Arc::new(McpTool::new(Arc::clone(&server), definition)) as Arc<dyn Tool>)
        .collect())
}
