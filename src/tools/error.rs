//! Recoverable tool failures.

/// Error raised while resolving or running a tool.
///
/// None of these abort a run: the dispatcher turns them into an error
/// [`ToolCallResult`](crate::ToolCallResult) and the model sees the message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {0}")]
    Execution(String),

    #[error("MCP server '{server}' error: {message}")]
    Mcp { server: String, message: String },

    #[error("Sub-agent '{agent}' failed: {message}")]
    Agent { agent: String, message: String },
}

impl ToolError {
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments(message.into())
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidArguments(err.to_string())
    }
}
