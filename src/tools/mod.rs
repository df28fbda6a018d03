//! Tools the model can call.
//!
//! Every shape (typed closure, event-streaming closure, nested agent, MCP
//! proxy) is adapted to the single [`Tool`] contract when it is registered.

mod agent_tool;
mod error;
mod function;
pub mod mcp;
mod registry;
mod traits;

pub use agent_tool::AgentTool;
pub use error::ToolError;
pub use function::{FunctionTool, StreamingFunctionTool};
pub use mcp::{McpContent, McpServer, McpTool, McpToolDefinition, McpToolResult, mcp_tools};
pub use registry::ToolRegistry;
pub use traits::{SchemaTool, Tool, ToolEvent, ToolEventStream, ToolInvocation, schema_for};
