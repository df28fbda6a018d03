//! Prelude module for convenient imports.
//!
//! ```rust
//! use agent_engine::prelude::*;
//! ```

// Core types
pub use crate::Agent;
pub use crate::AgentBuilder;
pub use crate::AgentEvent;
pub use crate::AgentResult;
pub use crate::AgentStream;
pub use crate::Error;
pub use crate::Result;
pub use crate::RunContext;
pub use crate::RunOptions;

// Model
pub use crate::llm::{Llm, LlmRequest, LlmResponse};

// Tools
pub use crate::tools::{FunctionTool, SchemaTool, StreamingFunctionTool, Tool, ToolError};

// Hooks
pub use crate::hooks::{Hook, PostRunOutcome, PostToolDecision, PreRunDecision, PreToolDecision};

// Confirmation
pub use crate::confirmation::{AutoConfirm, ConfirmationHandler};

// Types
pub use crate::types::{Message, Role, ToolCall, ToolCallResult, ToolReturn, Usage};
