//! Core value types shared across the engine.

mod message;
mod tool;
mod usage;

pub use message::{Message, Role};
pub use tool::{ToolCall, ToolCallResult, ToolCallStatus, ToolDefinition, ToolReturn};
pub use usage::Usage;
