//! # agent-engine
//!
//! Execution engine for LLM agents.
//!
//! An [`Agent`] bundles a language model, a set of tools (plain functions,
//! event-streaming functions, MCP-proxied tools or other agents) and lifecycle
//! hooks. Running it drives a turn loop: call the model, dispatch the tool
//! calls it issues (fanning out concurrently, pausing on human confirmation
//! where a hook asks for it), fold the results back into the history and call
//! the model again, until it answers with plain text or a limit is hit.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agent_engine::{Agent, RunContext, ScriptedLlm};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), agent_engine::Error> {
//!     let llm = Arc::new(ScriptedLlm::new().text("Hello!"));
//!     let agent = Agent::builder(llm).instructions("Be brief.").build()?;
//!
//!     let result = agent.run("Hi", &RunContext::new()).await?;
//!     println!("{}", result.content);
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agent_engine::{Agent, AgentEvent, RunContext, ScriptedLlm};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), agent_engine::Error> {
//!     let llm = Arc::new(ScriptedLlm::new().text("Hello!"));
//!     let agent = Agent::builder(llm).build()?;
//!
//!     let mut stream = agent.run_streaming("Hi", RunContext::new());
//!     while let Some(event) = stream.next().await {
//!         if let AgentEvent::Text(text) = event? {
//!             print!("{}", text);
//!         }
//!     }
//!     if let Some(result) = stream.result() {
//!         println!("\n{} tokens", result.usage.total_tokens);
//!     }
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod agent;
pub mod config;
pub mod confirmation;
pub mod hooks;
pub mod limits;
pub mod llm;
pub mod observability;
pub mod postprocessors;
pub mod prelude;
pub mod tools;
pub mod types;

pub use agent::{
    Agent, AgentBuilder, AgentEvent, AgentOptions, AgentResult, AgentStream, Deps, RunContext,
    RunMetrics, RunOptions, ToolStats,
};
pub use confirmation::{
    AutoConfirm, ConfirmationHandler, ConfirmationManager, ConfirmationRequest,
    PendingConfirmation,
};
pub use hooks::{
    Hook, HookCallback, HookEvent, HookManager, PostRunInput, PostRunOutcome, PostToolDecision,
    PostToolInput, PreRunDecision, PreRunInput, PreToolDecision, PreToolInput, ToolMatcher,
};
pub use limits::LimitEnforcer;
pub use llm::{Llm, LlmChunk, LlmOptions, LlmRequest, LlmResponse, LlmStream, ScriptedLlm};
pub use postprocessors::{
    PostProcessContext, PostProcessor, PostProcessorChain, StreamingPostProcessor,
    StreamingPostProcessorChain, SupervisorPostProcessor,
};
pub use tools::{
    AgentTool, FunctionTool, McpServer, McpTool, McpToolDefinition, McpToolResult, SchemaTool,
    StreamingFunctionTool, Tool, ToolError, ToolEvent, ToolInvocation, ToolRegistry,
};
pub use types::{
    Message, Role, ToolCall, ToolCallResult, ToolCallStatus, ToolDefinition, ToolReturn, Usage,
};

/// Error type for agent-engine operations.
///
/// Recoverable tool failures never surface here; they are turned into tool
/// results the model can react to. Everything in this enum terminates a run.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The run needed another model call after `limit` turns.
    #[error("Max turns exceeded: limit of {limit} turns reached")]
    MaxTurnsExceeded { limit: usize },

    /// Cumulative total tokens went over the configured ceiling.
    #[error("Total token limit exceeded: {used} tokens used (limit: {limit})")]
    TotalTokensExceeded { used: u64, limit: u64 },

    /// Cumulative prompt tokens went over the configured ceiling.
    #[error("Prompt token limit exceeded: {used} tokens used (limit: {limit})")]
    PromptTokensExceeded { used: u64, limit: u64 },

    /// Cumulative completion tokens went over the configured ceiling.
    #[error("Completion token limit exceeded: {used} tokens used (limit: {limit})")]
    CompletionTokensExceeded { used: u64, limit: u64 },

    /// The next prompt would push total usage over the ceiling.
    #[error(
        "Next prompt would exceed token limit: ~{estimated} prompt tokens on top of {used} used (limit: {limit})"
    )]
    NextPromptOverLimit { estimated: u64, used: u64, limit: u64 },

    /// Two tools were registered under the same name.
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    /// Post-processors were combined in a way the run mode cannot honor.
    #[error("Invalid post-processor configuration: {0}")]
    InvalidPostProcessor(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The language model call failed.
    #[error("LLM error: {0}")]
    Llm(String),

    /// A blocking hook (pre-run or pre-tool) returned an error.
    #[error("Hook '{hook}' failed: {reason}")]
    HookFailed { hook: String, reason: String },

    /// A pre-run hook refused the input.
    #[error("Run blocked by hook: {0}")]
    Blocked(String),

    /// The run was cancelled before it finished.
    #[error("Run cancelled")]
    Cancelled,

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// File system operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Construction-time or configuration mistakes
    Configuration,
    /// Turn or token ceilings
    ResourceLimit,
    /// Hooks refusing or failing
    Permission,
    /// Model provider failures
    Provider,
    /// Cancellation, IO, serialization
    Internal,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::DuplicateTool(_) | Error::InvalidPostProcessor(_) | Error::Config(_) => {
                ErrorCategory::Configuration
            }

            Error::MaxTurnsExceeded { .. }
            | Error::TotalTokensExceeded { .. }
            | Error::PromptTokensExceeded { .. }
            | Error::CompletionTokensExceeded { .. }
            | Error::NextPromptOverLimit { .. } => ErrorCategory::ResourceLimit,

            Error::HookFailed { .. } | Error::Blocked(_) => ErrorCategory::Permission,

            Error::Llm(_) => ErrorCategory::Provider,

            Error::Cancelled | Error::Json(_) | Error::Io(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_resource_limit(&self) -> bool {
        self.category() == ErrorCategory::ResourceLimit
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Error::Llm(message.into())
    }
}

/// Result type for agent-engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert!(Error::MaxTurnsExceeded { limit: 3 }.is_resource_limit());
        assert!(
            Error::NextPromptOverLimit {
                estimated: 10,
                used: 95,
                limit: 100
            }
            .is_resource_limit()
        );
        assert!(Error::DuplicateTool("x".into()).is_configuration_error());
        assert!(Error::InvalidPostProcessor("x".into()).is_configuration_error());
        assert_eq!(Error::llm("boom").category(), ErrorCategory::Provider);
        assert_eq!(
            Error::Blocked("nope".into()).category(),
            ErrorCategory::Permission
        );
    }

    #[test]
    fn test_error_display_names_the_limit() {
        let err = Error::MaxTurnsExceeded { limit: 5 };
        assert!(err.to_string().contains('5'));

        let err = Error::TotalTokensExceeded {
            used: 120,
            limit: 100,
        };
        let text = err.to_string();
        assert!(text.contains("120"));
        assert!(text.contains("100"));
    }
}
