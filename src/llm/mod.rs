//! Language model interface consumed by the run loop.
//!
//! The engine never builds provider wire requests itself. Anything that can
//! turn a chat history plus tool definitions into text and/or tool calls (and
//! report token usage) implements [`Llm`].

mod scripted;

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, stream};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::{Message, ToolCall, ToolDefinition, Usage};

pub use scripted::ScriptedLlm;

/// Sampling options forwarded to the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl LlmOptions {
    /// Fields set in `overrides` win.
    pub fn merge(&self, overrides: &LlmOptions) -> LlmOptions {
        LlmOptions {
            temperature: overrides.temperature.or(self.temperature),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub options: LlmOptions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

impl LlmResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    pub fn wants_tool_use(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Incremental output of a streaming model call.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmChunk {
    Text(String),
    ToolCall(ToolCall),
    Usage(Usage),
}

pub type LlmStream = Pin<Box<dyn Stream<Item = Result<LlmChunk>> + Send>>;

#[async_trait]
pub trait Llm: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;

    /// Streaming variant. The default replays [`Llm::generate`] as chunks.
    async fn generate_streaming(&self, request: LlmRequest) -> Result<LlmStream> {
        let response = self.generate(request).await?;
        Ok(Box::pin(stream::iter(
            response_into_chunks(response).into_iter().map(Ok),
        )))
    }
}

pub(crate) fn response_into_chunks(response: LlmResponse) -> Vec<LlmChunk> {
    let mut chunks = Vec::with_capacity(response.tool_calls.len() + 2);
    if !response.content.is_empty() {
        chunks.push(LlmChunk::Text(response.content));
    }
    chunks.extend(response.tool_calls.into_iter().map(LlmChunk::ToolCall));
    chunks.push(LlmChunk::Usage(response.usage));
    chunks
}
