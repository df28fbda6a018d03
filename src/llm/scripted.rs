//! Deterministic model double that replays canned responses.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;

use super::{Llm, LlmChunk, LlmRequest, LlmResponse, LlmStream};
use crate::types::{ToolCall, Usage};
use crate::{Error, Result};

const DEFAULT_USAGE: (u64, u64) = (10, 5);

enum Scripted {
    Response(LlmResponse),
    Failure(String),
}

/// Replays a queue of responses in order and records every request it saw.
///
/// When the queue runs dry the `fallback` response is used if one was set,
/// otherwise the call fails with [`Error::Llm`].
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Option<LlmResponse>,
    requests: Mutex<Vec<LlmRequest>>,
    next_call_id: AtomicUsize,
}

impl Default for ScriptedLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            next_call_id: AtomicUsize::new(1),
        }
    }

    fn default_usage() -> Usage {
        Usage::new(DEFAULT_USAGE.0, DEFAULT_USAGE.1)
    }

    fn push(self, item: Scripted) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(item);
        self
    }

    fn call(&self, name: &str, arguments: Value) -> ToolCall {
        let n = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        ToolCall::new(format!("call_{}", n), name, arguments)
    }

    pub fn response(self, response: LlmResponse) -> Self {
        self.push(Scripted::Response(response))
    }

    pub fn text(self, content: impl Into<String>) -> Self {
        self.response(LlmResponse::text(content).with_usage(Self::default_usage()))
    }

    pub fn tool_call(self, name: &str, arguments: Value) -> Self {
        let call = self.call(name, arguments);
        self.response(LlmResponse::tool_calls(vec![call]).with_usage(Self::default_usage()))
    }

    /// One turn issuing several tool calls at once.
    pub fn tool_calls<'a>(self, calls: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        let calls = calls
            .into_iter()
            .map(|(name, arguments)| self.call(name, arguments))
            .collect();
        self.response(LlmResponse::tool_calls(calls).with_usage(Self::default_usage()))
    }

    pub fn failure(self, message: impl Into<String>) -> Self {
        self.push(Scripted::Failure(message.into()))
    }

    /// Response used once the script is exhausted. Tool call ids stay fixed.
    pub fn then_always(mut self, response: LlmResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    /// Keeps requesting the same tool forever.
    pub fn always_tool_call(self, name: &str, arguments: Value) -> Self {
        let call = ToolCall::new("call_loop", name, arguments);
        self.then_always(LlmResponse::tool_calls(vec![call]).with_usage(Self::default_usage()))
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn next(&self, request: LlmRequest) -> Result<LlmResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let item = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match item {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Failure(message)) => Err(Error::Llm(message)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| Error::Llm("script exhausted".into())),
        }
    }
}

#[async_trait]
impl Llm for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        self.next(request)
    }

    /// Text is streamed word by word so consumers see several deltas.
    async fn generate_streaming(&self, request: LlmRequest) -> Result<LlmStream> {
        let response = self.next(request)?;

        let mut chunks: Vec<LlmChunk> = response
            .content
            .split_inclusive(' ')
            .map(|word| LlmChunk::Text(word.to_string()))
            .collect();
        chunks.extend(response.tool_calls.into_iter().map(LlmChunk::ToolCall));
        chunks.push(LlmChunk::Usage(response.usage));

        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }
}
