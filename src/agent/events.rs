//! Agent events and result types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::state::RunMetrics;
use crate::confirmation::ConfirmationRequest;
use crate::types::{Message, ToolCall, ToolCallResult, Usage};

/// Units yielded by a streaming run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Text delta from the model
    Text(String),
    /// Tool call issued by the model
    ToolCall(ToolCall),
    /// Resolved tool call, in issue order
    ToolCallResult(ToolCallResult),
    /// Interim value emitted by a streaming tool
    ToolProgress {
        call_id: String,
        tool_name: String,
        value: Value,
    },
    /// A tool call waits for approval
    ConfirmationRequest(ConfirmationRequest),
    /// Event from a nested agent, tagged with its id
    Downstream {
        agent_id: String,
        agent_name: String,
        event: Box<AgentEvent>,
    },
    /// Usage of one model call
    Usage(Usage),
}

impl AgentEvent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AgentEvent::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Innermost event, following `Downstream` nesting.
    pub fn innermost(&self) -> &AgentEvent {
        match self {
            AgentEvent::Downstream { event, .. } => event.innermost(),
            other => other,
        }
    }
}

/// Terminal output of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentResult {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Every resolved tool call, in issue order across turns
    #[serde(default)]
    pub tool_calls: Vec<ToolCallResult>,
    /// Full history, ready to seed a follow-up run
    #[serde(default)]
    pub history: Vec<Message>,
    /// Accumulated across turns and nested delegations
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub metrics: RunMetrics,
}

impl AgentResult {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.usage.total_tokens
    }

    pub fn tool_calls_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ToolCallResult> {
        self.tool_calls.iter().filter(move |c| c.name == name)
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn rerun_count(&self) -> usize {
        self.metadata
            .get("rerun_count")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize
    }

    pub fn retries_exhausted(&self) -> bool {
        self.metadata
            .get("retries_exhausted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
