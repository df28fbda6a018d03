//! Tool call records exchanged between the model and the dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Usage;

/// Definition of a tool as advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// JSON Schema for the tool arguments
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A tool invocation requested by the model. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Success,
    /// Unknown tool, bad arguments or a failure inside the tool
    Error,
    /// Denied by a hook or by the confirmation gate
    Denied,
}

/// Outcome of one dispatched [`ToolCall`]; exactly one exists per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub id: String,
    pub name: String,
    /// Arguments the tool actually ran with (after any hook modification)
    pub arguments: Value,
    pub result: Value,
    pub status: ToolCallStatus,
}

impl ToolCallResult {
    pub fn success(call: &ToolCall, arguments: Value, result: Value) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
            result,
            status: ToolCallStatus::Success,
        }
    }

    pub fn error(call: &ToolCall, arguments: Value, message: impl Into<String>) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
            result: Value::String(message.into()),
            status: ToolCallStatus::Error,
        }
    }

    pub fn denied(call: &ToolCall, message: impl Into<String>) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result: Value::String(message.into()),
            status: ToolCallStatus::Denied,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolCallStatus::Success
    }

    /// Text fed back to the model as the tool message content.
    pub fn content(&self) -> String {
        match &self.result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Terminal value of a tool, as opposed to the interim events a streaming
/// tool may emit before it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolReturn {
    pub value: Value,
    /// Usage incurred inside the tool (e.g. by a sub-agent), folded into the run total
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ToolReturn {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            usage: None,
            metadata: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
