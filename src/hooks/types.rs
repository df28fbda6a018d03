//! Hook events, inputs and decisions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::AgentResult;
use crate::types::ToolCallStatus;

/// Lifecycle point a hook fires at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    /// Once, before the first turn (can rewrite or block the input)
    PreRun,
    /// Once the loop reaches a terminal answer (can request a rerun)
    PostRun,
    /// Before each tool call (can allow, modify, deny or ask)
    PreTool,
    /// After each executed tool call (can replace the result)
    PostTool,
}

impl HookEvent {
    /// Whether a failing hook for this event aborts the run.
    pub fn is_blocking(&self) -> bool {
        matches!(self, HookEvent::PreRun | HookEvent::PreTool)
    }

    pub fn all() -> &'static [HookEvent] {
        &[
            HookEvent::PreRun,
            HookEvent::PostRun,
            HookEvent::PreTool,
            HookEvent::PostTool,
        ]
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookEvent::PreRun => write!(f, "pre_run"),
            HookEvent::PostRun => write!(f, "post_run"),
            HookEvent::PreTool => write!(f, "pre_tool"),
            HookEvent::PostTool => write!(f, "post_tool"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PreRunInput {
    pub agent_name: String,
    /// Input as rewritten by earlier hooks
    pub input: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PreRunDecision {
    Continue,
    /// Replace the effective input; later hooks see the replacement.
    Replace(String),
    /// Refuse the run with [`Error::Blocked`](crate::Error::Blocked).
    Block { reason: String },
}

impl PreRunDecision {
    pub fn block(reason: impl Into<String>) -> Self {
        Self::Block {
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PreToolInput {
    pub agent_name: String,
    pub tool_call_id: String,
    pub tool_name: String,
    pub arguments: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PreToolDecision {
    Allow,
    /// Run the tool with these arguments instead.
    Modify(Value),
    /// Never run the tool; the model receives a denial naming `reason`.
    Deny { reason: String },
    /// Suspend the call until a human approves or denies it.
    Ask {
        description: Option<String>,
        timeout: Option<Duration>,
    },
}

impl PreToolDecision {
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    pub fn ask() -> Self {
        Self::Ask {
            description: None,
            timeout: None,
        }
    }

    pub fn ask_with(description: impl Into<String>, timeout: Duration) -> Self {
        Self::Ask {
            description: Some(description.into()),
            timeout: Some(timeout),
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[derive(Clone, Debug)]
pub struct PostToolInput {
    pub agent_name: String,
    pub tool_call_id: String,
    pub tool_name: String,
    pub arguments: Value,
    /// Result as modified by earlier hooks
    pub result: Value,
    pub status: ToolCallStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PostToolDecision {
    Pass,
    Modify(Value),
}

#[derive(Clone, Debug)]
pub struct PostRunInput {
    pub agent_name: String,
    /// Effective input of the run, after pre-run rewriting
    pub input: String,
    pub result: AgentResult,
    /// Reruns already performed in this run
    pub rerun_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// What a post-run hook wants done with the finished result.
#[derive(Clone, Debug)]
pub struct PostRunOutcome {
    pub result: AgentResult,
    pub rerun: bool,
    /// Appended as a user turn on rerun; a generic prompt is used when `None`.
    pub correction_prompt: Option<String>,
}

impl PostRunOutcome {
    pub fn accept(result: AgentResult) -> Self {
        Self {
            result,
            rerun: false,
            correction_prompt: None,
        }
    }

    pub fn rerun(result: AgentResult, correction_prompt: impl Into<String>) -> Self {
        Self {
            result,
            rerun: true,
            correction_prompt: Some(correction_prompt.into()),
        }
    }
}
