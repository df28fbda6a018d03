//! Test helper types for agent tests.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::agent::RunContext;
use crate::hooks::{
    PostToolDecision, PostToolHook, PostToolInput, PreRunDecision, PreRunHook, PreRunInput,
    PreToolDecision, PreToolHook, PreToolInput,
};
use crate::tools::{Tool, ToolError, ToolInvocation};
use crate::types::ToolReturn;

/// Counts invocations and records the arguments it saw.
pub struct TrackingTool {
    pub name: String,
    pub output: Value,
    pub delay: Duration,
    pub call_count: Arc<AtomicUsize>,
    pub seen: Arc<Mutex<Vec<Value>>>,
}

impl TrackingTool {
    pub fn new(name: &str, output: Value) -> Self {
        Self {
            name: name.to_string(),
            output,
            delay: Duration::ZERO,
            call_count: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.call_count)
    }

    pub fn arguments(&self) -> Arc<Mutex<Vec<Value>>> {
        Arc::clone(&self.seen)
    }
}

#[async_trait]
impl Tool for TrackingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Tracking tool for testing"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn invoke(&self, arguments: Value, _ctx: &RunContext) -> Result<ToolInvocation, ToolError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(arguments);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(ToolInvocation::Return(ToolReturn::new(self.output.clone())))
    }
}

pub struct FailingTool {
    pub name: String,
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn invoke(&self, _arguments: Value, _ctx: &RunContext) -> Result<ToolInvocation, ToolError> {
        Err(ToolError::execution("disk on fire"))
    }
}

/// Allows everything, counting calls.
pub struct TestTrackingHook {
    pub call_count: Arc<AtomicUsize>,
}

impl TestTrackingHook {
    pub fn new() -> Self {
        Self {
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl PreToolHook for TestTrackingHook {
    async fn on_pre_tool(&self, _input: PreToolInput) -> crate::Result<PreToolDecision> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(PreToolDecision::Allow)
    }
}

#[async_trait]
impl PostToolHook for TestTrackingHook {
    async fn on_post_tool(&self, _input: PostToolInput) -> crate::Result<PostToolDecision> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(PostToolDecision::Pass)
    }
}

pub struct BlockingHook {
    pub reason: String,
}

#[async_trait]
impl PreRunHook for BlockingHook {
    async fn on_pre_run(&self, _input: PreRunInput) -> crate::Result<PreRunDecision> {
        Ok(PreRunDecision::block(&self.reason))
    }
}

#[async_trait]
impl PreToolHook for BlockingHook {
    async fn on_pre_tool(&self, _input: PreToolInput) -> crate::Result<PreToolDecision> {
        Ok(PreToolDecision::deny(&self.reason))
    }
}

pub struct InputModifyingHook;

#[async_trait]
impl PreToolHook for InputModifyingHook {
    async fn on_pre_tool(&self, _input: PreToolInput) -> crate::Result<PreToolDecision> {
        Ok(PreToolDecision::Modify(json!({
            "file_path": "/modified/path"
        })))
    }
}

pub struct BrokenHook;

#[async_trait]
impl PreToolHook for BrokenHook {
    async fn on_pre_tool(&self, _input: PreToolInput) -> crate::Result<PreToolDecision> {
        Err(crate::Error::Config("policy file missing".into()))
    }
}
