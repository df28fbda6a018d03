//! Hook manager for registering and executing hooks.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::traits::{Hook, HookCallback};
use super::types::{
    HookEvent, PostRunInput, PostRunOutcome, PostToolDecision, PostToolInput, PreRunDecision,
    PreRunInput, PreToolDecision, PreToolInput,
};
use crate::agent::AgentResult;
use crate::types::ToolCallStatus;
use crate::{Error, Result};

const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// Four per-event hook lists, each kept sorted by ascending priority.
///
/// Hooks with equal priority run in registration order.
#[derive(Clone, Debug)]
pub struct HookManager {
    pre_run: Vec<Hook>,
    post_run: Vec<Hook>,
    pre_tool: Vec<Hook>,
    post_tool: Vec<Hook>,
    default_timeout: Duration,
}

impl Default for HookManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HookManager {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_HOOK_TIMEOUT)
    }

    pub fn with_timeout(default_timeout: Duration) -> Self {
        Self {
            pre_run: Vec::new(),
            post_run: Vec::new(),
            pre_tool: Vec::new(),
            post_tool: Vec::new(),
            default_timeout,
        }
    }

    fn list_mut(&mut self, event: HookEvent) -> &mut Vec<Hook> {
        match event {
            HookEvent::PreRun => &mut self.pre_run,
            HookEvent::PostRun => &mut self.post_run,
            HookEvent::PreTool => &mut self.pre_tool,
            HookEvent::PostTool => &mut self.post_tool,
        }
    }

    pub fn register(&mut self, hook: Hook) {
        let list = self.list_mut(hook.event());
        list.push(hook);
        list.sort_by_key(Hook::priority);
    }

    pub fn unregister(&mut self, name: &str) {
        for event in HookEvent::all() {
            self.list_mut(*event).retain(|h| h.name() != name);
        }
    }

    pub fn hooks_for_event(&self, event: HookEvent) -> &[Hook] {
        match event {
            HookEvent::PreRun => &self.pre_run,
            HookEvent::PostRun => &self.post_run,
            HookEvent::PreTool => &self.pre_tool,
            HookEvent::PostTool => &self.post_tool,
        }
    }

    pub fn hook_names(&self) -> Vec<&str> {
        HookEvent::all()
            .iter()
            .flat_map(|e| self.hooks_for_event(*e))
            .map(Hook::name)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        HookEvent::all()
            .iter()
            .all(|e| self.hooks_for_event(*e).is_empty())
    }

    fn timeout_for(&self, hook: &Hook) -> Duration {
        hook.timeout().unwrap_or(self.default_timeout)
    }

    /// Runs a blocking hook; a failure or timeout aborts the run.
    async fn run_blocking<T>(
        &self,
        hook: &Hook,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let limit = self.timeout_for(hook);
        match timeout(limit, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Error::HookFailed {
                hook: hook.name().to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::HookFailed {
                hook: hook.name().to_string(),
                reason: format!("timed out after {:?}", limit),
            }),
        }
    }

    /// Runs a non-blocking hook; a failure or timeout is logged and skipped.
    async fn run_lenient<T>(&self, hook: &Hook, fut: impl Future<Output = Result<T>>) -> Option<T> {
        let limit = self.timeout_for(hook);
        match timeout(limit, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(hook = hook.name(), event = %hook.event(), error = %e, "Hook execution failed");
                None
            }
            Err(_) => {
                warn!(hook = hook.name(), event = %hook.event(), timeout = ?limit, "Hook timed out");
                None
            }
        }
    }

    /// Chains replacements through every hook; the first `Block` wins.
    pub async fn run_pre_run(&self, agent_name: &str, input: String) -> Result<PreRunDecision> {
        let mut current = input.clone();

        for hook in &self.pre_run {
            let HookCallback::PreRun(callback) = hook.callback() else {
                continue;
            };
            let hook_input = PreRunInput {
                agent_name: agent_name.to_string(),
                input: current.clone(),
                timestamp: Utc::now(),
            };
            match self.run_blocking(hook, callback.on_pre_run(hook_input)).await? {
                PreRunDecision::Continue => {}
                PreRunDecision::Replace(replacement) => {
                    debug!(hook = hook.name(), "Pre-run hook replaced input");
                    current = replacement;
                }
                PreRunDecision::Block { reason } => {
                    debug!(hook = hook.name(), %reason, "Pre-run hook blocked input");
                    return Ok(PreRunDecision::Block { reason });
                }
            }
        }

        if current == input {
            Ok(PreRunDecision::Continue)
        } else {
            Ok(PreRunDecision::Replace(current))
        }
    }

    /// The first non-`Allow` decision wins and stops evaluation.
    pub async fn run_pre_tool(&self, input: PreToolInput) -> Result<PreToolDecision> {
        for hook in &self.pre_tool {
            if !hook.matches_tool(&input.tool_name) {
                continue;
            }
            let HookCallback::PreTool(callback) = hook.callback() else {
                continue;
            };
            let decision = self
                .run_blocking(hook, callback.on_pre_tool(input.clone()))
                .await?;
            if !decision.is_allow() {
                debug!(
                    hook = hook.name(),
                    tool = %input.tool_name,
                    ?decision,
                    "Pre-tool hook decided"
                );
                return Ok(decision);
            }
        }
        Ok(PreToolDecision::Allow)
    }

    /// Each matching hook sees the result left by the previous one.
    pub async fn run_post_tool(&self, input: PostToolInput) -> Value {
        let PostToolInput {
            agent_name,
            tool_call_id,
            tool_name,
            arguments,
            mut result,
            status,
            ..
        } = input;

        for hook in &self.post_tool {
            if !hook.matches_tool(&tool_name) {
                continue;
            }
            let HookCallback::PostTool(callback) = hook.callback() else {
                continue;
            };
            let hook_input = PostToolInput {
                agent_name: agent_name.clone(),
                tool_call_id: tool_call_id.clone(),
                tool_name: tool_name.clone(),
                arguments: arguments.clone(),
                result: result.clone(),
                status,
                timestamp: Utc::now(),
            };
            if let Some(PostToolDecision::Modify(value)) = self
                .run_lenient(hook, callback.on_post_tool(hook_input))
                .await
            {
                result = value;
            }
        }
        result
    }

    /// Chains the result through every hook; the first rerun request wins.
    pub async fn run_post_run(
        &self,
        agent_name: &str,
        input: &str,
        result: AgentResult,
        rerun_count: usize,
    ) -> PostRunOutcome {
        let mut current = result;

        for hook in &self.post_run {
            let HookCallback::PostRun(callback) = hook.callback() else {
                continue;
            };
            let hook_input = PostRunInput {
                agent_name: agent_name.to_string(),
                input: input.to_string(),
                result: current.clone(),
                rerun_count,
                timestamp: Utc::now(),
            };
            if let Some(outcome) = self
                .run_lenient(hook, callback.on_post_run(hook_input))
                .await
            {
                if outcome.rerun {
                    debug!(hook = hook.name(), "Post-run hook requested rerun");
                    return outcome;
                }
                current = outcome.result;
            }
        }
        PostRunOutcome::accept(current)
    }
}

impl PostToolInput {
    pub(crate) fn new(
        agent_name: &str,
        tool_call_id: &str,
        tool_name: &str,
        arguments: Value,
        result: Value,
        status: ToolCallStatus,
    ) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            tool_call_id: tool_call_id.to_string(),
            tool_name: tool_name.to_string(),
            arguments,
            result,
            status,
            timestamp: Utc::now(),
        }
    }
}
