//! Tool dispatch for one turn: pre-tool hooks, confirmation, invocation,
//! post-tool hooks, then fold back in issue order.

use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::events::AgentEvent;
use super::execution::RunLoop;
use crate::Result;
use crate::hooks::{PostToolInput, PreToolDecision, PreToolInput};
use crate::tools::{ToolError, ToolEvent, ToolInvocation};
use crate::types::{Message, ToolCall, ToolCallResult, ToolReturn, Usage};

/// Outcome of one call before it is folded into the run.
struct Dispatched {
    result: ToolCallResult,
    usage: Option<Usage>,
    elapsed: Duration,
    confirmation_asked: bool,
}

impl Dispatched {
    fn denied(call: &ToolCall, message: String, started: Instant, asked: bool) -> Self {
        Self {
            result: ToolCallResult::denied(call, message),
            usage: None,
            elapsed: started.elapsed(),
            confirmation_asked: asked,
        }
    }
}

impl RunLoop {
    /// Resolves every call of the turn. Results are folded in the order the
    /// calls were issued, whatever order they complete in.
    pub(super) async fn dispatch_tools(&mut self, calls: Vec<ToolCall>) -> Result<()> {
        debug!(
            agent = %self.agent.name(),
            count = calls.len(),
            parallel = self.options.parallel_tool_calls,
            "Dispatching tool calls"
        );

        let outcomes = if self.options.parallel_tool_calls && calls.len() > 1 {
            join_all(calls.iter().map(|call| self.dispatch_one(call)))
                .await
                .into_iter()
                .collect::<Result<Vec<_>>>()?
        } else {
            let mut outcomes = Vec::with_capacity(calls.len());
            for call in &calls {
                outcomes.push(self.dispatch_one(call).await?);
            }
            outcomes
        };

        for outcome in outcomes {
            self.fold(outcome).await;
        }
        Ok(())
    }

    async fn fold(&mut self, outcome: Dispatched) {
        let Dispatched {
            result,
            usage,
            elapsed,
            confirmation_asked,
        } = outcome;

        if let Some(usage) = &usage {
            self.limits.fold(usage);
        }
        if confirmation_asked {
            self.metrics.confirmations += 1;
        }
        self.metrics.record_tool(&result.name, elapsed, result.status);
        self.history
            .push(Message::tool(&result.id, &result.name, result.content()));
        self.tool_calls.push(result.clone());
        self.emit(AgentEvent::ToolCallResult(result)).await;
    }

    #[instrument(skip_all, fields(tool = %call.name, call_id = %call.id))]
    async fn dispatch_one(&self, call: &ToolCall) -> Result<Dispatched> {
        let started = Instant::now();
        let decision = self
            .agent
            .hooks()
            .run_pre_tool(PreToolInput {
                agent_name: self.agent.name().to_string(),
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
                timestamp: chrono::Utc::now(),
            })
            .await?;

        let (arguments, asked) = match decision {
            PreToolDecision::Allow => (call.arguments.clone(), false),
            PreToolDecision::Modify(arguments) => (arguments, false),
            PreToolDecision::Deny { reason } => {
                info!(tool = %call.name, %reason, "Tool call denied by hook");
                let message = format!("Denied: {}", reason);
                return Ok(Dispatched::denied(call, message, started, false));
            }
            PreToolDecision::Ask {
                description,
                timeout,
            } => {
                if !self.confirm(call, description, timeout).await {
                    info!(tool = %call.name, "Tool call not confirmed");
                    let message =
                        format!("Denied: the user did not approve running '{}'", call.name);
                    return Ok(Dispatched::denied(call, message, started, true));
                }
                (call.arguments.clone(), true)
            }
        };

        let (mut result, usage) = match self.invoke(call, arguments.clone()).await {
            Ok(ToolReturn { value, usage, .. }) => {
                (ToolCallResult::success(call, arguments.clone(), value), usage)
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                (ToolCallResult::error(call, arguments.clone(), e.to_string()), None)
            }
        };

        result.result = self
            .agent
            .hooks()
            .run_post_tool(PostToolInput::new(
                self.agent.name(),
                &call.id,
                &call.name,
                arguments,
                result.result,
                result.status,
            ))
            .await;

        Ok(Dispatched {
            result,
            usage,
            elapsed: started.elapsed(),
            confirmation_asked: asked,
        })
    }

    /// Runs the tool, relaying interim events of a streaming tool until its
    /// terminal return.
    async fn invoke(
        &self,
        call: &ToolCall,
        arguments: Value,
    ) -> std::result::Result<ToolReturn, ToolError> {
        let tool = self
            .agent
            .tools()
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        let mut events = match tool.invoke(arguments, &self.ctx).await? {
            ToolInvocation::Return(ret) => return Ok(ret),
            ToolInvocation::Stream(events) => events,
        };

        while let Some(event) = events.next().await {
            match event? {
                ToolEvent::Progress(value) => {
                    self.emit(AgentEvent::ToolProgress {
                        call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        value,
                    })
                    .await;
                }
                ToolEvent::Downstream {
                    agent_id,
                    agent_name,
                    event,
                } => {
                    self.emit(AgentEvent::Downstream {
                        agent_id,
                        agent_name,
                        event,
                    })
                    .await;
                }
                ToolEvent::Return(ret) => return Ok(ret),
            }
        }
        Err(ToolError::execution(format!(
            "tool '{}' finished without returning a value",
            call.name
        )))
    }

    /// Suspends this call until the request is approved, denied or expires.
    /// Sibling calls keep running.
    async fn confirm(
        &self,
        call: &ToolCall,
        description: Option<String>,
        timeout: Option<Duration>,
    ) -> bool {
        let timeout = timeout.unwrap_or_else(|| self.options.confirmation_timeout());
        let description =
            description.unwrap_or_else(|| format!("Allow tool '{}' to run?", call.name));
        let (request, mut pending) = self.ctx.confirmations().request_confirmation(
            &call.name,
            description,
            call.arguments.clone(),
            timeout,
        );
        info!(
            confirmation_id = %request.confirmation_id,
            tool = %call.name,
            timeout = ?timeout,
            "Awaiting confirmation"
        );
        self.emit(AgentEvent::ConfirmationRequest(request.clone()))
            .await;

        let Some(handler) = self.ctx.confirmation_handler() else {
            return pending.await;
        };

        tokio::select! {
            approved = &mut pending => approved,
            approved = handler.confirm(&request) => {
                self.ctx
                    .confirmations()
                    .resolve_confirmation(&request.confirmation_id, approved);
                pending.await
            }
        }
    }
}
