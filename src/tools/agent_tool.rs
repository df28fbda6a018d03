//! Agent-as-tool delegation.

use async_trait::async_trait;
use futures::{StreamExt, stream};
use serde_json::{Value, json};
use tracing::debug;

use super::{Tool, ToolError, ToolEvent, ToolInvocation};
use crate::agent::{Agent, AgentStream, RunContext};
use crate::types::ToolReturn;

/// Exposes an [`Agent`] as a tool taking a single `input` string.
///
/// Each call runs a nested loop with its own history on a child of the
/// caller's [`RunContext`]; only the sub-agent's final content and usage come
/// back. When the context has `stream_downstream_events` set, the nested run's
/// events are forwarded tagged with the sub-agent's id.
#[derive(Clone)]
pub struct AgentTool {
    agent: Agent,
    name: String,
    description: String,
}

impl AgentTool {
    pub fn new(agent: Agent) -> Self {
        let name = agent.name().to_string();
        let description = agent
            .description()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Delegate a task to the {} agent", name));
        Self {
            agent,
            name,
            description,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    fn failure(&self, err: impl ToString) -> ToolError {
        ToolError::Agent {
            agent: self.agent.name().to_string(),
            message: err.to_string(),
        }
    }

    fn forward(&self, nested: AgentStream) -> ToolInvocation {
        let agent_id = self.agent.id().to_string();
        let agent_name = self.agent.name().to_string();

        let events = stream::unfold(Some(nested), move |state| {
            let agent_id = agent_id.clone();
            let agent_name = agent_name.clone();
            async move {
                let mut nested = state?;
                match nested.next().await {
                    Some(Ok(event)) => Some((
                        Ok(ToolEvent::Downstream {
                            agent_id,
                            agent_name,
                            event: Box::new(event),
                        }),
                        Some(nested),
                    )),
                    Some(Err(e)) => Some((
                        Err(ToolError::Agent {
                            agent: agent_name,
                            message: e.to_string(),
                        }),
                        None,
                    )),
                    None => {
                        let item = match nested.into_result() {
                            Some(result) => Ok(ToolEvent::Return(
                                ToolReturn::new(result.content)
                                    .with_usage(result.usage)
                                    .with_metadata(json!({ "agent_id": agent_id })),
                            )),
                            None => Err(ToolError::Agent {
                                agent: agent_name,
                                message: "nested run ended without a result".into(),
                            }),
                        };
                        Some((item, None))
                    }
                }
            }
        });

        ToolInvocation::stream(events)
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "string",
                    "description": "Task or question for the agent"
                }
            },
            "required": ["input"]
        })
    }

    async fn invoke(
        &self,
        arguments: Value,
        ctx: &RunContext,
    ) -> Result<ToolInvocation, ToolError> {
        let input = arguments
            .get("input")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid_arguments("missing string field 'input'"))?
            .to_string();

        ctx.register_downstream_agent(self.agent.id(), self.agent.name());
        let child = ctx.child();
        debug!(
            agent = %self.agent.name(),
            streaming = ctx.stream_downstream_events(),
            "Delegating to sub-agent"
        );

        if ctx.stream_downstream_events() {
            return Ok(self.forward(self.agent.run_streaming(input, child)));
        }

        let result = self
            .agent
            .run(input, &child)
            .await
            .map_err(|e| self.failure(e))?;

        Ok(ToolInvocation::Return(
            ToolReturn::new(result.content)
                .with_usage(result.usage)
                .with_metadata(json!({ "agent_id": self.agent.id() })),
        ))
    }
}
