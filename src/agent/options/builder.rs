//! AgentBuilder struct and configuration methods.

use std::sync::Arc;
use std::time::Duration;

use super::AgentOptions;
use crate::agent::Agent;
use crate::agent::executor::AgentInner;
use crate::hooks::{Hook, HookManager};
use crate::llm::Llm;
use crate::postprocessors::{
    PostProcessor, PostProcessorChain, StreamingPostProcessor, StreamingPostProcessorChain,
};
use crate::tools::{AgentTool, Tool, ToolRegistry};
use crate::{Error, Result};

pub const DEFAULT_AGENT_NAME: &str = "agent";

pub struct AgentBuilder {
    llm: Arc<dyn Llm>,
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    instructions: Option<String>,
    tools: Vec<Arc<dyn Tool>>,
    hooks: HookManager,
    options: AgentOptions,
    post_processors: Vec<Arc<dyn PostProcessor>>,
    streaming_post_processors: Vec<Arc<dyn StreamingPostProcessor>>,
    allow_non_streaming: bool,
}

impl AgentBuilder {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self {
            llm,
            id: None,
            name: None,
            description: None,
            instructions: None,
            tools: Vec::new(),
            hooks: HookManager::new(),
            options: AgentOptions::default(),
            post_processors: Vec::new(),
            streaming_post_processors: Vec::new(),
            allow_non_streaming: true,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Shown to a parent agent when this agent is used as a tool.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// System message placed at the start of a fresh history.
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn tool_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Registers another agent as a tool under its own name.
    pub fn sub_agent(self, agent: Agent) -> Self {
        self.tool(AgentTool::new(agent))
    }

    pub fn hook(mut self, hook: Hook) -> Self {
        self.hooks.register(hook);
        self
    }

    pub fn hook_timeout(mut self, timeout: Duration) -> Self {
        let mut hooks = HookManager::with_timeout(timeout);
        for event in crate::hooks::HookEvent::all() {
            for hook in self.hooks.hooks_for_event(*event) {
                hooks.register(hook.clone());
            }
        }
        self.hooks = hooks;
        self
    }

    pub fn options(mut self, options: AgentOptions) -> Self {
        self.options = options;
        self
    }

    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.options.max_turns = max_turns;
        self
    }

    pub fn max_total_tokens(mut self, limit: u64) -> Self {
        self.options.max_total_tokens = Some(limit);
        self
    }

    pub fn max_prompt_tokens(mut self, limit: u64) -> Self {
        self.options.max_prompt_tokens = Some(limit);
        self
    }

    pub fn max_completion_tokens(mut self, limit: u64) -> Self {
        self.options.max_completion_tokens = Some(limit);
        self
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.options.max_retries = max_retries;
        self
    }

    pub fn parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.options.parallel_tool_calls = enabled;
        self
    }

    /// Default wait for a confirmation, in whole seconds. Zero fails at build.
    pub fn confirmation_timeout_secs(mut self, secs: u64) -> Self {
        self.options.confirmation_timeout_secs = secs;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.llm.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.llm.max_tokens = Some(max_tokens);
        self
    }

    pub fn post_processor<P: PostProcessor + 'static>(mut self, processor: P) -> Self {
        self.post_processors.push(Arc::new(processor));
        self
    }

    pub fn streaming_post_processor<P: StreamingPostProcessor + 'static>(
        mut self,
        processor: P,
    ) -> Self {
        self.streaming_post_processors.push(Arc::new(processor));
        self
    }

    /// Whether batch post-processors may run at the end of a streaming run.
    pub fn allow_non_streaming(mut self, allow: bool) -> Self {
        self.allow_non_streaming = allow;
        self
    }

    /// Fails on duplicate tool names, invalid options or a post-processor
    /// combination the streaming mode cannot honor.
    pub fn build(self) -> Result<Agent> {
        self.options.validate()?;
        let tools = ToolRegistry::from_tools(self.tools)?;

        let name = self.name.unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string());
        if name.trim().is_empty() {
            return Err(Error::Config("agent name must not be empty".into()));
        }

        let post_processors = PostProcessorChain::new(self.post_processors);
        let streaming_post_processors = StreamingPostProcessorChain::new(
            self.streaming_post_processors,
            &post_processors,
            self.allow_non_streaming,
        )?;

        Ok(Agent::from_inner(AgentInner {
            id: self
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name,
            description: self.description,
            instructions: self.instructions,
            llm: self.llm,
            tools,
            hooks: self.hooks,
            options: self.options,
            post_processors,
            streaming_post_processors,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;
    use crate::tools::FunctionTool;
    use crate::types::ToolReturn;
    use serde_json::json;

    fn noop(name: &str) -> FunctionTool {
        FunctionTool::untyped(name, "noop", json!({"type": "object"}), |_args, _ctx| async {
            Ok(ToolReturn::new("ok"))
        })
    }

    #[test]
    fn test_build_defaults() {
        let agent = Agent::builder(Arc::new(ScriptedLlm::new())).build().unwrap();
        assert_eq!(agent.name(), DEFAULT_AGENT_NAME);
        assert!(!agent.id().is_empty());
        assert_eq!(agent.options().max_turns, 10);
    }

    #[test]
    fn test_duplicate_tool_fails_at_build() {
        let result = Agent::builder(Arc::new(ScriptedLlm::new()))
            .tool(noop("search"))
            .tool(noop("search"))
            .build();
        assert!(matches!(result, Err(Error::DuplicateTool(ref n)) if n == "search"));
    }

    #[test]
    fn test_invalid_options_fail_at_build() {
        let result = Agent::builder(Arc::new(ScriptedLlm::new()))
            .max_turns(0)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_confirmation_timeout_in_seconds() {
        let agent = Agent::builder(Arc::new(ScriptedLlm::new()))
            .confirmation_timeout_secs(90)
            .build()
            .unwrap();
        assert_eq!(agent.options().confirmation_timeout(), Duration::from_secs(90));

        let result = Agent::builder(Arc::new(ScriptedLlm::new()))
            .confirmation_timeout_secs(0)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_sets_options() {
        let agent = Agent::builder(Arc::new(ScriptedLlm::new()))
            .name("planner")
            .instructions("Plan carefully")
            .max_turns(4)
            .max_total_tokens(5000)
            .parallel_tool_calls(false)
            .temperature(0.3)
            .tool(noop("a"))
            .build()
            .unwrap();

        assert_eq!(agent.name(), "planner");
        assert_eq!(agent.instructions(), Some("Plan carefully"));
        assert_eq!(agent.options().max_turns, 4);
        assert_eq!(agent.options().max_total_tokens, Some(5000));
        assert!(!agent.options().parallel_tool_calls);
        assert_eq!(agent.options().llm.temperature, Some(0.3));
        assert_eq!(agent.tools().names(), vec!["a"]);
    }
}
