//! Agent core structure and entry points.

use std::sync::Arc;

use tracing::instrument;

use super::context::RunContext;
use super::events::AgentResult;
use super::execution::RunLoop;
use super::options::{AgentBuilder, AgentOptions, RunOptions};
use super::streaming::AgentStream;
use crate::Result;
use crate::hooks::HookManager;
use crate::llm::Llm;
use crate::postprocessors::{PostProcessContext, PostProcessorChain, StreamingPostProcessorChain};
use crate::tools::ToolRegistry;
use crate::types::Message;

pub(crate) struct AgentInner {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) instructions: Option<String>,
    pub(crate) llm: Arc<dyn Llm>,
    pub(crate) tools: ToolRegistry,
    pub(crate) hooks: HookManager,
    pub(crate) options: AgentOptions,
    pub(crate) post_processors: PostProcessorChain,
    pub(crate) streaming_post_processors: StreamingPostProcessorChain,
}

/// Immutable agent configuration. Cloning shares it.
///
/// An agent holds no conversation state; each run owns its history, and
/// [`AgentResult::history`] can seed the next one through
/// [`Agent::run_with_history`]. One agent may serve concurrent runs.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    pub fn builder(llm: Arc<dyn Llm>) -> AgentBuilder {
        AgentBuilder::new(llm)
    }

    pub(crate) fn from_inner(inner: AgentInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub(crate) fn inner(&self) -> &AgentInner {
        &self.inner
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }

    pub fn instructions(&self) -> Option<&str> {
        self.inner.instructions.as_deref()
    }

    pub fn options(&self) -> &AgentOptions {
        &self.inner.options
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.inner.tools
    }

    pub fn hooks(&self) -> &HookManager {
        &self.inner.hooks
    }

    pub fn llm(&self) -> &Arc<dyn Llm> {
        &self.inner.llm
    }

    pub async fn run(&self, input: impl Into<String>, ctx: &RunContext) -> Result<AgentResult> {
        self.execute(input.into(), Vec::new(), ctx, &RunOptions::default())
            .await
    }

    pub async fn run_with_options(
        &self,
        input: impl Into<String>,
        ctx: &RunContext,
        overrides: &RunOptions,
    ) -> Result<AgentResult> {
        self.execute(input.into(), Vec::new(), ctx, overrides).await
    }

    /// Continues a conversation from a prior [`AgentResult::history`].
    pub async fn run_with_history(
        &self,
        input: impl Into<String>,
        history: Vec<Message>,
        ctx: &RunContext,
    ) -> Result<AgentResult> {
        self.execute(input.into(), history, ctx, &RunOptions::default())
            .await
    }

    /// Starts a run in a background task and returns its event stream.
    ///
    /// Dropping the stream cancels the run.
    pub fn run_streaming(&self, input: impl Into<String>, ctx: RunContext) -> AgentStream {
        self.run_streaming_with_options(input, ctx, &RunOptions::default())
    }

    pub fn run_streaming_with_options(
        &self,
        input: impl Into<String>,
        ctx: RunContext,
        overrides: &RunOptions,
    ) -> AgentStream {
        AgentStream::spawn(
            self.clone(),
            input.into(),
            Vec::new(),
            ctx,
            self.inner.options.merge(overrides),
        )
    }

    #[instrument(skip_all, fields(agent = %self.inner.name))]
    async fn execute(
        &self,
        input: String,
        history: Vec<Message>,
        ctx: &RunContext,
        overrides: &RunOptions,
    ) -> Result<AgentResult> {
        let options = self.inner.options.merge(overrides);
        options.validate()?;

        let result = RunLoop::new(self.clone(), ctx.clone(), options.clone(), None)
            .run(input.clone(), history)
            .await?;

        let post = PostProcessContext::new(self.clone(), ctx.clone(), input, options);
        self.inner.post_processors.apply(result, &post).await
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("model", &self.inner.llm.model_name())
            .field("tools", &self.inner.tools.names())
            .field("options", &self.inner.options)
            .finish()
    }
}

/// Runs the loop again without post-processing.
pub(crate) async fn rerun(
    agent: Agent,
    ctx: RunContext,
    options: AgentOptions,
    correction: String,
    history: Vec<Message>,
) -> Result<AgentResult> {
    RunLoop::new(agent, ctx, options, None)
        .run(correction, history)
        .await
}
