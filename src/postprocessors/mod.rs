//! Result transformers applied after the run loop.
//!
//! Batch processors see the final [`AgentResult`] once, in order. Streaming
//! processors see every event a streaming run emits and may rewrite or drop
//! it. In a streaming run the batch chain still runs once at the end, so the
//! final `content` can differ from the concatenated text events.

mod supervisor;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::agent::{Agent, AgentEvent, AgentOptions, AgentResult, RunContext};
use crate::types::Message;
use crate::{Error, Result};

pub use supervisor::SupervisorPostProcessor;

#[async_trait]
pub trait PostProcessor: Send + Sync {
    fn name(&self) -> &str;

    async fn process(&self, result: AgentResult, run: &PostProcessContext) -> Result<AgentResult>;
}

pub trait StreamingPostProcessor: Send + Sync {
    fn name(&self) -> &str;

    /// Returns `None` to drop the event from the stream.
    fn process_chunk(&self, event: AgentEvent) -> Option<AgentEvent>;
}

impl<F> StreamingPostProcessor for F
where
    F: Fn(AgentEvent) -> Option<AgentEvent> + Send + Sync,
{
    fn name(&self) -> &str {
        "closure"
    }

    fn process_chunk(&self, event: AgentEvent) -> Option<AgentEvent> {
        self(event)
    }
}

/// What a batch processor knows about the run it post-processes.
pub struct PostProcessContext {
    agent: Agent,
    ctx: RunContext,
    input: String,
    options: AgentOptions,
}

impl PostProcessContext {
    pub(crate) fn new(agent: Agent, ctx: RunContext, input: String, options: AgentOptions) -> Self {
        Self {
            agent,
            ctx,
            input,
            options,
        }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Input the run was started with, before pre-run hooks.
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    /// Runs the agent again from `history` with `correction` as the next user
    /// turn. Post-processors are not applied to the rerun.
    pub async fn rerun(
        &self,
        history: Vec<Message>,
        correction: impl Into<String>,
    ) -> Result<AgentResult> {
        crate::agent::rerun(
            self.agent.clone(),
            self.ctx.clone(),
            self.options.clone(),
            correction.into(),
            history,
        )
        .await
    }
}

#[derive(Clone, Default)]
pub struct PostProcessorChain {
    processors: Vec<Arc<dyn PostProcessor>>,
}

impl PostProcessorChain {
    pub fn new(processors: Vec<Arc<dyn PostProcessor>>) -> Self {
        Self { processors }
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub async fn apply(&self, result: AgentResult, run: &PostProcessContext) -> Result<AgentResult> {
        let mut current = result;
        for processor in &self.processors {
            debug!(processor = processor.name(), "Applying post-processor");
            current = processor.process(current, run).await?;
        }
        Ok(current)
    }
}

impl std::fmt::Debug for PostProcessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostProcessorChain")
            .field("processors", &self.names())
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct StreamingPostProcessorChain {
    processors: Vec<Arc<dyn StreamingPostProcessor>>,
    allow_non_streaming: bool,
}

impl StreamingPostProcessorChain {
    /// Rejects batch processors when they may not run at the end of a stream.
    pub fn new(
        processors: Vec<Arc<dyn StreamingPostProcessor>>,
        batch: &PostProcessorChain,
        allow_non_streaming: bool,
    ) -> Result<Self> {
        if !allow_non_streaming && !batch.is_empty() {
            return Err(Error::InvalidPostProcessor(format!(
                "non-streaming post-processors [{}] configured while allow_non_streaming is false",
                batch.names().join(", ")
            )));
        }
        Ok(Self {
            processors,
            allow_non_streaming,
        })
    }

    pub fn allow_non_streaming(&self) -> bool {
        self.allow_non_streaming
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn apply(&self, event: AgentEvent) -> Option<AgentEvent> {
        self.processors
            .iter()
            .try_fold(event, |event, processor| processor.process_chunk(event))
    }
}

impl std::fmt::Debug for StreamingPostProcessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingPostProcessorChain")
            .field(
                "processors",
                &self.processors.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("allow_non_streaming", &self.allow_non_streaming)
            .finish()
    }
}
