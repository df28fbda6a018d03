//! Turn loop: pre-run, model calls, tool dispatch and post-run reruns.

use std::time::Instant;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::context::RunContext;
use super::events::{AgentEvent, AgentResult};
use super::executor::Agent;
use super::options::AgentOptions;
use super::state::RunMetrics;
use super::streaming::StreamMessage;
use crate::hooks::PreRunDecision;
use crate::limits::LimitEnforcer;
use crate::llm::{LlmChunk, LlmRequest, LlmResponse};
use crate::types::{Message, ToolCall, ToolCallResult};
use crate::{Error, Result};

const DEFAULT_CORRECTION_PROMPT: &str =
    "The previous answer was not accepted. Please try again.";

pub(crate) type EventSink = mpsc::Sender<StreamMessage>;

enum Phase {
    ModelCall,
    DispatchTools(Vec<ToolCall>),
    TerminalText(String),
    PostRun(Box<AgentResult>),
    Done(Box<AgentResult>),
}

/// State of one run. Owns the history exclusively; the agent stays shared.
pub(crate) struct RunLoop {
    pub(super) agent: Agent,
    pub(super) ctx: RunContext,
    pub(super) options: AgentOptions,
    pub(super) sink: Option<EventSink>,
    pub(super) limits: LimitEnforcer,
    pub(super) history: Vec<Message>,
    pub(super) tool_calls: Vec<ToolCallResult>,
    pub(super) metrics: RunMetrics,
    rerun_count: usize,
}

impl RunLoop {
    pub(crate) fn new(
        agent: Agent,
        ctx: RunContext,
        options: AgentOptions,
        sink: Option<EventSink>,
    ) -> Self {
        let limits = LimitEnforcer::new(&options);
        Self {
            agent,
            ctx,
            options,
            sink,
            limits,
            history: Vec::new(),
            tool_calls: Vec::new(),
            metrics: RunMetrics::default(),
            rerun_count: 0,
        }
    }

    #[instrument(skip_all, fields(agent = %self.agent.name()))]
    pub(crate) async fn run(mut self, input: String, history: Vec<Message>) -> Result<AgentResult> {
        let start = Instant::now();
        self.check_cancelled()?;

        let input = self.pre_run(input).await?;
        self.seed_history(history, &input);
        info!(
            agent = %self.agent.name(),
            history_len = self.history.len(),
            "Starting agent run"
        );

        let mut phase = Phase::ModelCall;
        loop {
            self.check_cancelled()?;
            phase = match phase {
                Phase::ModelCall => self.model_call().await?,
                Phase::DispatchTools(calls) => {
                    let cancel = self.ctx.cancellation_token().clone();
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        dispatched = self.dispatch_tools(calls) => dispatched?,
                    }
                    Phase::ModelCall
                }
                Phase::TerminalText(content) => Phase::PostRun(Box::new(self.snapshot(content))),
                Phase::PostRun(result) => self.post_run(&input, *result).await,
                Phase::Done(result) => {
                    let mut result = *result;
                    result.metrics.wall_time_ms = start.elapsed().as_millis() as u64;
                    info!(
                        agent = %self.agent.name(),
                        turns = result.metrics.turns,
                        tool_calls = result.tool_calls.len(),
                        total_tokens = result.usage.total_tokens,
                        rerun_count = self.rerun_count,
                        "Agent run complete"
                    );
                    return Ok(result);
                }
            };
        }
    }

    async fn pre_run(&self, input: String) -> Result<String> {
        match self
            .agent
            .hooks()
            .run_pre_run(self.agent.name(), input.clone())
            .await?
        {
            PreRunDecision::Continue => Ok(input),
            PreRunDecision::Replace(replacement) => Ok(replacement),
            PreRunDecision::Block { reason } => {
                info!(agent = %self.agent.name(), %reason, "Run blocked by pre-run hook");
                Err(Error::Blocked(reason))
            }
        }
    }

    fn seed_history(&mut self, history: Vec<Message>, input: &str) {
        self.history = history;
        if self.history.is_empty()
            && let Some(instructions) = self.agent.instructions()
        {
            self.history.push(Message::system(instructions));
        }
        self.history.push(Message::user(input));
    }

    async fn model_call(&mut self) -> Result<Phase> {
        let turn = self.limits.start_turn()?;
        self.limits.check_next_prompt(&self.history)?;
        debug!(agent = %self.agent.name(), turn, "Calling model");

        let request = LlmRequest {
            messages: self.history.clone(),
            tools: self.agent.tools().definitions(),
            options: self.options.llm.clone(),
        };

        let started = Instant::now();
        let mut response = if self.sink.is_some() {
            self.cancellable(self.generate_streaming(request)).await?
        } else {
            self.cancellable(self.agent.llm().generate(request)).await?
        };
        let elapsed = started.elapsed();

        if response.usage.latency_ms == 0 {
            response.usage.latency_ms = elapsed.as_millis() as u64;
        }
        if response.usage.requests == 0 {
            response.usage.requests = 1;
        }
        self.metrics.record_model_call(elapsed);
        self.emit(AgentEvent::Usage(response.usage)).await;
        self.limits.record_response(&response.usage)?;

        debug!(
            agent = %self.agent.name(),
            turn,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            tool_calls = response.tool_calls.len(),
            "Model responded"
        );

        if !response.wants_tool_use() {
            self.history.push(Message::assistant(response.content.clone()));
            return Ok(Phase::TerminalText(response.content));
        }

        self.history.push(Message::assistant_with_tool_calls(
            response.content,
            response.tool_calls.clone(),
        ));
        for call in &response.tool_calls {
            self.emit(AgentEvent::ToolCall(call.clone())).await;
        }
        Ok(Phase::DispatchTools(response.tool_calls))
    }

    /// Drains the model stream, emitting text deltas as they arrive.
    async fn generate_streaming(&self, request: LlmRequest) -> Result<LlmResponse> {
        let mut chunks = self.agent.llm().generate_streaming(request).await?;
        let mut response = LlmResponse::default();
        let mut usage_seen = false;

        while let Some(chunk) = chunks.next().await {
            match chunk? {
                LlmChunk::Text(delta) => {
                    response.content.push_str(&delta);
                    self.emit(AgentEvent::Text(delta)).await;
                }
                LlmChunk::ToolCall(call) => response.tool_calls.push(call),
                LlmChunk::Usage(usage) => {
                    if usage_seen {
                        response.usage += &usage;
                    } else {
                        response.usage = usage;
                        usage_seen = true;
                    }
                }
            }
        }
        Ok(response)
    }

    async fn post_run(&mut self, input: &str, result: AgentResult) -> Phase {
        let outcome = self
            .agent
            .hooks()
            .run_post_run(self.agent.name(), input, result, self.rerun_count)
            .await;

        if !outcome.rerun {
            return Phase::Done(Box::new(self.finish(outcome.result, false)));
        }
        if self.rerun_count >= self.options.max_retries {
            warn!(
                agent = %self.agent.name(),
                max_retries = self.options.max_retries,
                "Rerun requested but retries exhausted"
            );
            return Phase::Done(Box::new(self.finish(outcome.result, true)));
        }

        self.rerun_count += 1;
        self.metrics.reruns += 1;
        let correction = outcome
            .correction_prompt
            .unwrap_or_else(|| DEFAULT_CORRECTION_PROMPT.to_string());
        info!(
            agent = %self.agent.name(),
            rerun = self.rerun_count,
            "Post-run hook requested rerun"
        );
        self.history.push(Message::user(correction));
        Phase::ModelCall
    }

    fn snapshot(&self, content: String) -> AgentResult {
        let mut metrics = self.metrics.clone();
        metrics.turns = self.limits.turns();
        AgentResult {
            content,
            metadata: Default::default(),
            tool_calls: self.tool_calls.clone(),
            history: self.history.clone(),
            usage: *self.limits.usage(),
            metrics,
        }
    }

    fn finish(&self, mut result: AgentResult, retries_exhausted: bool) -> AgentResult {
        result
            .metadata
            .insert("rerun_count".into(), Value::from(self.rerun_count));
        result
            .metadata
            .insert("retries_exhausted".into(), Value::Bool(retries_exhausted));
        result
    }

    /// Forwards an event to the stream, if any, through the streaming
    /// post-processors. A departed consumer is not an error here; the run
    /// learns about it through cancellation.
    pub(super) async fn emit(&self, event: AgentEvent) {
        let Some(sink) = &self.sink else {
            return;
        };
        let Some(event) = self.agent.inner().streaming_post_processors.apply(event) else {
            return;
        };
        if sink.send(StreamMessage::Event(event)).await.is_err() {
            debug!(agent = %self.agent.name(), "Event consumer dropped");
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    pub(super) async fn cancellable<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.ctx.cancellation_token().cancelled() => Err(Error::Cancelled),
            result = fut => result,
        }
    }
}
