//! Supervisor that has a second model review the final answer.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{PostProcessContext, PostProcessor};
use crate::Result;
use crate::agent::AgentResult;
use crate::llm::{Llm, LlmOptions, LlmRequest};
use crate::types::Message;

const DEFAULT_SUPERVISOR_RETRIES: usize = 2;

const DEFAULT_REVIEW_INSTRUCTIONS: &str = "You review answers produced by another assistant. \
Reply with ACCEPT if the answer fully and correctly addresses the task. \
Otherwise reply with REJECT followed by a short explanation of what must be fixed.";

enum Verdict {
    Accept,
    Reject(String),
}

impl Verdict {
    fn parse(reply: &str) -> Self {
        let reply = reply.trim();
        let upper = reply.to_ascii_uppercase();
        if upper.starts_with("ACCEPT") {
            return Verdict::Accept;
        }
        let feedback = if upper.starts_with("REJECT") {
            reply["REJECT".len()..].trim_start_matches([':', ' ', '-', '\n'])
        } else {
            reply
        };
        Verdict::Reject(feedback.trim().to_string())
    }
}

/// Asks a validator model to accept or reject the answer and reruns the
/// agent with the validator's feedback until it accepts or retries run out.
///
/// Metadata keys: `supervisor_retries` and `supervisor_accepted`.
pub struct SupervisorPostProcessor {
    validator: Arc<dyn Llm>,
    instructions: String,
    max_retries: usize,
}

impl SupervisorPostProcessor {
    pub fn new(validator: Arc<dyn Llm>) -> Self {
        Self {
            validator,
            instructions: DEFAULT_REVIEW_INSTRUCTIONS.to_string(),
            max_retries: DEFAULT_SUPERVISOR_RETRIES,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn review(&self, task: &str, result: &mut AgentResult) -> Result<Verdict> {
        let request = LlmRequest {
            messages: vec![
                Message::system(&self.instructions),
                Message::user(format!(
                    "Task:\n{}\n\nAnswer:\n{}",
                    task, result.content
                )),
            ],
            tools: Vec::new(),
            options: LlmOptions::default(),
        };
        let response = self.validator.generate(request).await?;
        result.usage += &response.usage;
        Ok(Verdict::parse(&response.content))
    }
}

#[async_trait]
impl PostProcessor for SupervisorPostProcessor {
    fn name(&self) -> &str {
        "supervisor"
    }

    async fn process(&self, result: AgentResult, run: &PostProcessContext) -> Result<AgentResult> {
        let mut current = result;
        let mut retries = 0;

        let accepted = loop {
            let feedback = match self.review(run.input(), &mut current).await? {
                Verdict::Accept => break true,
                Verdict::Reject(feedback) => feedback,
            };
            if retries >= self.max_retries {
                warn!(
                    agent = %run.agent().name(),
                    retries,
                    "Supervisor rejected the answer and retries are exhausted"
                );
                break false;
            }

            retries += 1;
            info!(agent = %run.agent().name(), retry = retries, "Supervisor requested a rerun");
            debug!(%feedback, "Supervisor feedback");

            let correction = if feedback.is_empty() {
                "Your answer was rejected by review. Please try again.".to_string()
            } else {
                format!("Your answer was rejected by review: {}", feedback)
            };
            let usage_so_far = current.usage;
            let mut rerun = run.rerun(current.history.clone(), correction).await?;
            rerun.usage += &usage_so_far;
            current = rerun;
        };

        current
            .metadata
            .insert("supervisor_retries".into(), Value::from(retries));
        current
            .metadata
            .insert("supervisor_accepted".into(), Value::Bool(accepted));
        Ok(current)
    }
}
