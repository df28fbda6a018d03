//! Turn and token accounting for a single run.

use crate::agent::AgentOptions;
use crate::types::{Message, Usage};
use crate::{Error, Result};

const CHARS_PER_TOKEN: usize = 4;

/// Rough token count of a history, at four characters per token.
pub fn estimate_tokens(messages: &[Message]) -> u64 {
    let chars: usize = messages.iter().map(Message::char_len).sum();
    chars.div_ceil(CHARS_PER_TOKEN) as u64
}

/// Tracks turns and usage (including folded sub-agent usage) against the
/// configured ceilings. It never retries; a breach is returned as an error.
#[derive(Debug, Clone)]
pub struct LimitEnforcer {
    max_turns: usize,
    max_total_tokens: Option<u64>,
    max_prompt_tokens: Option<u64>,
    max_completion_tokens: Option<u64>,
    turns: usize,
    usage: Usage,
}

impl LimitEnforcer {
    pub fn new(options: &AgentOptions) -> Self {
        Self {
            max_turns: options.max_turns,
            max_total_tokens: options.max_total_tokens,
            max_prompt_tokens: options.max_prompt_tokens,
            max_completion_tokens: options.max_completion_tokens,
            turns: 0,
            usage: Usage::default(),
        }
    }

    /// Counts a new turn; fails once the count passes `max_turns`.
    pub fn start_turn(&mut self) -> Result<usize> {
        self.turns += 1;
        if self.turns > self.max_turns {
            return Err(Error::MaxTurnsExceeded {
                limit: self.max_turns,
            });
        }
        Ok(self.turns)
    }

    /// Refuses a model call whose estimated prompt would overflow the total budget.
    pub fn check_next_prompt(&self, messages: &[Message]) -> Result<()> {
        let Some(limit) = self.max_total_tokens else {
            return Ok(());
        };
        let estimated = estimate_tokens(messages);
        let used = self.usage.total_tokens;
        if used + estimated > limit {
            return Err(Error::NextPromptOverLimit {
                estimated,
                used,
                limit,
            });
        }
        Ok(())
    }

    /// Records a model response's usage, then checks every token ceiling.
    pub fn record_response(&mut self, usage: &Usage) -> Result<()> {
        self.usage += usage;
        self.check_usage()
    }

    /// Folds usage incurred outside the model call (e.g. by a sub-agent).
    /// Checked at the next enforcement point.
    pub fn fold(&mut self, usage: &Usage) {
        self.usage += usage;
    }

    fn check_usage(&self) -> Result<()> {
        if let Some(limit) = self.max_total_tokens
            && self.usage.total_tokens > limit
        {
            return Err(Error::TotalTokensExceeded {
                used: self.usage.total_tokens,
                limit,
            });
        }
        if let Some(limit) = self.max_prompt_tokens
            && self.usage.prompt_tokens > limit
        {
            return Err(Error::PromptTokensExceeded {
                used: self.usage.prompt_tokens,
                limit,
            });
        }
        if let Some(limit) = self.max_completion_tokens
            && self.usage.completion_tokens > limit
        {
            return Err(Error::CompletionTokensExceeded {
                used: self.usage.completion_tokens,
                limit,
            });
        }
        Ok(())
    }

    pub fn turns(&self) -> usize {
        self.turns
    }

    pub fn usage(&self) -> &Usage {
        &self.usage
    }
}
