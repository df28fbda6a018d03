//! Token and latency accounting.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Token usage accumulated across model calls (u64 for overflow safety).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt (input) tokens consumed
    pub prompt_tokens: u64,
    /// Completion (output) tokens generated
    pub completion_tokens: u64,
    /// Total tokens as reported by the provider
    pub total_tokens: u64,
    /// Number of model requests this usage covers
    #[serde(default)]
    pub requests: u64,
    /// Time spent waiting on the model, in milliseconds
    #[serde(default)]
    pub latency_ms: u64,
}

impl Usage {
    /// Usage of a single request; total is derived from prompt + completion.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            requests: 1,
            latency_ms: 0,
        }
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Accumulate from another Usage
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.requests += other.requests;
        self.latency_ms += other.latency_ms;
    }

    pub fn is_empty(&self) -> bool {
        self.requests == 0 && self.total_tokens == 0
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(mut self, rhs: Usage) -> Usage {
        Usage::add(&mut self, &rhs);
        self
    }
}

impl AddAssign<&Usage> for Usage {
    fn add_assign(&mut self, rhs: &Usage) {
        Usage::add(self, rhs);
    }
}
