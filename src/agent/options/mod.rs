//! Agent options and builder.

mod builder;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::llm::LlmOptions;
use crate::{Error, Result};

pub use builder::AgentBuilder;

pub const DEFAULT_MAX_TURNS: usize = 10;
pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 60;

/// Default run options of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentOptions {
    /// Model calls allowed per run, reruns included
    pub max_turns: usize,
    pub max_total_tokens: Option<u64>,
    pub max_prompt_tokens: Option<u64>,
    pub max_completion_tokens: Option<u64>,
    /// Reruns a post-run hook may trigger
    pub max_retries: usize,
    /// Run the tool calls of one turn concurrently
    pub parallel_tool_calls: bool,
    /// Used when an `Ask` decision carries no timeout
    pub confirmation_timeout_secs: u64,
    pub llm: LlmOptions,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            max_total_tokens: None,
            max_prompt_tokens: None,
            max_completion_tokens: None,
            max_retries: DEFAULT_MAX_RETRIES,
            parallel_tool_calls: true,
            confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            llm: LlmOptions::default(),
        }
    }
}

impl AgentOptions {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    /// Applies per-run overrides on top of these defaults.
    pub fn merge(&self, overrides: &RunOptions) -> AgentOptions {
        AgentOptions {
            max_turns: overrides.max_turns.unwrap_or(self.max_turns),
            max_total_tokens: overrides.max_total_tokens.or(self.max_total_tokens),
            max_prompt_tokens: overrides.max_prompt_tokens.or(self.max_prompt_tokens),
            max_completion_tokens: overrides
                .max_completion_tokens
                .or(self.max_completion_tokens),
            max_retries: overrides.max_retries.unwrap_or(self.max_retries),
            parallel_tool_calls: overrides
                .parallel_tool_calls
                .unwrap_or(self.parallel_tool_calls),
            confirmation_timeout_secs: overrides
                .confirmation_timeout_secs
                .unwrap_or(self.confirmation_timeout_secs),
            llm: self.llm.merge(&overrides.llm),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(Error::Config("max_turns must be at least 1".into()));
        }
        if self.confirmation_timeout_secs == 0 {
            return Err(Error::Config(
                "confirmation_timeout_secs must be at least 1".into(),
            ));
        }
        if let Some(temperature) = self.llm.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(Error::Config(format!(
                "temperature {} out of range 0.0..=2.0",
                temperature
            )));
        }
        Ok(())
    }
}

/// Per-run overrides; unset fields fall back to the agent's [`AgentOptions`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub max_turns: Option<usize>,
    pub max_total_tokens: Option<u64>,
    pub max_prompt_tokens: Option<u64>,
    pub max_completion_tokens: Option<u64>,
    pub max_retries: Option<usize>,
    pub parallel_tool_calls: Option<bool>,
    pub confirmation_timeout_secs: Option<u64>,
    pub llm: LlmOptions,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn max_total_tokens(mut self, limit: u64) -> Self {
        self.max_total_tokens = Some(limit);
        self
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = Some(enabled);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.llm.temperature = Some(temperature);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = AgentOptions::default();
        assert_eq!(options.max_turns, 10);
        assert_eq!(options.max_retries, 3);
        assert!(options.parallel_tool_calls);
        assert_eq!(options.confirmation_timeout(), Duration::from_secs(60));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_merge_overrides() {
        let base = AgentOptions {
            max_total_tokens: Some(1000),
            ..Default::default()
        };
        let merged = base.merge(&RunOptions::new().max_turns(3).temperature(0.1));

        assert_eq!(merged.max_turns, 3);
        assert_eq!(merged.max_total_tokens, Some(1000));
        assert_eq!(merged.max_retries, 3);
        assert_eq!(merged.llm.temperature, Some(0.1));
    }

    #[test]
    fn test_validate_rejects_zero_turns() {
        let options = AgentOptions {
            max_turns: 0,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let options: AgentOptions =
            serde_json::from_str(r#"{"max_turns": 4, "llm": {"temperature": 0.5}}"#).unwrap();
        assert_eq!(options.max_turns, 4);
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.llm.temperature, Some(0.5));
    }
}
