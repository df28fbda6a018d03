//! Loading [`AgentOptions`] from YAML, JSON or environment variables.
//!
//! ```rust,no_run
//! use agent_engine::config;
//!
//! # fn example() -> agent_engine::Result<()> {
//! let options = config::from_file("agent.yaml")?;
//! let options = config::from_env_over(options, "AGENT_")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::str::FromStr;

use crate::agent::AgentOptions;
use crate::{Error, Result};

pub const DEFAULT_ENV_PREFIX: &str = "AGENT_";

pub fn from_yaml_str(text: &str) -> Result<AgentOptions> {
    let options: AgentOptions = serde_yaml_bw::from_str(text)
        .map_err(|e| Error::Config(format!("invalid YAML options: {}", e)))?;
    options.validate()?;
    Ok(options)
}

pub fn from_json_str(text: &str) -> Result<AgentOptions> {
    let options: AgentOptions = serde_json::from_str(text)
        .map_err(|e| Error::Config(format!("invalid JSON options: {}", e)))?;
    options.validate()?;
    Ok(options)
}

/// Picks the format from the extension: `.yaml`/`.yml` or `.json`.
pub fn from_file(path: impl AsRef<Path>) -> Result<AgentOptions> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => from_yaml_str(&text),
        Some("json") => from_json_str(&text),
        other => Err(Error::Config(format!(
            "unsupported config extension {:?} for {}",
            other.unwrap_or(""),
            path.display()
        ))),
    }
}

/// Defaults overridden by `{prefix}MAX_TURNS`, `{prefix}TEMPERATURE` and so on.
pub fn from_env(prefix: &str) -> Result<AgentOptions> {
    from_env_over(AgentOptions::default(), prefix)
}

pub fn from_env_over(base: AgentOptions, prefix: &str) -> Result<AgentOptions> {
    from_lookup(base, prefix, |key| std::env::var(key).ok())
}

fn from_lookup(
    mut options: AgentOptions,
    prefix: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<AgentOptions> {
    let get = |name: &str| lookup(&format!("{}{}", prefix, name));

    if let Some(v) = get("MAX_TURNS") {
        options.max_turns = parse(prefix, "MAX_TURNS", &v)?;
    }
    if let Some(v) = get("MAX_TOTAL_TOKENS") {
        options.max_total_tokens = Some(parse(prefix, "MAX_TOTAL_TOKENS", &v)?);
    }
    if let Some(v) = get("MAX_PROMPT_TOKENS") {
        options.max_prompt_tokens = Some(parse(prefix, "MAX_PROMPT_TOKENS", &v)?);
    }
    if let Some(v) = get("MAX_COMPLETION_TOKENS") {
        options.max_completion_tokens = Some(parse(prefix, "MAX_COMPLETION_TOKENS", &v)?);
    }
    if let Some(v) = get("MAX_RETRIES") {
        options.max_retries = parse(prefix, "MAX_RETRIES", &v)?;
    }
    if let Some(v) = get("PARALLEL_TOOL_CALLS") {
        options.parallel_tool_calls = parse(prefix, "PARALLEL_TOOL_CALLS", &v)?;
    }
    if let Some(v) = get("CONFIRMATION_TIMEOUT_SECS") {
        options.confirmation_timeout_secs = parse(prefix, "CONFIRMATION_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = get("TEMPERATURE") {
        options.llm.temperature = Some(parse(prefix, "TEMPERATURE", &v)?);
    }
    if let Some(v) = get("MAX_TOKENS") {
        options.llm.max_tokens = Some(parse(prefix, "MAX_TOKENS", &v)?);
    }

    options.validate()?;
    Ok(options)
}

fn parse<T>(prefix: &str, name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        Error::Config(format!(
            "invalid value '{}' for {}{}: {}",
            value, prefix, name, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_yaml_partial_options() {
        let options = from_yaml_str(
            "max_turns: 4\nmax_total_tokens: 20000\nllm:\n  temperature: 0.2\n",
        )
        .unwrap();
        assert_eq!(options.max_turns, 4);
        assert_eq!(options.max_total_tokens, Some(20000));
        assert_eq!(options.llm.temperature, Some(0.2));
        assert_eq!(options.max_retries, 3);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        assert!(matches!(from_yaml_str("max_turns: many"), Err(Error::Config(_))));
        assert!(matches!(from_json_str(r#"{"max_turns": 0}"#), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_file_by_extension() {
        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(yaml, "parallel_tool_calls: false").unwrap();
        assert!(!from_file(yaml.path()).unwrap().parallel_tool_calls);

        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json, r#"{{"max_retries": 1}}"#).unwrap();
        assert_eq!(from_file(json.path()).unwrap().max_retries, 1);

        let toml = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        assert!(matches!(from_file(toml.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let options = from_lookup(
            AgentOptions::default(),
            "TEST_",
            lookup(&[
                ("TEST_MAX_TURNS", "7"),
                ("TEST_PARALLEL_TOOL_CALLS", "false"),
                ("TEST_TEMPERATURE", "0.5"),
                ("OTHER_MAX_RETRIES", "9"),
            ]),
        )
        .unwrap();
        assert_eq!(options.max_turns, 7);
        assert!(!options.parallel_tool_calls);
        assert_eq!(options.llm.temperature, Some(0.5));
        assert_eq!(options.max_retries, 3);
    }

    #[test]
    fn test_env_malformed_value() {
        let err = from_lookup(
            AgentOptions::default(),
            "TEST_",
            lookup(&[("TEST_MAX_TURNS", "ten")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("TEST_MAX_TURNS"));
    }
}
