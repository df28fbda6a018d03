//! Hook callbacks and configuration.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use super::types::{
    HookEvent, PostRunInput, PostRunOutcome, PostToolDecision, PostToolInput, PreRunDecision,
    PreRunInput, PreToolDecision, PreToolInput,
};
use crate::{Error, Result};

#[async_trait]
pub trait PreRunHook: Send + Sync {
    async fn on_pre_run(&self, input: PreRunInput) -> Result<PreRunDecision>;
}

#[async_trait]
pub trait PostRunHook: Send + Sync {
    async fn on_post_run(&self, input: PostRunInput) -> Result<PostRunOutcome>;
}

#[async_trait]
pub trait PreToolHook: Send + Sync {
    async fn on_pre_tool(&self, input: PreToolInput) -> Result<PreToolDecision>;
}

#[async_trait]
pub trait PostToolHook: Send + Sync {
    async fn on_post_tool(&self, input: PostToolInput) -> Result<PostToolDecision>;
}

#[async_trait]
impl<F, Fut> PreRunHook for F
where
    F: Fn(PreRunInput) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PreRunDecision>> + Send,
{
    async fn on_pre_run(&self, input: PreRunInput) -> Result<PreRunDecision> {
        (self)(input).await
    }
}

#[async_trait]
impl<F, Fut> PostRunHook for F
where
    F: Fn(PostRunInput) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PostRunOutcome>> + Send,
{
    async fn on_post_run(&self, input: PostRunInput) -> Result<PostRunOutcome> {
        (self)(input).await
    }
}

#[async_trait]
impl<F, Fut> PreToolHook for F
where
    F: Fn(PreToolInput) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PreToolDecision>> + Send,
{
    async fn on_pre_tool(&self, input: PreToolInput) -> Result<PreToolDecision> {
        (self)(input).await
    }
}

#[async_trait]
impl<F, Fut> PostToolHook for F
where
    F: Fn(PostToolInput) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PostToolDecision>> + Send,
{
    async fn on_post_tool(&self, input: PostToolInput) -> Result<PostToolDecision> {
        (self)(input).await
    }
}

#[derive(Clone)]
pub enum HookCallback {
    PreRun(Arc<dyn PreRunHook>),
    PostRun(Arc<dyn PostRunHook>),
    PreTool(Arc<dyn PreToolHook>),
    PostTool(Arc<dyn PostToolHook>),
}

impl HookCallback {
    pub fn event(&self) -> HookEvent {
        match self {
            HookCallback::PreRun(_) => HookEvent::PreRun,
            HookCallback::PostRun(_) => HookEvent::PostRun,
            HookCallback::PreTool(_) => HookEvent::PreTool,
            HookCallback::PostTool(_) => HookEvent::PostTool,
        }
    }
}

/// Restricts a tool hook to some tool names.
///
/// Patterns are unanchored regexes; use `^...$` for a full match.
#[derive(Clone, Debug)]
pub enum ToolMatcher {
    Names(Vec<String>),
    Pattern(Regex),
}

impl ToolMatcher {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Names(vec![name.into()])
    }

    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Names(names.into_iter().map(Into::into).collect())
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| Error::Config(format!("invalid tool matcher '{}': {}", pattern, e)))
    }

    pub fn is_match(&self, tool_name: &str) -> bool {
        match self {
            Self::Names(names) => names.iter().any(|n| n == tool_name),
            Self::Pattern(regex) => regex.is_match(tool_name),
        }
    }
}

/// A registered interceptor: one callback for one event, an optional tool
/// filter and a priority (lower runs first).
#[derive(Clone)]
pub struct Hook {
    name: String,
    callback: HookCallback,
    tool_filter: Option<ToolMatcher>,
    priority: i32,
    timeout: Option<Duration>,
}

impl Hook {
    fn with_callback(name: impl Into<String>, callback: HookCallback) -> Self {
        Self {
            name: name.into(),
            callback,
            tool_filter: None,
            priority: 0,
            timeout: None,
        }
    }

    pub fn pre_run(name: impl Into<String>, hook: impl PreRunHook + 'static) -> Self {
        Self::with_callback(name, HookCallback::PreRun(Arc::new(hook)))
    }

    pub fn post_run(name: impl Into<String>, hook: impl PostRunHook + 'static) -> Self {
        Self::with_callback(name, HookCallback::PostRun(Arc::new(hook)))
    }

    pub fn pre_tool(name: impl Into<String>, hook: impl PreToolHook + 'static) -> Self {
        Self::with_callback(name, HookCallback::PreTool(Arc::new(hook)))
    }

    pub fn post_tool(name: impl Into<String>, hook: impl PostToolHook + 'static) -> Self {
        Self::with_callback(name, HookCallback::PostTool(Arc::new(hook)))
    }

    pub fn with_tool_filter(mut self, matcher: ToolMatcher) -> Self {
        self.tool_filter = Some(matcher);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn event(&self) -> HookEvent {
        self.callback.event()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn callback(&self) -> &HookCallback {
        &self.callback
    }

    /// `None` filter matches every tool; run events ignore the filter.
    pub fn matches_tool(&self, tool_name: &str) -> bool {
        self.tool_filter
            .as_ref()
            .is_none_or(|matcher| matcher.is_match(tool_name))
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("event", &self.event())
            .field("tool_filter", &self.tool_filter)
            .field("priority", &self.priority)
            .finish()
    }
}
