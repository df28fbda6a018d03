//! Hook system for intercepting agent execution.

mod manager;
mod traits;
mod types;

pub use manager::HookManager;
pub use traits::{
    Hook, HookCallback, PostRunHook, PostToolHook, PreRunHook, PreToolHook, ToolMatcher,
};
pub use types::{
    HookEvent, PostRunInput, PostRunOutcome, PostToolDecision, PostToolInput, PreRunDecision,
    PreRunInput, PreToolDecision, PreToolInput,
};
