//! Agent execution engine.

mod context;
mod dispatch;
mod events;
mod execution;
mod executor;
mod options;
mod state;
mod streaming;

#[cfg(test)]
mod tests;

pub use context::{Deps, RunContext};
pub use events::{AgentEvent, AgentResult};
pub use executor::Agent;
pub(crate) use executor::rerun;
pub use options::{
    AgentBuilder, AgentOptions, DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_MAX_RETRIES,
    DEFAULT_MAX_TURNS, RunOptions,
};
pub use state::{RunMetrics, ToolStats};
pub use streaming::AgentStream;
