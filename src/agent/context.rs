//! Per-invocation run context.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::confirmation::{ConfirmationHandler, ConfirmationManager};

/// Type map of values injected by the caller and readable by tools.
#[derive(Clone, Default)]
pub struct Deps {
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Deps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any earlier value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.values.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for Deps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deps").field("len", &self.len()).finish()
    }
}

/// State shared by one top-level run and every nested run it delegates to.
///
/// Cloning is cheap; clones share the dependency map, the downstream agent
/// registry, the confirmation manager and the cancellation token. Create a
/// fresh context per top-level `run`/`run_streaming` call.
#[derive(Clone)]
pub struct RunContext {
    deps: Arc<Deps>,
    downstream_agents: Arc<DashMap<String, String>>,
    stream_downstream_events: bool,
    confirmations: Arc<ConfirmationManager>,
    confirmation_handler: Option<Arc<dyn ConfirmationHandler>>,
    cancel: CancellationToken,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            deps: Arc::new(Deps::new()),
            downstream_agents: Arc::new(DashMap::new()),
            stream_downstream_events: false,
            confirmations: ConfirmationManager::new(),
            confirmation_handler: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_deps(mut self, deps: Deps) -> Self {
        self.deps = Arc::new(deps);
        self
    }

    pub fn with_dep<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        Arc::make_mut(&mut self.deps).insert(value);
        self
    }

    /// Forward nested agents' events to this run's stream.
    pub fn with_stream_downstream_events(mut self, enabled: bool) -> Self {
        self.stream_downstream_events = enabled;
        self
    }

    pub fn with_confirmation_handler(mut self, handler: impl ConfirmationHandler + 'static) -> Self {
        self.confirmation_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn deps(&self) -> &Deps {
        &self.deps
    }

    pub fn stream_downstream_events(&self) -> bool {
        self.stream_downstream_events
    }

    pub fn confirmations(&self) -> &Arc<ConfirmationManager> {
        &self.confirmations
    }

    pub fn confirmation_handler(&self) -> Option<&Arc<dyn ConfirmationHandler>> {
        self.confirmation_handler.as_ref()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Records a sub-agent met during delegation. The registry only grows.
    pub fn register_downstream_agent(&self, agent_id: &str, agent_name: &str) {
        self.downstream_agents
            .entry(agent_id.to_string())
            .or_insert_with(|| agent_name.to_string());
    }

    /// Snapshot of sub-agents registered so far, id to name.
    pub fn downstream_agents(&self) -> HashMap<String, String> {
        self.downstream_agents
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Context for a nested run: everything shared, cancelled with the parent.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("deps", &self.deps)
            .field("downstream_agents", &self.downstream_agents.len())
            .field("stream_downstream_events", &self.stream_downstream_events)
            .field("pending_confirmations", &self.confirmations.pending_count())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
