//! Human-in-the-loop confirmation of tool calls.
//!
//! A pre-tool hook that answers [`PreToolDecision::Ask`](crate::PreToolDecision::Ask)
//! suspends that one call on a [`PendingConfirmation`]. The call resumes when
//! somebody resolves the request through [`ConfirmationManager`] or when its
//! timeout fires, which always denies.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Approval request surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub confirmation_id: String,
    pub tool_name: String,
    pub description: String,
    pub arguments: Value,
    pub timeout_seconds: f64,
    pub created_at: DateTime<Utc>,
}

/// Answers confirmation requests in non-streaming runs (or alongside a stream).
#[async_trait]
pub trait ConfirmationHandler: Send + Sync {
    async fn confirm(&self, request: &ConfirmationRequest) -> bool;
}

/// Handler that gives the same answer to every request.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm {
    approve: bool,
}

impl AutoConfirm {
    pub fn approve() -> Self {
        Self { approve: true }
    }

    pub fn deny() -> Self {
        Self { approve: false }
    }
}

#[async_trait]
impl ConfirmationHandler for AutoConfirm {
    async fn confirm(&self, _request: &ConfirmationRequest) -> bool {
        self.approve
    }
}

struct PendingEntry {
    sender: oneshot::Sender<bool>,
    /// Attached right after insertion; the entry must be in the map before
    /// its timer can fire.
    timeout_task: Option<JoinHandle<()>>,
    request: ConfirmationRequest,
}

impl PendingEntry {
    fn stop_timer(&self) {
        if let Some(task) = &self.timeout_task {
            task.abort();
        }
    }
}

/// Map of confirmation id to pending request.
///
/// Every request leaves the map exactly once: resolved, expired or discarded.
#[derive(Default)]
pub struct ConfirmationManager {
    pending: DashMap<String, PendingEntry>,
}

impl ConfirmationManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a request and schedules its timeout. Must be called inside a
    /// tokio runtime.
    pub fn request_confirmation(
        self: &Arc<Self>,
        tool_name: impl Into<String>,
        description: impl Into<String>,
        arguments: Value,
        timeout: Duration,
    ) -> (ConfirmationRequest, PendingConfirmation) {
        let id = uuid::Uuid::new_v4().to_string();
        let request = ConfirmationRequest {
            confirmation_id: id.clone(),
            tool_name: tool_name.into(),
            description: description.into(),
            arguments,
            timeout_seconds: timeout.as_secs_f64(),
            created_at: Utc::now(),
        };

        let (sender, receiver) = oneshot::channel();
        self.pending.insert(
            id.clone(),
            PendingEntry {
                sender,
                timeout_task: None,
                request: request.clone(),
            },
        );

        let manager = Arc::downgrade(self);
        let timeout_id = id.clone();
        let timeout_task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(manager) = manager.upgrade() {
                manager.expire(&timeout_id);
            }
        });
        // Already settled if the timer beat us here; the handle is then moot.
        if let Some(mut entry) = self.pending.get_mut(&id) {
            entry.timeout_task = Some(timeout_task);
        }
        debug!(confirmation_id = %id, tool = %request.tool_name, "Confirmation requested");

        let handle = PendingConfirmation {
            id,
            receiver,
            manager: Arc::downgrade(self),
        };
        (request, handle)
    }

    /// Returns `true` only for the call that actually settled the request.
    pub fn resolve_confirmation(&self, confirmation_id: &str, approved: bool) -> bool {
        match self.pending.remove(confirmation_id) {
            Some((_, entry)) => {
                entry.stop_timer();
                let _ = entry.sender.send(approved);
                debug!(%confirmation_id, approved, "Confirmation resolved");
                true
            }
            None => false,
        }
    }

    fn expire(&self, confirmation_id: &str) {
        if let Some((_, entry)) = self.pending.remove(confirmation_id) {
            warn!(
                %confirmation_id,
                tool = %entry.request.tool_name,
                "Confirmation timed out, denying"
            );
            let _ = entry.sender.send(false);
        }
    }

    fn discard(&self, confirmation_id: &str) {
        if let Some((_, entry)) = self.pending.remove(confirmation_id) {
            entry.stop_timer();
        }
    }

    /// Denies every outstanding request.
    pub fn cancel_all(&self) {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.resolve_confirmation(&id, false);
        }
    }

    pub fn pending_requests(&self) -> Vec<ConfirmationRequest> {
        self.pending.iter().map(|e| e.request.clone()).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, confirmation_id: &str) -> bool {
        self.pending.contains_key(confirmation_id)
    }
}

impl std::fmt::Debug for ConfirmationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationManager")
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// Resolves to the approval decision. A dropped handle withdraws its request.
#[derive(Debug)]
pub struct PendingConfirmation {
    id: String,
    receiver: oneshot::Receiver<bool>,
    manager: Weak<ConfirmationManager>,
}

impl PendingConfirmation {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Future for PendingConfirmation {
    type Output = bool;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|decision| decision.unwrap_or(false))
    }
}

impl Drop for PendingConfirmation {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.discard(&self.id);
        }
    }
}
