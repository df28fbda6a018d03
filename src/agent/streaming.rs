//! Streaming runs: the loop runs in a background task and reports through a
//! channel.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use pin_project_lite::pin_project;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::context::RunContext;
use super::events::{AgentEvent, AgentResult};
use super::execution::RunLoop;
use super::executor::Agent;
use super::options::AgentOptions;
use crate::confirmation::ConfirmationManager;
use crate::postprocessors::PostProcessContext;
use crate::types::Message;
use crate::{Error, Result};

const EVENT_BUFFER: usize = 64;

pub(crate) enum StreamMessage {
    Event(AgentEvent),
    Done(Result<AgentResult>),
}

/// Cancels the run when the stream goes away.
struct RunGuard {
    task: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

pin_project! {
    /// Events of a streaming run, in emission order.
    ///
    /// The stream ends after the last event of a successful run; the final
    /// [`AgentResult`] is then available from [`AgentStream::result`]. A
    /// failed run yields its error as the last item. Pending confirmations
    /// can be answered through [`AgentStream::resolve_confirmation`].
    pub struct AgentStream {
        receiver: mpsc::Receiver<StreamMessage>,
        result: Option<AgentResult>,
        finished: bool,
        confirmations: Arc<ConfirmationManager>,
        guard: RunGuard,
    }
}

impl AgentStream {
    pub(crate) fn spawn(
        agent: Agent,
        input: String,
        history: Vec<Message>,
        ctx: RunContext,
        options: AgentOptions,
    ) -> Self {
        let ctx = ctx.child();
        let cancel = ctx.cancellation_token().clone();
        let confirmations = Arc::clone(ctx.confirmations());
        let (sender, receiver) = mpsc::channel(EVENT_BUFFER);

        let task = tokio::spawn(async move {
            let outcome = match options.validate() {
                Ok(()) => {
                    let run = RunLoop::new(
                        agent.clone(),
                        ctx.clone(),
                        options.clone(),
                        Some(sender.clone()),
                    );
                    match run.run(input.clone(), history).await {
                        Ok(result) => {
                            let post = PostProcessContext::new(agent.clone(), ctx, input, options);
                            agent.inner().post_processors.apply(result, &post).await
                        }
                        Err(e) => Err(e),
                    }
                }
                Err(e) => Err(e),
            };
            if sender.send(StreamMessage::Done(outcome)).await.is_err() {
                debug!(agent = %agent.name(), "Stream dropped before completion");
            }
        });

        Self {
            receiver,
            result: None,
            finished: false,
            confirmations,
            guard: RunGuard { task, cancel },
        }
    }

    /// Final result, once the stream has ended successfully.
    pub fn result(&self) -> Option<&AgentResult> {
        self.result.as_ref()
    }

    pub fn into_result(mut self) -> Option<AgentResult> {
        self.result.take()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn confirmations(&self) -> &Arc<ConfirmationManager> {
        &self.confirmations
    }

    /// Answers a `ConfirmationRequest` seen on this stream.
    pub fn resolve_confirmation(&self, confirmation_id: &str, approved: bool) -> bool {
        self.confirmations
            .resolve_confirmation(confirmation_id, approved)
    }

    /// Stops the run. The stream then ends with [`Error::Cancelled`].
    pub fn cancel(&self) {
        self.guard.cancel.cancel();
    }
}

impl Stream for AgentStream {
    type Item = Result<AgentEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.finished {
            return Poll::Ready(None);
        }

        match this.receiver.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(StreamMessage::Event(event))) => Poll::Ready(Some(Ok(event))),
            Poll::Ready(Some(StreamMessage::Done(Ok(result)))) => {
                *this.finished = true;
                *this.result = Some(result);
                Poll::Ready(None)
            }
            Poll::Ready(Some(StreamMessage::Done(Err(e)))) => {
                *this.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                *this.finished = true;
                Poll::Ready(Some(Err(Error::Cancelled)))
            }
        }
    }
}

impl std::fmt::Debug for AgentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentStream")
            .field("finished", &self.finished)
            .field("has_result", &self.result.is_some())
            .finish()
    }
}
