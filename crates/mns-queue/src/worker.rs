//! The consumption loop.
//!
//! A [`WorkerRunner`] repeatedly reserves a message from a [`QueueSource`],
//! hands it to a [`JobHandler`] and deletes it when the handler reports
//! success. Reserve, handle and acknowledge never overlap: one runner is one
//! sequential consumer. Parallelism comes from running more workers.
//!
//! ```text
//! Polling ──message──▶ Handling ──true──▶ Acknowledging ──▶ Polling
//!    │                     └──false─────────────────────────▶ Polling
//!    └──empty──▶ Idle ──listen──▶ Polling
//!                  └──once────▶ Terminated
//! ```
//!
//! The continuation predicate is consulted before every poll and is the only
//! way to stop a listening worker. An in-flight long poll or handler call is
//! never interrupted.

use crate::error::{QueueTransportError, UnsupportedOperationError, WorkerError};
use crate::handler::JobHandler;
use crate::message::{DeliveryStatus, Message, ReceiptHandle, WaitSeconds};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;

/// Queue capabilities the consumption loop depends on
#[async_trait]
pub trait QueueSource: Send + Sync {
    /// Reserve the next message; `Ok(None)` means the queue is empty
    async fn reserve(&self, wait: Option<WaitSeconds>)
        -> Result<Option<Message>, QueueTransportError>;

    /// Delete a reserved message; `true` when the transport confirms it
    async fn acknowledge(&self, receipt: &ReceiptHandle) -> Result<bool, QueueTransportError>;

    /// Delivery status of a pushed message
    fn status(&self, id: &str) -> Result<DeliveryStatus, UnsupportedOperationError>;
}

/// What the loop does when the queue reports empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Drain the current backlog and stop
    Once,
    /// Keep polling until the continuation predicate says stop
    Listen,
}

impl RunMode {
    pub fn from_repeat(repeat: bool) -> Self {
        if repeat {
            Self::Listen
        } else {
            Self::Once
        }
    }

    pub fn repeats(&self) -> bool {
        matches!(self, Self::Listen)
    }
}

/// Why a run ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The queue reported empty in run-once mode
    Drained,
    /// The continuation predicate asked the loop to stop
    Cancelled,
}

/// Counters for one invocation of [`WorkerRunner::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Messages reserved and passed to the handler
    pub received: u64,
    /// Messages the handler accepted and the service confirmed deleting
    pub acknowledged: u64,
    /// Messages the handler declined, left for redelivery
    pub released: u64,
    /// Messages the handler accepted but the service did not confirm deleting
    pub failed_deletes: u64,
    pub stop_reason: StopReason,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            received: 0,
            acknowledged: 0,
            released: 0,
            failed_deletes: 0,
            stop_reason: StopReason::Drained,
        }
    }
}

type ContinuationFn = dyn Fn() -> bool + Send + Sync;

/// Sequential worker driving one [`QueueSource`]
pub struct WorkerRunner<Q> {
    source: Q,
    can_continue: Arc<ContinuationFn>,
}

impl<Q: QueueSource> WorkerRunner<Q> {
    /// Create a runner that only stops on its own (empty queue or error)
    pub fn new(source: Q) -> Self {
        Self {
            source,
            can_continue: Arc::new(|| true),
        }
    }

    /// Replace the continuation predicate checked before every poll
    pub fn with_continuation<F>(mut self, can_continue: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.can_continue = Arc::new(can_continue);
        self
    }

    pub fn source(&self) -> &Q {
        &self.source
    }

    /// Drain the backlog; stops at the first empty poll
    pub async fn action_run(
        &self,
        handler: &dyn JobHandler,
        wait: Option<WaitSeconds>,
    ) -> Result<RunSummary, WorkerError> {
        self.run(handler, RunMode::Once, wait).await
    }

    /// Poll until cancelled
    pub async fn action_listen(
        &self,
        handler: &dyn JobHandler,
        wait: Option<WaitSeconds>,
    ) -> Result<RunSummary, WorkerError> {
        self.run(handler, RunMode::Listen, wait).await
    }

    /// Run the consumption loop
    ///
    /// # Errors
    ///
    /// - [`WorkerError::Transport`] if a reserve or acknowledge call fails
    /// - [`WorkerError::Handler`] if the handler returns an error
    ///
    /// Either error ends the run immediately. The message being handled at
    /// the time is left unacknowledged.
    #[instrument(skip(self, handler))]
    pub async fn run(
        &self,
        handler: &dyn JobHandler,
        mode: RunMode,
        wait: Option<WaitSeconds>,
    ) -> Result<RunSummary, WorkerError> {
        info!("Worker started");
        let mut summary = RunSummary::new();

        loop {
            if !(self.can_continue)() {
                summary.stop_reason = StopReason::Cancelled;
                break;
            }

            let message = match self.source.reserve(wait).await? {
                Some(message) => message,
                None if mode.repeats() => {
                    trace!("Queue empty, polling again");
                    continue;
                }
                None => {
                    summary.stop_reason = StopReason::Drained;
                    break;
                }
            };

            summary.received += 1;
            self.process(handler, &message, &mut summary).await?;
        }

        info!(
            received = summary.received,
            acknowledged = summary.acknowledged,
            released = summary.released,
            failed_deletes = summary.failed_deletes,
            stop_reason = ?summary.stop_reason,
            "Worker stopped"
        );

        Ok(summary)
    }

    async fn process(
        &self,
        handler: &dyn JobHandler,
        message: &Message,
        summary: &mut RunSummary,
    ) -> Result<(), WorkerError> {
        debug!(
            message_id = %message.id,
            attempt = message.attempt,
            "Handling message"
        );

        if !handler.handle(&message.job()).await? {
            debug!(message_id = %message.id, "Handler declined message, leaving it for redelivery");
            summary.released += 1;
            return Ok(());
        }

        if self.source.acknowledge(message.receipt_handle()).await? {
            summary.acknowledged += 1;
        } else {
            warn!(message_id = %message.id, "Delete was not confirmed by the queue service");
            summary.failed_deletes += 1;
        }

        Ok(())
    }

    /// Delivery status of a message; fails for every id with this transport
    pub fn status(&self, id: &str) -> Result<DeliveryStatus, WorkerError> {
        Ok(self.source.status(id)?)
    }
}
