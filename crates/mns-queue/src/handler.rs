//! The job handler seam.
//!
//! How a message body becomes a job and how that job runs is up to the caller.
//! The worker only needs a yes/no answer per message, or an error when the
//! handler itself is broken.

use crate::error::HandlerError;
use crate::message::MessageId;
use async_trait::async_trait;
use bytes::Bytes;
use std::future::Future;

/// Handler-facing view of a reserved message
#[derive(Debug, Clone)]
pub struct Job {
    pub id: MessageId,
    pub body: Bytes,
    /// Time-to-run; always zero with the MNS transport
    pub ttr: u32,
    /// Seconds elapsed since the message was first enqueued
    pub attempt: f64,
}

impl Job {
    /// Body as text, if it is valid UTF-8
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Executes jobs on behalf of the worker
///
/// Return `Ok(true)` to have the message deleted, `Ok(false)` to leave it for
/// redelivery. An `Err` stops the worker.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<bool, HandlerError>;
}

/// Handler built from an async closure, see [`handler_fn`]
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap an async closure taking a [`Job`] as a [`JobHandler`]
///
/// ```
/// use mns_queue::{handler_fn, HandlerError, Job};
///
/// let handler = handler_fn(|job: Job| async move {
///     Ok::<_, HandlerError>(!job.body.is_empty())
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Job) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, HandlerError>> + Send,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> JobHandler for HandlerFn<F>
where
    F: Fn(Job) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, HandlerError>> + Send,
{
    async fn handle(&self, job: &Job) -> Result<bool, HandlerError> {
        (self.f)(job.clone()).await
    }
}
