//! # MNS Queue
//!
//! Polling worker runtime for Aliyun Message Service (MNS) queues with
//! at-least-once delivery.
//!
//! This library provides:
//! - A transport adapter that speaks the MNS REST/XML API directly over HTTP
//! - A sequential consumption loop with run-once and listen modes
//! - Cooperative cancellation checked between loop iterations
//! - A single error taxonomy for configuration, transport, handler and
//!   unsupported-operation failures
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all worker operations
//! - [`config`] - Queue connection settings and their validation
//! - [`message`] - Messages, receipt handles, send options and queue metadata
//! - [`client`] - The MNS HTTP client and the per-queue service handle
//! - [`adapter`] - Translation from raw queue primitives to worker messages
//! - [`handler`] - The job handler seam
//! - [`worker`] - The consumption loop
//! - [`shutdown`] - Continuation flag shared with signal handlers
//!
//! ## Delivery semantics
//!
//! A message is deleted from the queue only after its handler reports success.
//! A handler that reports failure leaves the message to the service, which makes
//! it visible again once its own visibility timeout lapses. Nothing is retried
//! inside the worker.

pub mod adapter;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod shutdown;
pub mod worker;

pub use adapter::MnsQueue;
pub use client::{MnsClient, QueueRef, QueueService};
pub use config::{QueueConfig, SecretKey};
pub use error::{
    ConfigurationError, HandlerError, QueueTransportError, UnsupportedOperationError, WorkerError,
};
pub use handler::{handler_fn, HandlerFn, Job, JobHandler};
pub use message::{
    DeliveryStatus, Message, MessageId, Priority, QueueAttributes, ReceiptHandle,
    ReceivedMessage, SendMessageRequest, SendOptions, WaitSeconds,
};
pub use shutdown::ShutdownSignal;
pub use worker::{QueueSource, RunMode, RunSummary, StopReason, WorkerRunner};
