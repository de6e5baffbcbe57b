//! Transport adapter between the consumption loop and an MNS queue.
//!
//! [`MnsQueue`] owns one [`QueueService`] handle, built eagerly when the adapter
//! is constructed, and turns the raw primitives into worker-level operations:
//!
//! - an empty queue becomes `Ok(None)` instead of an error
//! - bodies are base64 encoded and decoded when the configuration asks for it
//! - every other failure surfaces as a [`QueueTransportError`]

use crate::client::{MnsClient, QueueRef, QueueService};
use crate::config::QueueConfig;
use crate::error::{ConfigurationError, QueueTransportError, UnsupportedOperationError, WorkerError};
use crate::message::{
    elapsed_seconds, DeliveryStatus, Message, MessageId, QueueAttributes, ReceiptHandle,
    SendMessageRequest, SendOptions, WaitSeconds,
};
use crate::worker::QueueSource;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, instrument, trace};

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;

/// Name used when reporting capabilities this transport lacks
const TRANSPORT_NAME: &str = "MNS";

/// Worker-facing view of a single MNS queue
#[derive(Debug)]
pub struct MnsQueue<S = QueueRef> {
    service: S,
    queue_name: String,
    base64: bool,
}

impl MnsQueue<QueueRef> {
    /// Validate the configuration and build the HTTP client and queue handle
    ///
    /// # Errors
    ///
    /// [`WorkerError::Configuration`] when a required setting is empty or
    /// malformed. Nothing is sent over the network either way.
    pub fn connect(config: &QueueConfig) -> Result<Self, WorkerError> {
        config.validate()?;

        let client = MnsClient::new(config)?;
        let service = client.queue_ref(&config.queue_name);

        Ok(Self {
            service,
            queue_name: config.queue_name.clone(),
            base64: config.base64,
        })
    }
}

impl<S: QueueService> MnsQueue<S> {
    /// Wrap an already constructed queue service
    ///
    /// The configuration is validated first; an invalid one never reaches
    /// `service`.
    pub fn with_service(config: &QueueConfig, service: S) -> Result<Self, ConfigurationError> {
        config.validate()?;

        Ok(Self {
            service,
            queue_name: config.queue_name.clone(),
            base64: config.base64,
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Receive the next message, or `None` when the queue is empty
    ///
    /// `attempt` is the time in seconds since the message was first enqueued,
    /// not a delivery count. `ttr` is always zero.
    #[instrument(skip(self), fields(queue = %self.queue_name))]
    pub async fn reserve(
        &self,
        wait: Option<WaitSeconds>,
    ) -> Result<Option<Message>, QueueTransportError> {
        let received = match self.service.receive_message(wait).await {
            Ok(received) => received,
            Err(e) if e.is_message_not_exist() => {
                trace!("No message available");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let body = self.decode_body(&received.body)?;
        let attempt = elapsed_seconds(received.enqueue_time, Utc::now());

        debug!(
            message_id = %received.message_id,
            attempt = attempt,
            dequeue_count = ?received.dequeue_count,
            "Reserved message"
        );

        Ok(Some(Message {
            id: received.message_id,
            body,
            receipt_handle: received.receipt_handle,
            enqueue_time: received.enqueue_time,
            ttr: 0,
            attempt,
            dequeue_count: received.dequeue_count,
        }))
    }

    /// Delete a delivery; `true` when the service confirms it
    pub async fn acknowledge(&self, receipt: &ReceiptHandle) -> Result<bool, QueueTransportError> {
        self.service.delete_message(receipt).await
    }

    /// Send a new message and return the id the service assigned
    ///
    /// `options.ttr` has no MNS counterpart and is not transmitted.
    ///
    /// # Errors
    ///
    /// - [`WorkerError::Configuration`] for out-of-range send options
    /// - [`WorkerError::InvalidArgument`] for a non-UTF-8 body when base64 is off
    /// - [`WorkerError::Transport`] when the service rejects the message
    pub async fn publish(&self, body: &[u8], options: &SendOptions) -> Result<MessageId, WorkerError> {
        options.validate()?;

        let request = SendMessageRequest {
            body: self.encode_body(body)?,
            delay_seconds: options.delay_seconds,
            priority: options.priority.value(),
        };

        let message_id = self.service.send_message(&request).await?;
        debug!(
            message_id = %message_id,
            queue = %self.queue_name,
            delay_seconds = options.delay_seconds,
            "Published message"
        );

        Ok(message_id)
    }

    /// Fetch queue-level metadata such as depth and default visibility
    pub async fn query_attributes(&self) -> Result<QueueAttributes, QueueTransportError> {
        self.service.get_attributes().await
    }

    /// Per-message delivery status; MNS cannot report it, so this always fails
    pub fn query_status(&self, _id: &str) -> Result<DeliveryStatus, UnsupportedOperationError> {
        Err(UnsupportedOperationError {
            operation: "status",
            transport: TRANSPORT_NAME,
        })
    }

    fn decode_body(&self, wire: &str) -> Result<Bytes, QueueTransportError> {
        if !self.base64 {
            return Ok(Bytes::copy_from_slice(wire.as_bytes()));
        }

        STANDARD
            .decode(wire.trim())
            .map(Bytes::from)
            .map_err(|e| {
                QueueTransportError::malformed(format!("Message body is not valid base64: {}", e))
                    .with_source(e)
            })
    }

    fn encode_body(&self, body: &[u8]) -> Result<String, WorkerError> {
        if self.base64 {
            return Ok(STANDARD.encode(body));
        }

        String::from_utf8(body.to_vec()).map_err(|_| WorkerError::InvalidArgument {
            arg: "body".to_string(),
            message: "binary message bodies require base64 encoding to be enabled".to_string(),
        })
    }
}

#[async_trait]
impl<S: QueueService> QueueSource for MnsQueue<S> {
    async fn reserve(&self, wait: Option<WaitSeconds>) -> Result<Option<Message>, QueueTransportError> {
        MnsQueue::reserve(self, wait).await
    }

    async fn acknowledge(&self, receipt: &ReceiptHandle) -> Result<bool, QueueTransportError> {
        MnsQueue::acknowledge(self, receipt).await
    }

    fn status(&self, id: &str) -> Result<DeliveryStatus, UnsupportedOperationError> {
        self.query_status(id)
    }
}
