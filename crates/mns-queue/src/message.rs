//! Message types for queue operations including core domain identifiers.

use crate::error::ConfigurationError;
use crate::handler::Job;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Identifier MNS assigns to a message
///
/// Unique per delivery; a redelivered message may not keep its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MessageId(String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ConfigurationError::missing("message_id"));
        }

        Ok(Self(s.to_string()))
    }
}

/// One-delivery token needed to delete a received message
///
/// Becomes invalid once the visibility window lapses or after the first
/// successful delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Long-poll wait for a receive call, bounded by the service's 30 second limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WaitSeconds(u8);

impl WaitSeconds {
    pub const MAX: u8 = 30;

    pub fn new(seconds: u32) -> Result<Self, ConfigurationError> {
        if seconds > Self::MAX as u32 {
            return Err(ConfigurationError::invalid(
                "wait_seconds",
                format!("must be between 0 and {}", Self::MAX),
            ));
        }

        Ok(Self(seconds as u8))
    }

    pub fn as_secs(&self) -> u64 {
        self.0 as u64
    }
}

impl fmt::Display for WaitSeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Message priority, 1 (highest) through 16 (lowest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: u8 = 1;
    pub const LOWEST: u8 = 16;

    pub fn new(priority: u8) -> Result<Self, ConfigurationError> {
        if !(Self::HIGHEST..=Self::LOWEST).contains(&priority) {
            return Err(ConfigurationError::invalid(
                "priority",
                format!("must be between {} and {}", Self::HIGHEST, Self::LOWEST),
            ));
        }

        Ok(Self(priority))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(8)
    }
}

// ============================================================================
// Received Messages
// ============================================================================

/// A message exactly as the receive primitive returned it
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub receipt_handle: ReceiptHandle,
    /// Body as sent over the wire, before any base64 decoding
    pub body: String,
    /// When the service first accepted the message, in ms since the epoch
    pub enqueue_time: i64,
    pub next_visible_time: Option<i64>,
    pub first_dequeue_time: Option<i64>,
    pub dequeue_count: Option<u32>,
    pub priority: Option<u8>,
}

/// A reserved message ready to be handed to a job handler
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub body: Bytes,
    pub receipt_handle: ReceiptHandle,
    /// When the service first accepted the message, in ms since the epoch
    pub enqueue_time: i64,
    /// Always zero: MNS does not expose the visibility timeout on receive
    pub ttr: u32,
    /// Seconds since `enqueue_time`, rounded to milliseconds
    ///
    /// Despite the name this is not a delivery counter. It measures how long
    /// the message has been outstanding; see [`Message::dequeue_count`] for the
    /// service's own count.
    pub attempt: f64,
    pub dequeue_count: Option<u32>,
}

impl Message {
    /// Build the handler-facing view of this message
    pub fn job(&self) -> Job {
        Job {
            id: self.id.clone(),
            body: self.body.clone(),
            ttr: self.ttr,
            attempt: self.attempt,
        }
    }

    pub fn receipt_handle(&self) -> &ReceiptHandle {
        &self.receipt_handle
    }
}

/// Seconds between `enqueue_time_ms` and `now`, rounded to three decimals
pub fn elapsed_seconds(enqueue_time_ms: i64, now: DateTime<Utc>) -> f64 {
    let now_ms = now.timestamp_micros() as f64 / 1000.0;
    let elapsed = (now_ms - enqueue_time_ms as f64) / 1000.0;
    (elapsed * 1000.0).round() / 1000.0
}

// ============================================================================
// Sending
// ============================================================================

/// Options for publishing a message
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Time-to-run requested by the producer; MNS has no per-message
    /// equivalent so it is not sent
    pub ttr: Option<u32>,
    /// Seconds before the message becomes visible
    pub delay_seconds: u32,
    pub priority: Priority,
}

impl SendOptions {
    /// Longest delay MNS accepts (7 days)
    pub const MAX_DELAY_SECONDS: u32 = 604_800;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttr(mut self, ttr: u32) -> Self {
        self.ttr = Some(ttr);
        self
    }

    pub fn with_delay(mut self, delay_seconds: u32) -> Self {
        self.delay_seconds = delay_seconds;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.delay_seconds > Self::MAX_DELAY_SECONDS {
            return Err(ConfigurationError::invalid(
                "delay_seconds",
                format!("must be at most {}", Self::MAX_DELAY_SECONDS),
            ));
        }

        Ok(())
    }
}

/// Wire-level send request; `body` is already encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub body: String,
    pub delay_seconds: u32,
    pub priority: u8,
}

// ============================================================================
// Queue Metadata
// ============================================================================

/// Queue-level attributes reported by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueAttributes {
    pub queue_name: String,
    /// Seconds since the epoch
    pub create_time: u64,
    /// Seconds since the epoch
    pub last_modify_time: u64,
    pub delay_seconds: u64,
    pub maximum_message_size: u64,
    pub message_retention_period: u64,
    /// Default visibility window for received messages, in seconds
    pub visibility_timeout: u64,
    pub polling_wait_seconds: u64,
    /// Messages currently visible to receivers
    pub active_messages: u64,
    /// Messages received but not yet deleted or expired
    pub inactive_messages: u64,
    pub delay_messages: u64,
    pub logging_enabled: bool,
}

/// Delivery state of a pushed message
///
/// No transport in this crate can report it; the type exists so the status
/// operation has a meaningful signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Waiting,
    Reserved,
    Done,
}
