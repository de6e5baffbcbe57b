//! Error types for queue worker operations.

use std::error::Error as StdError;
use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Every way a worker operation can fail
///
/// An empty queue is not represented here. It is the `Ok(None)` result of a
/// reserve call.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Queue transport error: {0}")]
    Transport(#[from] QueueTransportError),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedOperationError),

    #[error("Job handler failed: {0}")]
    Handler(#[from] HandlerError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },
}

impl WorkerError {
    /// Check if a restart of the worker could succeed without operator action
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Configuration(_) => false,
            Self::Transport(e) => e.is_transient(),
            Self::Unsupported(_) => false,
            Self::Handler(_) | Self::InvalidArgument { .. } => false,
        }
    }
}

/// Configuration errors, raised before any network I/O takes place
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

impl ConfigurationError {
    pub(crate) fn missing(key: &str) -> Self {
        Self::Missing {
            key: key.to_string(),
        }
    }

    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Failure reported by, or while talking to, the remote queue service
///
/// Keeps the service's error code and message intact so callers and logs see
/// exactly what MNS said.
#[derive(Debug, Error)]
#[error("{code} - {message}")]
pub struct QueueTransportError {
    code: String,
    message: String,
    request_id: Option<String>,
    status: Option<u16>,
    #[source]
    source: Option<BoxError>,
}

impl QueueTransportError {
    /// Service code for "no message is currently available"
    pub const MESSAGE_NOT_EXIST: &'static str = "MessageNotExist";

    /// Code used when the request never produced a service response
    pub const NETWORK_ERROR: &'static str = "NetworkError";

    /// Code used when a response could not be understood
    pub const MALFORMED_RESPONSE: &'static str = "MalformedResponse";

    /// Code used when an error response carried no code of its own
    pub const UNKNOWN_ERROR: &'static str = "UnknownError";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            request_id: None,
            status: None,
            source: None,
        }
    }

    pub fn network(message: impl Into<String>, source: reqwest::Error) -> Self {
        Self::new(Self::NETWORK_ERROR, message).with_source(source)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(Self::MALFORMED_RESPONSE, message)
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Whether the service reported an empty queue
    pub fn is_message_not_exist(&self) -> bool {
        self.code == Self::MESSAGE_NOT_EXIST
    }

    /// Check if error is transient and a later attempt may succeed
    pub fn is_transient(&self) -> bool {
        match self.code.as_str() {
            Self::NETWORK_ERROR => true,
            "InternalError" | "ServiceUnavailable" | "TimeExpired" => true,
            _ => matches!(self.status, Some(s) if s >= 500),
        }
    }
}

/// A capability the transport does not offer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Operation '{operation}' is not supported by the {transport} transport")]
pub struct UnsupportedOperationError {
    pub operation: &'static str,
    pub transport: &'static str,
}

/// Failure raised by a job handler
///
/// Distinct from a handler returning `false`: an error aborts the worker loop.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
