//! Queue connection settings.
//!
//! A [`QueueConfig`] is validated before any client is built, so a worker with
//! an incomplete configuration fails before it touches the network.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Longest queue name MNS accepts
const MAX_QUEUE_NAME_LENGTH: usize = 120;

/// Connection settings for one MNS queue
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Account endpoint, e.g. `https://123456.mns.cn-hangzhou.aliyuncs.com`
    pub endpoint: String,

    /// AccessKey ID used to sign requests
    pub access_key: String,

    /// AccessKey secret used to sign requests
    pub secret_key: SecretKey,

    /// Name of the queue to consume from and publish to
    pub queue_name: String,

    /// Whether message bodies are base64 encoded on the wire
    pub base64: bool,
}

impl QueueConfig {
    pub fn new(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        queue_name: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: SecretKey::new(secret_key.into()),
            queue_name: queue_name.into(),
            base64: false,
        }
    }

    /// Enable or disable base64 body encoding
    pub fn with_base64(mut self, base64: bool) -> Self {
        self.base64 = base64;
        self
    }

    /// Validate configuration
    ///
    /// Checks, in order:
    /// - endpoint, access key, secret key and queue name are non-empty
    /// - endpoint is an absolute `http` or `https` URL without query or fragment
    /// - queue name only uses ASCII letters, digits and hyphens, starts with a
    ///   letter and fits the service's length limit
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let required = [
            ("endpoint", self.endpoint.as_str()),
            ("access_key", self.access_key.as_str()),
            ("secret_key", self.secret_key.expose()),
            ("queue_name", self.queue_name.as_str()),
        ];

        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigurationError::missing(key));
            }
        }

        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| ConfigurationError::invalid("endpoint", e.to_string()))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigurationError::invalid(
                "endpoint",
                format!("unsupported scheme '{}'", endpoint.scheme()),
            ));
        }
        if endpoint.query().is_some() || endpoint.fragment().is_some() {
            return Err(ConfigurationError::invalid(
                "endpoint",
                "must not carry a query string or fragment",
            ));
        }

        let name = &self.queue_name;
        if name.len() > MAX_QUEUE_NAME_LENGTH {
            return Err(ConfigurationError::invalid(
                "queue_name",
                format!("must be at most {} characters", MAX_QUEUE_NAME_LENGTH),
            ));
        }
        if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(ConfigurationError::invalid(
                "queue_name",
                "must start with a letter",
            ));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ConfigurationError::invalid(
                "queue_name",
                "only ASCII letters, digits and hyphens allowed",
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for QueueConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key)
            .field("queue_name", &self.queue_name)
            .field("base64", &self.base64)
            .finish()
    }
}

/// AccessKey secret, wiped from memory on drop and never printed
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Get the secret for signing; do not store or log the result
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecretKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretKey {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

// Shown configurations never contain the secret itself.
impl Serialize for SecretKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.0.is_empty() {
            serializer.serialize_str("")
        } else {
            serializer.serialize_str("[REDACTED]")
        }
    }
}
