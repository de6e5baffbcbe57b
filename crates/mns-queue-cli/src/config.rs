//! Worker settings, loaded from an optional file and the environment.
//!
//! Sources are applied in order, later ones overriding earlier ones:
//!
//! 1. The file given by `--config` or `MNS_WORKER_CONFIG` (format from the
//!    extension, TOML or YAML)
//! 2. Environment variables prefixed `MNS_WORKER__` with `__` between keys,
//!    e.g. `MNS_WORKER__QUEUE__SECRET_KEY` sets `queue.secret_key`
//!
//! Command-line flags are applied on top by the caller.

use mns_queue::{ConfigurationError, QueueConfig, WaitSeconds};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "MNS_WORKER";

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("{0}")]
    Validation(#[from] ConfigurationError),

    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },
}

/// Everything the worker binary reads from its configuration sources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub queue: QueueConfig,
    pub worker: WorkerSection,
    pub handler: HandlerSection,
    pub logging: LoggingSection,
}

/// Consumption loop settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    /// Long-poll wait per receive; unset uses the queue's own polling wait
    pub wait_seconds: Option<u32>,
}

/// External command run once per message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerSection {
    /// Program and arguments
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl WorkerSettings {
    /// Load settings from `path` (if any) and the environment
    ///
    /// Nothing is validated here beyond types; see [`QueueConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(" ")
                    .with_list_parse_key("handler.command"),
            )
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// Long-poll wait, with `override_seconds` taking precedence
    pub fn wait_seconds(
        &self,
        override_seconds: Option<u32>,
    ) -> Result<Option<WaitSeconds>, ConfigError> {
        override_seconds
            .or(self.worker.wait_seconds)
            .map(WaitSeconds::new)
            .transpose()
            .map_err(ConfigError::from)
    }

    /// Handler command, with a non-empty `override_argv` taking precedence
    pub fn handler_command(&self, override_argv: Vec<String>) -> Result<Vec<String>, ConfigError> {
        let argv = if override_argv.is_empty() {
            self.handler.command.clone()
        } else {
            override_argv
        };

        if argv.first().map_or(true, |program| program.trim().is_empty()) {
            return Err(ConfigError::MissingRequired {
                key: "handler.command".to_string(),
            });
        }

        Ok(argv)
    }
}
