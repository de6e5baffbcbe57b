//! Runs each job in a child process.
//!
//! The message body is written to the child's stdin and the job metadata is
//! passed in the environment:
//!
//! | Variable              | Value                                   |
//! |-----------------------|-----------------------------------------|
//! | `MNS_MESSAGE_ID`      | message id                              |
//! | `MNS_MESSAGE_TTR`     | time-to-run, always `0`                 |
//! | `MNS_MESSAGE_ATTEMPT` | seconds since enqueue, three decimals   |
//!
//! Exit status 0 acknowledges the message. Any other status leaves it for
//! redelivery.

use crate::config::ConfigError;
use async_trait::async_trait;
use mns_queue::{HandlerError, Job, JobHandler};
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

#[cfg(test)]
#[path = "command_handler_tests.rs"]
mod tests;

pub const MESSAGE_ID_VAR: &str = "MNS_MESSAGE_ID";
pub const MESSAGE_TTR_VAR: &str = "MNS_MESSAGE_TTR";
pub const MESSAGE_ATTEMPT_VAR: &str = "MNS_MESSAGE_ATTEMPT";

/// Job handler backed by an external program
#[derive(Debug, Clone)]
pub struct CommandHandler {
    program: String,
    args: Vec<String>,
}

impl CommandHandler {
    /// Build a handler from a program and its arguments
    pub fn new(argv: Vec<String>) -> Result<Self, ConfigError> {
        let mut argv = argv.into_iter();
        let program = argv
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "handler.command".to_string(),
            })?;

        Ok(Self {
            program,
            args: argv.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl JobHandler for CommandHandler {
    async fn handle(&self, job: &Job) -> Result<bool, HandlerError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(MESSAGE_ID_VAR, job.id.as_str())
            .env(MESSAGE_TTR_VAR, job.ttr.to_string())
            .env(MESSAGE_ATTEMPT_VAR, format!("{:.3}", job.attempt))
            .stdin(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                HandlerError::with_source(format!("Failed to start '{}'", self.program), e)
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&job.body).await {
                Ok(()) => {}
                // The child exited or closed stdin without reading the body.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!(message_id = %job.id, "Handler did not read the message body");
                }
                Err(e) => {
                    return Err(HandlerError::with_source(
                        format!("Failed to write message body to '{}'", self.program),
                        e,
                    ));
                }
            }
        }

        let status = child.wait().await.map_err(|e| {
            HandlerError::with_source(format!("Failed to wait for '{}'", self.program), e)
        })?;

        if status.success() {
            debug!(message_id = %job.id, "Handler succeeded");
        } else {
            warn!(message_id = %job.id, status = %status, "Handler failed");
        }

        Ok(status.success())
    }
}
