//! # MNS Worker CLI
//!
//! Command-line front end for the `mns-queue` worker runtime.
//!
//! This module provides CLI commands for:
//! - Draining a queue once (`run`) or consuming it until stopped (`listen`)
//! - Publishing a message (`send`)
//! - Inspecting queue attributes (`info`)
//! - Querying a message's delivery status (`status`, always unsupported on MNS)
//!
//! Each message is handled by an external command, see [`command_handler`].

pub mod command_handler;
pub mod config;
pub mod logging;
pub mod signals;

use clap::{Parser, Subcommand};
use command_handler::CommandHandler;
use config::{ConfigError, WorkerSettings};
use mns_queue::{
    HandlerError, MnsQueue, Priority, QueueAttributes, QueueTransportError, RunMode, SendOptions,
    ShutdownSignal, UnsupportedOperationError, WorkerError, WorkerRunner,
};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::info;

// ============================================================================
// CLI Structure
// ============================================================================

/// MNS worker - consume Aliyun MNS queues with an external job handler
#[derive(Parser, Debug)]
#[command(name = "mns-worker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Polling worker for Aliyun Message Service queues")]
#[command(
    long_about = "Reserves messages from an MNS queue, runs a command for each one and deletes \
                  the message when the command exits successfully"
)]
pub struct Cli {
    /// Configuration file path (TOML or YAML)
    #[arg(short, long, env = "MNS_WORKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level; overrides logging.level from the configuration
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process messages until the queue is empty, then exit
    Run(WorkerArgs),

    /// Process messages until interrupted
    Listen(WorkerArgs),

    /// Publish a message
    Send {
        /// Message body; read from stdin when omitted
        body: Option<String>,

        /// Seconds before the message becomes visible
        #[arg(short, long, default_value = "0")]
        delay: u32,

        /// Priority from 1 (highest) to 16 (lowest)
        #[arg(short, long, default_value = "8")]
        priority: u8,
    },

    /// Show queue attributes
    Info {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the delivery status of a message
    Status {
        /// Message ID to look up
        message_id: String,
    },
}

/// Options shared by `run` and `listen`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct WorkerArgs {
    /// Long-poll wait per receive in seconds (0-30)
    #[arg(short, long)]
    pub wait: Option<u32>,

    /// Handler command and its arguments; overrides handler.command
    #[arg(last = true)]
    pub exec: Vec<String>,
}

/// Output format options
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Queue transport error: {0}")]
    Transport(#[from] QueueTransportError),

    #[error("Job handler failed: {0}")]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedOperationError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Transport(_) => 2,
            Self::Handler(_) => 3,
            Self::Unsupported(_) | Self::InvalidArgument { .. } => 4,
            Self::Io(_) | Self::Output(_) => 5,
        }
    }
}

impl From<WorkerError> for CliError {
    fn from(error: WorkerError) -> Self {
        match error {
            WorkerError::Configuration(e) => Self::Configuration(ConfigError::Validation(e)),
            WorkerError::Transport(e) => Self::Transport(e),
            WorkerError::Unsupported(e) => Self::Unsupported(e),
            WorkerError::Handler(e) => Self::Handler(e),
            WorkerError::InvalidArgument { arg, message } => Self::InvalidArgument { arg, message },
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    run(Cli::parse()).await
}

/// Execute a parsed command line
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = WorkerSettings::load(cli.config.as_deref())?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| settings.logging.level.clone());
    logging::initialize_logging(&level, cli.json_logs || settings.logging.json);

    match cli.command {
        Commands::Run(args) => execute_worker_command(&settings, RunMode::Once, args).await,
        Commands::Listen(args) => execute_worker_command(&settings, RunMode::Listen, args).await,
        Commands::Send {
            body,
            delay,
            priority,
        } => execute_send_command(&settings, body, delay, priority).await,
        Commands::Info { format } => execute_info_command(&settings, format).await,
        Commands::Status { message_id } => execute_status_command(&settings, &message_id),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Execute run or listen
async fn execute_worker_command(
    settings: &WorkerSettings,
    mode: RunMode,
    args: WorkerArgs,
) -> Result<(), CliError> {
    let queue = MnsQueue::connect(&settings.queue)?;
    let wait = settings.wait_seconds(args.wait)?;
    let handler = CommandHandler::new(settings.handler_command(args.exec)?)?;

    info!(
        queue = %queue.queue_name(),
        mode = ?mode,
        wait = ?wait,
        handler = %handler.program(),
        "Starting worker"
    );

    let shutdown = ShutdownSignal::new();
    let signals = signals::install(shutdown.clone())?;

    let runner = WorkerRunner::new(queue).with_continuation(shutdown.predicate());
    let result = runner.run(&handler, mode, wait).await;
    signals.abort();

    result?;
    Ok(())
}

/// Execute send command
async fn execute_send_command(
    settings: &WorkerSettings,
    body: Option<String>,
    delay: u32,
    priority: u8,
) -> Result<(), CliError> {
    let priority = Priority::new(priority).map_err(|e| CliError::InvalidArgument {
        arg: "priority".to_string(),
        message: e.to_string(),
    })?;
    let options = SendOptions::new().with_delay(delay).with_priority(priority);
    options.validate().map_err(|e| CliError::InvalidArgument {
        arg: "delay".to_string(),
        message: e.to_string(),
    })?;

    let queue = MnsQueue::connect(&settings.queue)?;

    let body = match body {
        Some(body) => body.into_bytes(),
        None => {
            let mut buffer = Vec::new();
            tokio::io::stdin().read_to_end(&mut buffer).await?;
            buffer
        }
    };

    let message_id = queue.publish(&body, &options).await?;
    println!("{}", message_id);

    Ok(())
}

/// Execute info command
async fn execute_info_command(
    settings: &WorkerSettings,
    format: OutputFormat,
) -> Result<(), CliError> {
    let queue = MnsQueue::connect(&settings.queue)?;
    let attributes = queue.query_attributes().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&attributes)?),
        OutputFormat::Text => print!("{}", format_attributes(&attributes)),
    }

    Ok(())
}

/// Execute status command
fn execute_status_command(settings: &WorkerSettings, message_id: &str) -> Result<(), CliError> {
    let queue = MnsQueue::connect(&settings.queue)?;
    let runner = WorkerRunner::new(queue);

    let status = runner.status(message_id)?;
    println!("{:?}", status);

    Ok(())
}

/// Render queue attributes for a terminal
fn format_attributes(attributes: &QueueAttributes) -> String {
    let rows = [
        ("Queue", attributes.queue_name.clone()),
        ("Active messages", attributes.active_messages.to_string()),
        ("Inactive messages", attributes.inactive_messages.to_string()),
        ("Delayed messages", attributes.delay_messages.to_string()),
        (
            "Visibility timeout",
            format!("{}s", attributes.visibility_timeout),
        ),
        (
            "Polling wait",
            format!("{}s", attributes.polling_wait_seconds),
        ),
        ("Delay", format!("{}s", attributes.delay_seconds)),
        (
            "Max message size",
            format!("{} bytes", attributes.maximum_message_size),
        ),
        (
            "Retention period",
            format!("{}s", attributes.message_retention_period),
        ),
        ("Logging enabled", attributes.logging_enabled.to_string()),
    ];

    rows.iter()
        .map(|(label, value)| format!("{:<20}{}\n", format!("{}:", label), value))
        .collect()
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
