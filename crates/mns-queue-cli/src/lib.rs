//! # MNS Queue CLI
//!
//! Command-line interface for inspecting and operating MNS queues.
//!
//! This module provides CLI commands for:
//! - Reporting queue size
//! - Pushing jobs or raw payloads, optionally delayed
//! - Popping a job and deleting or releasing it
//! - Draining a queue
//! - Showing the resolved connection configuration
//!
//! Configuration comes from an optional file (`--config` or
//! `MNS_QUEUE_CONFIG`) layered under `MNS_QUEUE__`-prefixed environment
//! variables, e.g. `MNS_QUEUE__QUEUE=orders`.

use clap::{Parser, Subcommand};
use mns_queue::{
    ConfigurationError, ConnectionConfig, Delay, MnsConnector, MnsJob, MnsQueue, QueueError,
    SendOptions,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// CLI Structure
// ============================================================================

/// MNS queue CLI - Operate Alibaba Cloud MNS queues
#[derive(Parser)]
#[command(name = "mns-queue")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operate Alibaba Cloud MNS queues")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MNS_QUEUE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Queue to use instead of the configured default
    #[arg(short, long, global = true)]
    pub queue: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show the approximate number of messages in the queue
    Size,

    /// Push a job onto the queue
    Push {
        /// Job name, or the message body with --raw
        job: String,

        /// Job data as JSON
        #[arg(short, long, default_value = "null")]
        data: String,

        /// Delay delivery by this many seconds
        #[arg(long, value_name = "SECONDS")]
        delay: Option<u64>,

        /// Send JOB as the message body without wrapping it
        #[arg(long)]
        raw: bool,

        /// Message priority (1-16), raw payloads only
        #[arg(long, requires = "raw")]
        priority: Option<u32>,
    },

    /// Pop one job from the queue
    Pop {
        /// Delete the job after printing it
        #[arg(long, conflicts_with = "release")]
        delete: bool,

        /// Make the job visible again after this many seconds
        #[arg(long, value_name = "SECONDS")]
        release: Option<u32>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete every message in the queue
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the resolved configuration with secrets redacted
    Config {
        /// Output format for configuration
        #[arg(short = 'f', long, default_value = "toml")]
        format: ConfigFormat,
    },
}

/// Output format options
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// Configuration format options
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Output error: {message}")]
    Output { message: String },
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Queue(QueueError::Configuration(_)) => 1,
            Self::Queue(_) => 2,
            Self::InvalidArgument { .. } => 3,
            Self::CommandFailed { .. } => 4,
            Self::Output { .. } => 5,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let config = load_configuration(cli.config.as_deref())?;
    let queue = MnsConnector::connect(&config)?;

    let output = execute_command(&cli, &queue, &config).await?;
    println!("{}", output);
    Ok(())
}

/// Run one parsed command and return what should be printed
pub async fn execute_command(
    cli: &Cli,
    queue: &MnsQueue,
    config: &ConnectionConfig,
) -> Result<String, CliError> {
    let target = cli.queue.as_deref();

    match &cli.command {
        Commands::Size => execute_size_command(queue, target).await,
        Commands::Push {
            job,
            data,
            delay,
            raw,
            priority,
        } => execute_push_command(queue, target, job, data, *delay, *raw, *priority).await,
        Commands::Pop {
            delete,
            release,
            format,
        } => execute_pop_command(queue, target, *delete, *release, format).await,
        Commands::Clear { yes } => execute_clear_command(queue, target, *yes).await,
        Commands::Config { format } => render_config(config, format),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Initialize logging based on CLI arguments
///
/// `RUST_LOG` takes precedence over `--log-level`.
fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "mns_queue={level},mns_queue_cli={level}",
            level = cli.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::CommandFailed {
        message: format!("Failed to initialize logging: {}", e),
    })
}

/// Load configuration from file and environment
fn load_configuration(config_path: Option<&Path>) -> Result<ConnectionConfig, CliError> {
    if let Some(path) = config_path {
        if !path.exists() {
            return Err(ConfigurationError::Invalid {
                message: format!("configuration file not found: {}", path.display()),
            }
            .into());
        }
    }

    Ok(ConnectionConfig::load(config_path)?)
}

async fn execute_size_command(queue: &MnsQueue, target: Option<&str>) -> Result<String, CliError> {
    let size = queue.size(target).await?;
    Ok(size.to_string())
}

async fn execute_push_command(
    queue: &MnsQueue,
    target: Option<&str>,
    job: &str,
    data: &str,
    delay: Option<u64>,
    raw: bool,
    priority: Option<u32>,
) -> Result<String, CliError> {
    let message_id = if raw {
        let mut options = SendOptions::new();
        if let Some(delay) = delay {
            let seconds = u32::try_from(delay).map_err(|_| CliError::InvalidArgument {
                arg: "delay".to_string(),
                message: "must fit in 32 bits".to_string(),
            })?;
            options = options.with_delay_seconds(seconds);
        }
        if let Some(priority) = priority {
            options = options.with_priority(priority);
        }
        queue.push_raw(job, target, &options).await?
    } else {
        let data: Value = serde_json::from_str(data).map_err(|e| CliError::InvalidArgument {
            arg: "data".to_string(),
            message: e.to_string(),
        })?;
        match delay {
            Some(seconds) => queue.later(Delay::Seconds(seconds), job, &data, target).await?,
            None => queue.push(job, &data, target).await?,
        }
    };

    info!(
        queue = %queue.get_queue(target),
        message_id = %message_id,
        "Job pushed"
    );
    Ok(message_id.to_string())
}

async fn execute_pop_command(
    queue: &MnsQueue,
    target: Option<&str>,
    delete: bool,
    release: Option<u32>,
    format: &OutputFormat,
) -> Result<String, CliError> {
    let Some(mut job) = queue.pop(target).await? else {
        return Ok(match format {
            OutputFormat::Text => "Queue empty".to_string(),
            OutputFormat::Json => "null".to_string(),
        });
    };

    if delete {
        job.delete().await?;
    } else if let Some(seconds) = release {
        job.release(seconds).await?;
    }

    render_job(&job, format)
}

async fn execute_clear_command(
    queue: &MnsQueue,
    target: Option<&str>,
    yes: bool,
) -> Result<String, CliError> {
    let name = queue.get_queue(target);
    if !yes {
        return Err(CliError::InvalidArgument {
            arg: "yes".to_string(),
            message: format!("clearing '{}' deletes every message; pass --yes", name),
        });
    }

    warn!(queue = %name, "Clearing queue");
    let cleared = queue.clear(&name).await?;
    Ok(format!("Cleared {} messages from {}", cleared, name))
}

fn render_job(job: &MnsJob, format: &OutputFormat) -> Result<String, CliError> {
    let state = if job.is_deleted() {
        "deleted"
    } else if job.is_released() {
        "released"
    } else {
        "reserved"
    };

    match format {
        OutputFormat::Text => Ok(format!(
            "message_id: {}\nqueue: {}\nattempts: {}\nstate: {}\n\n{}",
            job.job_id(),
            job.queue(),
            job.attempts(),
            state,
            job.raw_body()
        )),
        OutputFormat::Json => {
            let rendered = serde_json::json!({
                "message_id": job.job_id().as_str(),
                "queue": job.queue().as_str(),
                "attempts": job.attempts(),
                "state": state,
                "name": job.name(),
                "body": job.raw_body(),
            });
            serde_json::to_string_pretty(&rendered).map_err(|e| CliError::Output {
                message: e.to_string(),
            })
        }
    }
}

/// Render the configuration with credentials masked
fn render_config(config: &ConnectionConfig, format: &ConfigFormat) -> Result<String, CliError> {
    let mut redacted = config.clone();
    redacted.secret = "<redacted>".to_string();
    redacted.token = redacted.token.map(|_| "<redacted>".to_string());

    match format {
        ConfigFormat::Toml => toml::to_string_pretty(&redacted).map_err(|e| CliError::Output {
            message: e.to_string(),
        }),
        ConfigFormat::Json => {
            serde_json::to_string_pretty(&redacted).map_err(|e| CliError::Output {
                message: e.to_string(),
            })
        }
    }
}
