//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod pipeline;
mod runner;
mod variable;

pub use job::JobCommands;
pub use pipeline::PipelineCommands;
pub use runner::RunnerCommands;
pub use variable::VariableCommands;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use colored::*;
use sluice_core::domain::job::{JobStatus, PipelineJob};
use sluice_core::domain::pipeline::PipelineStatus;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Trigger, inspect and cancel pipelines
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Inspect jobs, read logs, release manual jobs
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Runner listing and diagnostics
    Runner {
        #[command(subcommand)]
        command: RunnerCommands,
    },
    /// Repository CI variables
    Variable {
        #[command(subcommand)]
        command: VariableCommands,
    },
}

/// Route a command to its handler module
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command, config).await,
        Commands::Job { command } => job::handle_job_command(command, config).await,
        Commands::Runner { command } => runner::handle_runner_command(command, config).await,
        Commands::Variable { command } => {
            variable::handle_variable_command(command, config).await
        }
    }
}

// =============================================================================
// Shared display helpers
// =============================================================================

fn colorize_pipeline_status(status: PipelineStatus) -> ColoredString {
    let text = status.as_str();
    match status {
        PipelineStatus::Queued => text.dimmed(),
        PipelineStatus::Running => text.blue(),
        PipelineStatus::Succeeded => text.green(),
        PipelineStatus::Failed => text.red(),
        PipelineStatus::Canceled => text.yellow(),
    }
}

fn colorize_job_status(status: JobStatus) -> ColoredString {
    let text = status.as_str();
    match status {
        JobStatus::Queued => text.dimmed(),
        JobStatus::Running => text.blue(),
        JobStatus::Succeeded => text.green(),
        JobStatus::Failed => text.red(),
        JobStatus::Canceled => text.yellow(),
    }
}

/// One line per job: name, status, gating policy
fn print_job_line(job: &PipelineJob) {
    let mut gate = job.when_type.as_str().to_string();
    if job.is_manual && !job.manual_released {
        gate.push_str(", awaiting release");
    }
    if let Some(seconds) = job.start_after_seconds {
        gate.push_str(&format!(", after {}s", seconds));
    }
    if job.allow_failure {
        gate.push_str(", may fail");
    }

    println!(
        "    {} {:<24} {:<10} {}",
        "▸".cyan(),
        job.name.bold(),
        colorize_job_status(job.status),
        format!("({})", gate).dimmed()
    );
    println!("      ID: {}", job.id.to_string().dimmed());
}

/// `2024-01-31 12:00:00`, or `-` when unset
fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
