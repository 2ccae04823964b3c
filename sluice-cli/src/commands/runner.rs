//! Runner command handlers
//!
//! Lists runners, and can perform a single lease poll to check what a runner
//! would receive.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use sluice_client::{LeaseRequest, OrchestratorClient};
use sluice_core::domain::runner::RunnerStatus;
use sluice_core::dto::runner::RunnerSummary;

use super::format_time;
use crate::config::Config;

/// Runner subcommands
#[derive(Subcommand)]
pub enum RunnerCommands {
    /// List all known runners
    List,
    /// Poll once for a job, as a runner would; the job is really leased
    Lease {
        /// Runner token
        #[arg(long, env = "SLUICE_RUNNER_TOKEN")]
        token: Option<String>,

        /// Runner name reported with the poll
        #[arg(long)]
        name: Option<String>,

        /// Capability tags (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
}

/// Handle runner commands
pub async fn handle_runner_command(command: RunnerCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        RunnerCommands::List => list_runners(&client).await,
        RunnerCommands::Lease { token, name, tags } => {
            let client = match token {
                Some(token) => client.with_token(token),
                None => client,
            };
            lease_once(&client, LeaseRequest { name, tags }).await
        }
    }
}

async fn list_runners(client: &OrchestratorClient) -> Result<()> {
    let runners = client.list_runners().await?;

    if runners.is_empty() {
        println!("{}", "No runners have polled yet.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} runner(s):", runners.len()).bold());
    println!();
    for runner in &runners {
        print_runner_summary(runner);
    }

    Ok(())
}

async fn lease_once(client: &OrchestratorClient, req: LeaseRequest) -> Result<()> {
    let lease = client.lease_job(&req).await?;

    let Some(job_id) = lease.job_id else {
        println!("{}", "No job available.".yellow());
        return Ok(());
    };

    println!("{}", format!("✓ Leased job {}", job_id).green().bold());
    if let Some(image) = &lease.image {
        println!("  Image:  {}", image);
    }
    if let Some(timeout) = lease.timeout_seconds {
        println!("  Timeout: {}s", timeout);
    }
    if let Some(script) = &lease.script {
        println!("  Script:");
        for line in script.lines() {
            println!("    {}", line.dimmed());
        }
    }

    Ok(())
}

fn print_runner_summary(runner: &RunnerSummary) {
    let name = if runner.name.is_empty() {
        "(unnamed)".to_string()
    } else {
        runner.name.clone()
    };

    println!("  {} {} {}", "▸".cyan(), name.bold(), colorize_status(runner.status));
    println!("    ID:        {}", runner.id.to_string().dimmed());
    if !runner.tags.is_empty() {
        println!("    Tags:      {}", runner.tags.join(", "));
    }
    println!(
        "    Last Seen: {}",
        format_time(runner.last_heartbeat_at).dimmed()
    );
    println!();
}

fn colorize_status(status: RunnerStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        RunnerStatus::Online => text.green(),
        RunnerStatus::Offline => text.red(),
    }
}
