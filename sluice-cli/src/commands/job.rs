//! Job command handlers
//!
//! Job details, logs and manual release.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use sluice_client::OrchestratorClient;
use sluice_core::domain::job::PipelineJob;
use uuid::Uuid;

use super::{colorize_job_status, format_time};
use crate::config::Config;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Get job details
    Get {
        id: Uuid,

        /// Also print the job environment
        #[arg(long)]
        env: bool,
    },
    /// Print a job's log
    Logs { id: Uuid },
    /// Release a manual job so a runner can pick it up
    Release { id: Uuid },
}

/// Handle job commands
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        JobCommands::Get { id, env } => get_job(&client, id, env).await,
        JobCommands::Logs { id } => show_logs(&client, id).await,
        JobCommands::Release { id } => release_job(&client, id).await,
    }
}

async fn get_job(client: &OrchestratorClient, id: Uuid, show_env: bool) -> Result<()> {
    let job = client.get_job(id).await?;
    print_job_details(&job, show_env);
    Ok(())
}

async fn show_logs(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let logs = client.get_job_logs(id).await?;

    if logs.is_empty() {
        println!("{}", "No logs yet.".yellow());
    } else {
        print!("{}", logs);
        if !logs.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}

async fn release_job(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let released = client.release_job(id).await?;

    println!("{}", format!("✓ Job {} released", released.id).green().bold());
    println!("  Status: {}", colorize_job_status(released.status));
    Ok(())
}

fn print_job_details(job: &PipelineJob, show_env: bool) {
    println!("{}", "Job Details:".bold());
    println!("  ID:        {}", job.id.to_string().cyan());
    println!("  Name:      {}", job.name.bold());
    println!("  Pipeline:  {}", job.pipeline_id);
    println!("  Status:    {}", colorize_job_status(job.status));
    println!("  When:      {}", job.when_type.as_str());
    if let Some(rule) = &job.rule {
        println!("  Rule:      {}", rule.dimmed());
    }
    if job.is_manual {
        println!("  Released:  {}", job.manual_released);
    }
    if let Some(seconds) = job.start_after_seconds {
        println!("  Delay:     {}s", seconds);
    }
    if let Some(image) = &job.image {
        println!("  Image:     {}", image);
    }
    if let Some(code) = job.exit_code {
        println!("  Exit code: {}", code);
    }
    println!("  Created:   {}", format_time(Some(job.created_at)));
    println!("  Started:   {}", format_time(job.started_at));
    println!("  Finished:  {}", format_time(job.finished_at));

    println!("\n{}", "Script:".bold());
    println!("{}", "─".repeat(80).dimmed());
    println!("{}", job.script);
    println!("{}", "─".repeat(80).dimmed());

    if show_env {
        println!("\n{}", "Environment:".bold());
        for (key, value) in job.env.iter() {
            println!("  {}={}", key.cyan(), value);
        }
    }
}
