//! Pipeline command handlers
//!
//! Trigger, inspect, list and cancel pipelines.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use sluice_client::OrchestratorClient;
use sluice_core::domain::pipeline::{Pipeline, PipelineSource};
use sluice_core::dto::pipeline::TriggerPipeline;
use uuid::Uuid;

use super::{colorize_pipeline_status, format_time, print_job_line};
use crate::config::Config;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Trigger a pipeline from the repository's definition file
    Trigger {
        /// Repository ID
        #[arg(short, long)]
        repo: Uuid,

        /// Branch or ref; the orchestrator's default branch when omitted
        #[arg(long = "ref")]
        ref_name: Option<String>,

        /// Commit SHA to read the definition at
        #[arg(long)]
        sha: Option<String>,

        /// Trigger source: push, manual, schedule or webhook
        #[arg(long, default_value = "manual")]
        source: PipelineSource,

        /// Changed paths exposed to rules as CI_CHANGED_PATHS
        #[arg(long, value_delimiter = ',')]
        changed: Vec<String>,
    },
    /// List a repository's pipelines, newest first
    List {
        /// Repository ID
        #[arg(short, long)]
        repo: Uuid,
    },
    /// Get pipeline details
    Get {
        id: Uuid,

        /// Print the raw JSON answer
        #[arg(long)]
        json: bool,
    },
    /// Cancel a pipeline and its pending jobs
    Cancel { id: Uuid },
}

/// Handle pipeline commands
pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        PipelineCommands::Trigger {
            repo,
            ref_name,
            sha,
            source,
            changed,
        } => {
            let req = TriggerPipeline {
                repository_id: repo,
                ref_name,
                commit_sha: sha,
                source,
                changed_paths: (!changed.is_empty()).then(|| changed.join(" ")),
            };
            trigger_pipeline(&client, &req).await
        }
        PipelineCommands::List { repo } => list_pipelines(&client, repo).await,
        PipelineCommands::Get { id, json } => get_pipeline(&client, id, json).await,
        PipelineCommands::Cancel { id } => cancel_pipeline(&client, id).await,
    }
}

async fn trigger_pipeline(client: &OrchestratorClient, req: &TriggerPipeline) -> Result<()> {
    let pipeline = client.trigger_pipeline(req).await?;

    println!("{}", "✓ Pipeline triggered!".green().bold());
    println!("  ID:     {}", pipeline.id.to_string().cyan());
    println!("  Ref:    {}", pipeline.ref_name.bold());
    if pipeline.jobs.is_empty() {
        println!(
            "  {}",
            "No jobs: the definition is missing, invalid, or every rule resolved to never."
                .yellow()
        );
    } else {
        println!("  Jobs:");
        for job in &pipeline.jobs {
            print_job_line(job);
        }
    }

    Ok(())
}

async fn list_pipelines(client: &OrchestratorClient, repository_id: Uuid) -> Result<()> {
    let pipelines = client.list_pipelines(repository_id).await?;

    if pipelines.is_empty() {
        println!("{}", "No pipelines found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} pipeline(s):", pipelines.len()).bold());
    println!();
    for pipeline in &pipelines {
        print_pipeline_summary(pipeline);
    }

    Ok(())
}

async fn get_pipeline(client: &OrchestratorClient, id: Uuid, json: bool) -> Result<()> {
    let pipeline = client.get_pipeline(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pipeline)?);
    } else {
        print_pipeline_details(&pipeline);
    }

    Ok(())
}

async fn cancel_pipeline(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    client.cancel_pipeline(id).await?;

    println!("{}", format!("✓ Pipeline {} canceled", id).green().bold());
    Ok(())
}

fn print_pipeline_summary(pipeline: &Pipeline) {
    println!(
        "  {} {} {}",
        "▸".cyan(),
        pipeline.id.to_string().bold(),
        colorize_pipeline_status(pipeline.status)
    );
    println!("    Ref:     {} ({})", pipeline.ref_name, pipeline.source);
    println!(
        "    Created: {}",
        format_time(Some(pipeline.created_at)).dimmed()
    );
    println!();
}

fn print_pipeline_details(pipeline: &Pipeline) {
    println!("{}", "Pipeline Details:".bold());
    println!("  ID:         {}", pipeline.id.to_string().cyan());
    println!("  Repository: {}", pipeline.repository_id);
    println!("  Status:     {}", colorize_pipeline_status(pipeline.status));
    println!("  Source:     {}", pipeline.source);
    println!("  Ref:        {}", pipeline.ref_name);
    if !pipeline.commit_sha.is_empty() {
        println!("  Commit:     {}", pipeline.commit_sha);
    }
    println!("  Created:    {}", format_time(Some(pipeline.created_at)));
    println!("  Started:    {}", format_time(pipeline.started_at));
    println!("  Finished:   {}", format_time(pipeline.finished_at));

    println!("\n{}", "Jobs:".bold());
    if pipeline.jobs.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for job in &pipeline.jobs {
        print_job_line(job);
    }
}
