//! Variable command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use sluice_core::dto::variable::PutVariable;
use uuid::Uuid;

use crate::config::Config;

/// Variable subcommands
#[derive(Subcommand)]
pub enum VariableCommands {
    /// List a repository's variables (masked values hidden)
    List {
        #[arg(short, long)]
        repo: Uuid,
    },
    /// Create or replace a variable
    Set {
        #[arg(short, long)]
        repo: Uuid,

        key: String,

        value: String,

        /// Hide the value in job logs
        #[arg(long)]
        masked: bool,

        /// Only inject on protected refs
        #[arg(long)]
        protected: bool,

        /// Ref glob the variable applies to, e.g. `release/*`
        #[arg(long)]
        scope: Option<String>,
    },
    /// Delete a variable
    Delete {
        #[arg(short, long)]
        repo: Uuid,

        key: String,
    },
}

/// Handle variable commands
pub async fn handle_variable_command(command: VariableCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        VariableCommands::List { repo } => {
            let variables = client.list_variables(repo).await?;
            if variables.is_empty() {
                println!("{}", "No variables defined.".yellow());
            }
            for variable in &variables {
                let mut flags = Vec::new();
                if variable.masked {
                    flags.push("masked".to_string());
                }
                if variable.protected {
                    flags.push("protected".to_string());
                }
                if let Some(scope) = &variable.scope {
                    flags.push(format!("scope={}", scope));
                }
                println!(
                    "  {}={} {}",
                    variable.key.cyan(),
                    variable.value,
                    if flags.is_empty() {
                        String::new()
                    } else {
                        format!("[{}]", flags.join(", "))
                    }
                    .dimmed()
                );
            }
        }
        VariableCommands::Set {
            repo,
            key,
            value,
            masked,
            protected,
            scope,
        } => {
            let req = PutVariable {
                value,
                masked,
                protected,
                scope,
            };
            let stored = client.put_variable(repo, &key, &req).await?;
            println!("{}", format!("✓ Variable {} saved", stored.key).green().bold());
        }
        VariableCommands::Delete { repo, key } => {
            client.delete_variable(repo, &key).await?;
            println!("{}", format!("✓ Variable {} deleted", key).green().bold());
        }
    }

    Ok(())
}
