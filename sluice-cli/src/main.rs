//! Sluice CLI
//!
//! Command-line interface for interacting with the Sluice orchestrator.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "Sluice CI pipeline CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(
        long,
        env = "SLUICE_ORCHESTRATOR_URL",
        default_value = "http://localhost:8080"
    )]
    orchestrator_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
    };

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_nested_command() {
        let cli = Cli::try_parse_from([
            "sluice",
            "--orchestrator-url",
            "http://ci:9000",
            "pipeline",
            "cancel",
            "6f9619ff-8b86-d011-b42d-00cf4fc964ff",
        ])
        .unwrap();
        assert_eq!(cli.orchestrator_url, "http://ci:9000");
        assert!(matches!(cli.command, Commands::Pipeline { .. }));
    }
}
