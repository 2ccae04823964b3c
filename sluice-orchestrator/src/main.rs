use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, LedgerBackend};
use crate::notify::BroadcastSink;
use crate::repository::{Ledger, MemoryLedger, PgLedger};
use crate::source::GitCliSource;

pub mod api;
pub mod config;
pub mod db;
pub mod notify;
pub mod repository;
pub mod service;
pub mod source;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sluice_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Sluice Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let ledger = connect_ledger(&config).await?;
    let source = Arc::new(GitCliSource::new(config.repos_dir.clone()));
    let events = Arc::new(BroadcastSink::new(config.notify_channel_capacity));
    let addr = config.bind_addr.clone();

    tracing::info!("Reading repositories from {}", config.repos_dir.display());

    // Build router with all API endpoints
    let app = api::create_router(api::AppState {
        ledger,
        source,
        events,
        config: Arc::new(config),
    });

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}

async fn connect_ledger(config: &Config) -> anyhow::Result<Arc<dyn Ledger>> {
    match config.ledger_backend {
        LedgerBackend::Postgres => {
            tracing::info!("Connecting to database...");

            let pool = db::create_pool(&config.database_url, config.database_max_connections)
                .await
                .context("Failed to create database pool")?;

            tracing::info!("Database connection pool created");

            db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;

            Ok(Arc::new(PgLedger::new(pool)))
        }
        LedgerBackend::Memory => {
            tracing::warn!("Using the in-memory ledger; state is lost on restart");
            Ok(Arc::new(MemoryLedger::new()))
        }
    }
}
