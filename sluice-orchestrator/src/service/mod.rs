//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services work against the [`Ledger`](crate::repository::Ledger) trait so
//! they run unchanged over Postgres or the in-memory ledger.

pub mod job;
pub mod lease;
pub mod log;
pub mod pipeline;
pub mod runner;
pub mod variable;

// Re-export for convenience
pub use job as job_service;
pub use lease as lease_service;
pub use log as log_service;
pub use pipeline as pipeline_service;
pub use runner as runner_service;
pub use variable as variable_service;
