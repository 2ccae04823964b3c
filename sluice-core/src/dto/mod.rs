//! Data Transfer Objects for the orchestrator HTTP API
//!
//! Request and response bodies shared by the orchestrator, its client and the
//! command-line tool. The runner-facing lease protocol uses camelCase field
//! names; everything else is snake_case like the domain types.

pub mod job;
pub mod pipeline;
pub mod runner;
pub mod variable;
