//! Core domain types
//!
//! This module contains the core domain structures used across Sluice crates.
//! These types represent the fundamental business entities and are shared between
//! the orchestrator (for persistence) and its clients (for display and execution).

pub mod job;
pub mod log;
pub mod pipeline;
pub mod runner;
pub mod variable;

use thiserror::Error;

/// Returned when a textual status, source or when-type is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
