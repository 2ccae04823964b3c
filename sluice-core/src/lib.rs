//! Sluice Core
//!
//! Core types and abstractions for the Sluice pipeline engine.
//!
//! This crate contains:
//! - Domain types: Core business entities (Pipeline, PipelineJob, Runner, etc.)
//! - Job environment: the typed key/value contract shared by expansion, leasing and masking
//! - DTOs: Data transfer objects for the orchestrator HTTP API

pub mod domain;
pub mod dto;
pub mod env;

pub use env::JobEnv;
