//! Sluice Pipeline Definitions
//!
//! This crate turns a pipeline definition file into jobs-to-be. It includes:
//! - The definition model (defaults, job templates, rules)
//! - A permissive YAML parser that never fails on malformed input
//! - The rule evaluator deciding if and when each job template runs

pub mod definition;
pub mod parser;
pub mod rules;

pub use definition::{DefaultSpec, JobSpec, PipelineSpec, RuleSpec};
pub use parser::{parse_pipeline, parse_start_in};
pub use rules::{RuleDecision, RuleError, evaluate_expression, evaluate_rules};
