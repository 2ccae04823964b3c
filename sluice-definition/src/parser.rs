//! Pipeline definition parser
//!
//! This module turns the YAML pipeline definition committed to a repository
//! into a [`PipelineSpec`]. Parsing is permissive: a blank, malformed or
//! oddly-shaped document yields an empty spec instead of an error, so a
//! broken definition file produces a pipeline with zero jobs rather than a
//! failed trigger.
//!
//! Unknown keys are ignored at every level.

use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_yaml::{Mapping, Value};
use sluice_core::JobEnv;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use crate::definition::{DefaultSpec, JobSpec, PipelineSpec, RuleSpec};

/// Parse a pipeline definition from YAML source
///
/// # Arguments
/// * `source` - The YAML document (may be empty)
///
/// # Returns
/// The parsed specification. Never fails: anything that is not a mapping at
/// the top level produces an empty spec, and job entries whose body is not a
/// mapping are skipped.
///
/// When a job name is declared twice, the last body wins and the job keeps the
/// position of its first declaration.
///
/// # Example
/// ```
/// use sluice_definition::parser::parse_pipeline;
///
/// let source = r#"
/// default:
///   image: alpine:3
///   before_script: echo setup
/// jobs:
///   build:
///     script: ["make"]
///   deploy:
///     script: make deploy
///     rules:
///       - if: '$CI_COMMIT_BRANCH == "main"'
///         when: manual
/// "#;
///
/// let spec = parse_pipeline(source);
/// assert_eq!(spec.jobs.len(), 2);
/// assert_eq!(spec.jobs[1].rules[0].when.as_deref(), Some("manual"));
/// ```
pub fn parse_pipeline(source: &str) -> PipelineSpec {
    if source.trim().is_empty() {
        return PipelineSpec::default();
    }

    match serde_yaml::from_str::<Document>(source) {
        Ok(document) => document.into_spec(),
        Err(e) => {
            warn!("Unparsable pipeline definition, treating it as empty: {}", e);
            PipelineSpec::default()
        }
    }
}

/// Parse a `start_in` string: `"60"`, `"60s"`, `"2 minutes"`, `"1 hour"`
///
/// Returns the delay in seconds, or `None` when the text is not understood.
pub fn parse_start_in(raw: &str) -> Option<u32> {
    let text = raw.trim().to_ascii_lowercase();
    let digits_end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(digits_end);
    let amount: u32 = number.parse().ok()?;

    let multiplier = match unit.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        _ => return None,
    };
    amount.checked_mul(multiplier)
}

// ============================================================================
// Document shape
// ============================================================================

/// The top-level document, keeping job entries in order with duplicates
#[derive(Default)]
struct Document {
    default: Option<Value>,
    jobs: Vec<(Value, Value)>,
}

impl Document {
    fn into_spec(self) -> PipelineSpec {
        let defaults = match &self.default {
            Some(Value::Mapping(map)) => parse_defaults(map),
            _ => DefaultSpec::default(),
        };

        // Last body wins, first position is kept
        let mut ordered: Vec<(String, Value)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (key, body) in self.jobs {
            let Some(name) = scalar(&key) else {
                continue;
            };
            match index.get(&name) {
                Some(&at) => ordered[at].1 = body,
                None => {
                    index.insert(name.clone(), ordered.len());
                    ordered.push((name, body));
                }
            }
        }

        let jobs = ordered
            .into_iter()
            .filter_map(|(name, body)| match body {
                Value::Mapping(map) => Some(parse_job(name, &map)),
                _ => None,
            })
            .collect();

        PipelineSpec { defaults, jobs }
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(DocumentVisitor)
    }
}

struct DocumentVisitor;

impl<'de> Visitor<'de> for DocumentVisitor {
    type Value = Document;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a pipeline definition mapping")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Document, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut document = Document::default();
        while let Some(key) = map.next_key::<Value>()? {
            match key.as_str() {
                Some("default") => document.default = Some(map.next_value()?),
                Some("jobs") => document.jobs = map.next_value::<Entries>()?.0,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(document)
    }
}

/// Mapping entries in document order, duplicate keys included
///
/// Any non-mapping value reads as no entries.
struct Entries(Vec<(Value, Value)>);

impl<'de> Deserialize<'de> for Entries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(EntriesVisitor)
    }
}

struct EntriesVisitor;

impl<'de> Visitor<'de> for EntriesVisitor {
    type Value = Entries;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a mapping of job templates")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Entries, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::new();
        while let Some(entry) = map.next_entry::<Value, Value>()? {
            entries.push(entry);
        }
        Ok(Entries(entries))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Entries, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(Entries(Vec::new()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Entries, E> {
        Ok(Entries(Vec::new()))
    }

    fn visit_none<E: de::Error>(self) -> Result<Entries, E> {
        Ok(Entries(Vec::new()))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Entries, E> {
        Ok(Entries(Vec::new()))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Entries, E> {
        Ok(Entries(Vec::new()))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Entries, E> {
        Ok(Entries(Vec::new()))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Entries, E> {
        Ok(Entries(Vec::new()))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Entries, E> {
        Ok(Entries(Vec::new()))
    }
}

// ============================================================================
// Sections
// ============================================================================

fn parse_defaults(map: &Mapping) -> DefaultSpec {
    let mut variables = JobEnv::new();
    if let Some(Value::Mapping(vars)) = map.get("variables") {
        for (key, value) in vars {
            let Some(key) = scalar(key) else {
                continue;
            };
            match value {
                Value::Null => variables.insert(key, ""),
                other => {
                    if let Some(value) = scalar(other) {
                        variables.insert(key, value);
                    }
                }
            }
        }
    }

    DefaultSpec {
        image: map.get("image").and_then(scalar),
        variables,
        before_script: lines(map.get("before_script")),
    }
}

fn parse_job(name: String, map: &Mapping) -> JobSpec {
    JobSpec {
        name,
        image: map.get("image").and_then(scalar),
        script: lines(map.get("script")),
        rules: parse_rules(map.get("rules")),
        timeout_seconds: map.get("timeout").and_then(seconds),
    }
}

fn parse_rules(value: Option<&Value>) -> Vec<RuleSpec> {
    let Some(Value::Sequence(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::Mapping(rule) => Some(RuleSpec {
                condition: rule.get("if").and_then(scalar),
                when: rule.get("when").and_then(scalar),
                start_in_seconds: rule.get("start_in").and_then(seconds),
                allow_failure: rule.get("allow_failure").and_then(Value::as_bool),
            }),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Value helpers
// ============================================================================

/// Render a scalar as text; sequences, mappings and null have no text form
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// A single string or a list of lines, normalized to a line list
fn lines(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Sequence(items)) => items.iter().filter_map(scalar).collect(),
        Some(other) => scalar(other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Integer seconds or a duration string
fn seconds(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => parse_start_in(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_and_non_mapping_documents_are_empty() {
        assert_eq!(parse_pipeline(""), PipelineSpec::default());
        assert_eq!(parse_pipeline("   \n\t"), PipelineSpec::default());
        assert_eq!(parse_pipeline("- just\n- a list"), PipelineSpec::default());
        assert_eq!(parse_pipeline("plain scalar"), PipelineSpec::default());
        assert_eq!(parse_pipeline("jobs: [unclosed"), PipelineSpec::default());
    }

    #[test]
    fn test_full_definition() {
        let source = r#"
default:
  image: alpine:3
  variables:
    GREETING: hello
    RETRIES: 3
    EMPTY:
  before_script: ["echo A", "echo A2"]
jobs:
  build:
    script: ["echo B"]
  deploy:
    image: rust:1
    script: cargo publish
    timeout: 600
    rules:
      - if: '$CI_COMMIT_BRANCH == "main"'
        when: delayed
        start_in: 60
        allow_failure: true
      - when: never
"#;
        let spec = parse_pipeline(source);

        assert_eq!(spec.defaults.image.as_deref(), Some("alpine:3"));
        assert_eq!(spec.defaults.variables.value("GREETING"), "hello");
        assert_eq!(spec.defaults.variables.value("RETRIES"), "3");
        assert_eq!(spec.defaults.variables.get("EMPTY"), Some(""));
        assert_eq!(spec.defaults.before_script, vec!["echo A", "echo A2"]);

        assert_eq!(spec.jobs.len(), 2);
        let build = &spec.jobs[0];
        assert_eq!(build.name, "build");
        assert_eq!(build.image, None);
        assert_eq!(build.script, vec!["echo B"]);
        assert!(build.rules.is_empty());

        let deploy = &spec.jobs[1];
        assert_eq!(deploy.name, "deploy");
        assert_eq!(deploy.image.as_deref(), Some("rust:1"));
        assert_eq!(deploy.script, vec!["cargo publish"]);
        assert_eq!(deploy.timeout_seconds, Some(600));
        assert_eq!(deploy.rules.len(), 2);
        assert_eq!(
            deploy.rules[0].condition.as_deref(),
            Some(r#"$CI_COMMIT_BRANCH == "main""#)
        );
        assert_eq!(deploy.rules[0].when.as_deref(), Some("delayed"));
        assert_eq!(deploy.rules[0].start_in_seconds, Some(60));
        assert_eq!(deploy.rules[0].allow_failure, Some(true));
        assert_eq!(deploy.rules[1].condition, None);
        assert_eq!(deploy.rules[1].when.as_deref(), Some("never"));
    }

    #[test]
    fn test_before_script_single_string() {
        let spec = parse_pipeline("default:\n  before_script: echo setup\n");
        assert_eq!(spec.defaults.before_script, vec!["echo setup"]);
    }

    #[test]
    fn test_declaration_order_is_kept() {
        let spec = parse_pipeline("jobs:\n  zeta: {}\n  alpha: {}\n  mid: {}\n");
        let names: Vec<_> = spec.jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_duplicate_job_last_body_first_position() {
        let source = r#"
jobs:
  test:
    script: ["old"]
  lint:
    script: ["lint"]
  test:
    script: ["new"]
"#;
        let spec = parse_pipeline(source);
        let names: Vec<_> = spec.jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["test", "lint"]);
        assert_eq!(spec.jobs[0].script, vec!["new"]);
    }

    #[test]
    fn test_non_mapping_entries_are_skipped() {
        let source = r#"
jobs:
  broken: "not a job"
  ok:
    script: ["true"]
    rules:
      - "not a rule"
      - when: manual
"#;
        let spec = parse_pipeline(source);
        assert_eq!(spec.jobs.len(), 1);
        assert_eq!(spec.jobs[0].name, "ok");
        assert_eq!(spec.jobs[0].rules.len(), 1);
    }

    #[test]
    fn test_jobs_of_wrong_shape_keep_defaults() {
        let spec = parse_pipeline("default:\n  image: alpine\njobs: [a, b]\n");
        assert!(spec.jobs.is_empty());
        assert_eq!(spec.defaults.image.as_deref(), Some("alpine"));

        let spec = parse_pipeline("jobs:\n");
        assert!(spec.jobs.is_empty());
    }

    #[test]
    fn test_start_in_strings() {
        let source = r#"
jobs:
  later:
    rules:
      - when: delayed
        start_in: "90s"
      - when: delayed
        start_in: "2 minutes"
      - when: delayed
        start_in: "soon"
"#;
        let spec = parse_pipeline(source);
        let delays: Vec<_> = spec.jobs[0]
            .rules
            .iter()
            .map(|r| r.start_in_seconds)
            .collect();
        assert_eq!(delays, vec![Some(90), Some(120), None]);
    }

    #[test]
    fn test_parse_start_in() {
        assert_eq!(parse_start_in("60"), Some(60));
        assert_eq!(parse_start_in(" 60 seconds "), Some(60));
        assert_eq!(parse_start_in("5m"), Some(300));
        assert_eq!(parse_start_in("1 Hour"), Some(3600));
        assert_eq!(parse_start_in("-5"), None);
        assert_eq!(parse_start_in("minutes"), None);
        assert_eq!(parse_start_in("3 fortnights"), None);
    }
}
