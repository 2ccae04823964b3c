//! Pipeline Service
//!
//! Triggering turns a repository's definition file into a pipeline and its
//! jobs: the pipeline row is created first, then the definition is fetched,
//! parsed and every job template runs through the rule evaluator. A missing
//! or broken definition yields a pipeline with zero jobs, never an error.
//!
//! Cancellation moves a pipeline and its pending jobs to `canceled`.

use chrono::{DateTime, Utc};
use sluice_core::JobEnv;
use sluice_core::domain::job::{JobStatus, PipelineJob, WhenType};
use sluice_core::domain::pipeline::{Pipeline, PipelineSource, PipelineStatus};
use sluice_core::domain::variable::CiVariable;
use sluice_core::dto::job::JobEventKind;
use sluice_core::dto::pipeline::{PushHook, TriggerPipeline};
use sluice_core::env::{
    CI_CHANGED_PATHS, CI_COMMIT_BRANCH, CI_COMMIT_SHA, CI_PIPELINE_ID, CI_PIPELINE_SOURCE,
    CI_REPO_ID,
};
use sluice_definition::{PipelineSpec, evaluate_rules, parse_pipeline};
use uuid::Uuid;

use crate::config::Config;
use crate::notify::{NotificationSink, notify};
use crate::repository::{Ledger, LedgerError};
use crate::service::variable;
use crate::source::SourceControl;

/// Service error type
#[derive(Debug)]
pub enum PipelineError {
    NotFound(Uuid),
    ValidationError(String),
    Ledger(LedgerError),
}

impl From<LedgerError> for PipelineError {
    fn from(err: LedgerError) -> Self {
        PipelineError::Ledger(err)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Trigger a new pipeline run
///
/// Returns the created pipeline with the jobs that survived rule evaluation.
pub async fn trigger(
    ledger: &dyn Ledger,
    source: &dyn SourceControl,
    config: &Config,
    req: TriggerPipeline,
) -> Result<Pipeline> {
    validate_trigger_request(&req)?;

    let now = Utc::now();
    let ref_name = req
        .ref_name
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| config.default_branch.clone());

    let mut pipeline = Pipeline {
        id: Uuid::new_v4(),
        repository_id: req.repository_id,
        status: PipelineStatus::Queued,
        source: req.source,
        ref_name,
        commit_sha: req.commit_sha.unwrap_or_default().trim().to_string(),
        created_at: now,
        started_at: None,
        finished_at: None,
        jobs: Vec::new(),
    };
    ledger.create_pipeline(&pipeline).await?;

    tracing::info!(
        "Pipeline created: {} for repository {} at {} ({})",
        pipeline.id,
        pipeline.repository_id,
        pipeline.revision(),
        pipeline.source
    );

    let spec = load_definition(source, &config.pipeline_files, &pipeline).await;
    let variables = ledger.list_variables(pipeline.repository_id).await?;
    let changed_paths = req.changed_paths.as_deref().unwrap_or_default();

    let env = build_env(
        &pipeline,
        &spec.defaults.variables,
        &variables,
        config.is_protected_ref(&pipeline.ref_name),
        changed_paths,
    );
    let jobs = expand(&spec, &pipeline, &env, now);
    ledger.insert_jobs(&jobs).await?;

    tracing::info!(
        "Pipeline {} expanded into {} of {} job(s)",
        pipeline.id,
        jobs.len(),
        spec.jobs.len()
    );

    pipeline.jobs = jobs;
    let secrets = masked_among(&variables);
    Ok(pipeline.redacted(&secrets))
}

/// Trigger a `push` pipeline for a ref update reported by the git host
///
/// Changed paths come from diffing `before..after`; they are empty for a newly
/// created ref or when the diff fails.
pub async fn trigger_from_push(
    ledger: &dyn Ledger,
    source: &dyn SourceControl,
    config: &Config,
    hook: PushHook,
) -> Result<Pipeline> {
    validate_push_hook(&hook)?;

    let changed = if hook.creates_ref() {
        Vec::new()
    } else {
        source
            .changed_paths(hook.repository_id, &hook.before, &hook.after)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(
                    "Could not diff {}..{} in repository {}: {}",
                    hook.before,
                    hook.after,
                    hook.repository_id,
                    e
                );
                Vec::new()
            })
    };

    let req = TriggerPipeline {
        repository_id: hook.repository_id,
        ref_name: Some(branch_name(&hook.ref_name).to_string()),
        commit_sha: Some(hook.after),
        source: PipelineSource::Push,
        changed_paths: Some(changed.join(" ")),
    };

    trigger(ledger, source, config, req).await
}

/// `refs/heads/main` -> `main`; other names pass through
fn branch_name(ref_name: &str) -> &str {
    ref_name.strip_prefix("refs/heads/").unwrap_or(ref_name)
}

/// Get a pipeline with its jobs, masked variable values hidden in job environments
pub async fn get_pipeline(ledger: &dyn Ledger, id: Uuid) -> Result<Pipeline> {
    let pipeline = ledger
        .find_pipeline(id)
        .await?
        .ok_or(PipelineError::NotFound(id))?;

    let secrets = variable::masked_values(ledger, pipeline.repository_id).await?;
    Ok(pipeline.redacted(&secrets))
}

/// List the pipelines of a repository, newest first
pub async fn list_pipelines(ledger: &dyn Ledger, repository_id: Uuid) -> Result<Vec<Pipeline>> {
    let pipelines = ledger.list_pipelines(repository_id).await?;
    Ok(pipelines)
}

/// Cancel a pipeline; unknown ids are a silent no-op
///
/// Running jobs are only marked canceled. The runner executing one notices on
/// its next status push.
pub async fn cancel(ledger: &dyn Ledger, sink: &dyn NotificationSink, id: Uuid) -> Result<()> {
    match ledger.cancel_pipeline(id, Utc::now()).await? {
        Some(canceled) => {
            for job_id in &canceled {
                notify(sink, *job_id, JobEventKind::Status, JobStatus::Canceled.as_str());
            }
            tracing::info!("Pipeline {} canceled ({} job(s) stopped)", id, canceled.len());
        }
        None => tracing::debug!("Cancel ignored, pipeline {} does not exist", id),
    }

    Ok(())
}

fn masked_among(variables: &[CiVariable]) -> Vec<String> {
    variables
        .iter()
        .filter(|variable| variable.masked)
        .map(|variable| variable.value.clone())
        .collect()
}

// =============================================================================
// Expansion
// =============================================================================

/// Fetch and parse the first definition file that exists at the pipeline's revision
async fn load_definition(
    source: &dyn SourceControl,
    candidates: &[String],
    pipeline: &Pipeline,
) -> PipelineSpec {
    let revision = pipeline.revision();

    for path in candidates {
        match source.read_file(pipeline.repository_id, revision, path).await {
            Ok(Some(bytes)) => {
                tracing::debug!("Using pipeline definition {} at {}", path, revision);
                return parse_pipeline(&String::from_utf8_lossy(&bytes));
            }
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(
                    "Could not read pipeline definition for pipeline {}: {}",
                    pipeline.id,
                    e
                );
                return PipelineSpec::default();
            }
        }
    }

    tracing::warn!(
        "No pipeline definition found in repository {} at {}",
        pipeline.repository_id,
        revision
    );
    PipelineSpec::default()
}

/// The environment shared by every job of a pipeline
///
/// Later layers win: definition defaults, then applicable CI variables, then
/// the reserved `CI_*` values. Changed paths are kept exactly as supplied.
pub fn build_env(
    pipeline: &Pipeline,
    defaults: &JobEnv,
    variables: &[CiVariable],
    ref_is_protected: bool,
    changed_paths: &str,
) -> JobEnv {
    let mut env = defaults.clone();

    for variable in variables
        .iter()
        .filter(|v| v.applies_to(&pipeline.ref_name, ref_is_protected))
    {
        env.insert(&variable.key, &variable.value);
    }

    env.insert(CI_PIPELINE_SOURCE, pipeline.source.as_str());
    env.insert(CI_COMMIT_BRANCH, &pipeline.ref_name);
    env.insert(CI_COMMIT_SHA, &pipeline.commit_sha);
    env.insert(CI_REPO_ID, pipeline.repository_id.to_string());
    env.insert(CI_PIPELINE_ID, pipeline.id.to_string());
    env.insert(CI_CHANGED_PATHS, changed_paths);
    env
}

/// Materialize one job per template whose rules do not resolve to `never`
///
/// Jobs keep declaration order and all share `env` and `created_at`.
pub fn expand(
    spec: &PipelineSpec,
    pipeline: &Pipeline,
    env: &JobEnv,
    created_at: DateTime<Utc>,
) -> Vec<PipelineJob> {
    spec.jobs
        .iter()
        .enumerate()
        .filter_map(|(position, template)| {
            let decision = evaluate_rules(&template.rules, env);
            if decision.is_never() {
                tracing::debug!(
                    "Job '{}' of pipeline {} skipped by its rules",
                    template.name,
                    pipeline.id
                );
                return None;
            }

            Some(PipelineJob {
                id: Uuid::new_v4(),
                pipeline_id: pipeline.id,
                name: template.name.clone(),
                position: u32::try_from(position).unwrap_or(u32::MAX),
                image: spec.image_for(template),
                script: spec.script_for(template),
                status: JobStatus::Queued,
                when_type: decision.when,
                is_manual: decision.when == WhenType::Manual,
                allow_failure: decision.allow_failure,
                start_after_seconds: decision.start_after_seconds,
                rule: decision.matched_rule,
                manual_released: false,
                timeout_seconds: template.timeout_seconds,
                env: env.clone(),
                exit_code: None,
                created_at,
                started_at: None,
                finished_at: None,
            })
        })
        .collect()
}

// =============================================================================
// Validation
// =============================================================================

fn validate_trigger_request(req: &TriggerPipeline) -> Result<()> {
    if req.repository_id.is_nil() {
        return Err(PipelineError::ValidationError(
            "repository_id cannot be the nil UUID".to_string(),
        ));
    }

    if let Some(ref_name) = &req.ref_name {
        let ref_name = ref_name.trim();
        if !ref_name.is_empty() {
            validate_ref_name(ref_name)?;
        }
    }

    if let Some(sha) = &req.commit_sha {
        let sha = sha.trim();
        if !sha.is_empty() {
            validate_sha(sha)?;
        }
    }

    Ok(())
}

/// Push hooks are checked in full before anything is diffed
fn validate_push_hook(hook: &PushHook) -> Result<()> {
    if hook.repository_id.is_nil() {
        return Err(PipelineError::ValidationError(
            "repository_id cannot be the nil UUID".to_string(),
        ));
    }

    validate_ref_name(branch_name(hook.ref_name.trim()))?;
    validate_sha(hook.after.trim())?;

    let before = hook.before.trim();
    if !before.is_empty() {
        validate_sha(before)?;
    }

    Ok(())
}

/// Refs follow git's ref name rules, and can never be mistaken for an option
fn validate_ref_name(ref_name: &str) -> Result<()> {
    let invalid = ref_name.is_empty()
        || ref_name.starts_with('-')
        || ref_name.starts_with('/')
        || ref_name.ends_with('/')
        || ref_name.ends_with('.')
        || ref_name.contains("..")
        || ref_name.contains("@{")
        || ref_name.chars().any(|c| {
            c.is_whitespace() || c.is_control() || matches!(c, ':' | '~' | '^' | '?' | '*' | '[' | '\\')
        });

    if invalid {
        return Err(PipelineError::ValidationError(format!(
            "Invalid ref name: '{}'",
            ref_name
        )));
    }

    Ok(())
}

fn validate_sha(sha: &str) -> Result<()> {
    if sha.is_empty() || sha.len() > 64 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(PipelineError::ValidationError(format!(
            "Invalid commit SHA: '{}'",
            sha
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::BroadcastSink;
    use crate::repository::MemoryLedger;
    use crate::source::MemorySource;

    fn request(repository_id: Uuid, source: PipelineSource) -> TriggerPipeline {
        TriggerPipeline {
            repository_id,
            ref_name: Some("main".to_string()),
            commit_sha: None,
            source,
            changed_paths: None,
        }
    }

    async fn trigger_with(definition: &str, req: TriggerPipeline) -> (MemoryLedger, Pipeline) {
        let ledger = MemoryLedger::new();
        let source = MemorySource::new().with_file(req.repository_id, "main", ".pm-ci.yml", definition);
        let pipeline = trigger(&ledger, &source, &Config::default(), req)
            .await
            .unwrap();
        (ledger, pipeline)
    }

    #[tokio::test]
    async fn test_single_job_without_rules() {
        let repo = Uuid::new_v4();
        let (ledger, pipeline) = trigger_with(
            "jobs:\n  build:\n    script: [\"make\"]\n",
            request(repo, PipelineSource::Push),
        )
        .await;

        assert_eq!(pipeline.status, PipelineStatus::Queued);
        assert_eq!(pipeline.jobs.len(), 1);
        let job = &pipeline.jobs[0];
        assert_eq!(job.when_type, WhenType::OnSuccess);
        assert!(!job.is_manual);
        assert_eq!(job.script, "make");
        assert_eq!(job.status, JobStatus::Queued);

        let stored = ledger.find_pipeline(pipeline.id).await.unwrap().unwrap();
        assert_eq!(stored.jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_rule_drops_job() {
        let definition = r#"
jobs:
  deploy:
    script: ["deploy"]
    rules:
      - if: '$CI_PIPELINE_SOURCE == "push"'
        when: manual
  test:
    script: ["test"]
"#;
        let (ledger, pipeline) =
            trigger_with(definition, request(Uuid::new_v4(), PipelineSource::Schedule)).await;

        let names: Vec<_> = pipeline.jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["test"]);
        let stored = ledger.find_pipeline(pipeline.id).await.unwrap().unwrap();
        assert!(stored.jobs.iter().all(|j| j.when_type != WhenType::Never));
    }

    #[tokio::test]
    async fn test_matched_manual_rule() {
        let definition = r#"
jobs:
  deploy:
    rules:
      - if: '$CI_PIPELINE_SOURCE == "push"'
        when: manual
"#;
        let (_, pipeline) =
            trigger_with(definition, request(Uuid::new_v4(), PipelineSource::Push)).await;

        let job = &pipeline.jobs[0];
        assert_eq!(job.when_type, WhenType::Manual);
        assert!(job.is_manual);
        assert!(!job.manual_released);
        assert_eq!(
            job.rule.as_deref(),
            Some(r#"$CI_PIPELINE_SOURCE == "push""#)
        );
    }

    #[tokio::test]
    async fn test_before_script_concatenation_and_image() {
        let definition = r#"
default:
  image: alpine:3
  before_script: ["echo A"]
jobs:
  one:
    script: ["echo B"]
  two:
    image: rust:1
    script: ["echo C"]
"#;
        let (_, pipeline) =
            trigger_with(definition, request(Uuid::new_v4(), PipelineSource::Push)).await;

        assert_eq!(pipeline.jobs[0].script, "echo A\necho B");
        assert_eq!(pipeline.jobs[0].image.as_deref(), Some("alpine:3"));
        assert_eq!(pipeline.jobs[1].image.as_deref(), Some("rust:1"));
    }

    #[tokio::test]
    async fn test_missing_or_broken_definition_yields_zero_jobs() {
        let ledger = MemoryLedger::new();
        let source = MemorySource::new();
        let repo = Uuid::new_v4();

        let pipeline = trigger(&ledger, &source, &Config::default(), request(repo, PipelineSource::Push))
            .await
            .unwrap();
        assert!(pipeline.jobs.is_empty());
        assert!(ledger.find_pipeline(pipeline.id).await.unwrap().is_some());

        let (_, pipeline) =
            trigger_with("jobs: [unclosed", request(Uuid::new_v4(), PipelineSource::Push)).await;
        assert!(pipeline.jobs.is_empty());
        assert_eq!(pipeline.status, PipelineStatus::Queued);
    }

    #[tokio::test]
    async fn test_definition_read_at_commit_and_candidates_in_order() {
        let ledger = MemoryLedger::new();
        let repo = Uuid::new_v4();
        let source = MemorySource::new()
            .with_file(repo, "main", ".pm-ci.yml", "jobs:\n  from_ref: {}\n")
            .with_file(repo, "abc123", ".ci.yml", "jobs:\n  from_commit: {}\n");

        let mut req = request(repo, PipelineSource::Push);
        req.commit_sha = Some("abc123".to_string());
        let pipeline = trigger(&ledger, &source, &Config::default(), req).await.unwrap();

        assert_eq!(pipeline.commit_sha, "abc123");
        assert_eq!(pipeline.jobs[0].name, "from_commit");
    }

    #[tokio::test]
    async fn test_ref_defaults_to_configured_branch() {
        let ledger = MemoryLedger::new();
        let source = MemorySource::new();
        let mut req = request(Uuid::new_v4(), PipelineSource::Manual);
        req.ref_name = None;

        let pipeline = trigger(&ledger, &source, &Config::default(), req).await.unwrap();
        assert_eq!(pipeline.ref_name, "master");
    }

    #[tokio::test]
    async fn test_environment_layers_and_rules_see_variables() {
        let ledger = MemoryLedger::new();
        let repo = Uuid::new_v4();
        let definition = r#"
default:
  variables:
    DEPLOY: "yes"
    CI_COMMIT_BRANCH: spoofed
jobs:
  deploy:
    rules:
      - if: $DEPLOY
  release:
    rules:
      - if: '$RELEASE_TOKEN =~ "."'
"#;
        let source = MemorySource::new().with_file(repo, "feature", ".pm-ci.yml", definition);
        for (key, protected) in [("RELEASE_TOKEN", true), ("DEPLOY", false)] {
            ledger
                .put_variable(&CiVariable {
                    id: Uuid::new_v4(),
                    repository_id: repo,
                    key: key.to_string(),
                    value: "from-settings".to_string(),
                    masked: false,
                    protected,
                    scope: None,
                })
                .await
                .unwrap();
        }

        let mut req = request(repo, PipelineSource::Push);
        req.ref_name = Some("feature".to_string());
        req.changed_paths = Some("a.rs  b.rs".to_string());
        let pipeline = trigger(&ledger, &source, &Config::default(), req).await.unwrap();

        // Protected variable withheld on an unprotected ref, so `release` is dropped
        assert_eq!(pipeline.jobs.len(), 1);
        let env = &pipeline.jobs[0].env;
        assert_eq!(env.value("DEPLOY"), "from-settings");
        assert_eq!(env.get("RELEASE_TOKEN"), None);
        assert_eq!(env.value(CI_COMMIT_BRANCH), "feature");
        assert_eq!(env.value(CI_PIPELINE_SOURCE), "push");
        assert_eq!(env.value(CI_PIPELINE_ID), pipeline.id.to_string());
        assert_eq!(env.value(CI_REPO_ID), repo.to_string());
        assert_eq!(env.value(CI_CHANGED_PATHS), "a.rs  b.rs");
        assert_eq!(env.get(CI_COMMIT_SHA), Some(""));
    }

    #[tokio::test]
    async fn test_every_job_shares_the_environment() {
        let (_, pipeline) = trigger_with(
            "jobs:\n  a: {}\n  b: {}\n  c: {}\n",
            request(Uuid::new_v4(), PipelineSource::Webhook),
        )
        .await;

        assert_eq!(pipeline.jobs.len(), 3);
        assert!(pipeline.jobs.iter().all(|j| j.env == pipeline.jobs[0].env));
        let positions: Vec<_> = pipeline.jobs.iter().map(|j| j.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected_before_creation() {
        let ledger = MemoryLedger::new();
        let source = MemorySource::new();

        let nil = request(Uuid::nil(), PipelineSource::Push);
        assert!(matches!(
            trigger(&ledger, &source, &Config::default(), nil).await,
            Err(PipelineError::ValidationError(_))
        ));

        let mut bad_sha = request(Uuid::new_v4(), PipelineSource::Push);
        bad_sha.commit_sha = Some("not a sha".to_string());
        let repo = bad_sha.repository_id;
        assert!(matches!(
            trigger(&ledger, &source, &Config::default(), bad_sha).await,
            Err(PipelineError::ValidationError(_))
        ));
        assert!(ledger.list_pipelines(repo).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_and_notifies() {
        let (ledger, pipeline) = trigger_with(
            "jobs:\n  a: {}\n  b: {}\n",
            request(Uuid::new_v4(), PipelineSource::Push),
        )
        .await;
        let sink = BroadcastSink::new(16);
        let mut rx = sink.subscribe();

        cancel(&ledger, &sink, pipeline.id).await.unwrap();
        cancel(&ledger, &sink, pipeline.id).await.unwrap();
        cancel(&ledger, &sink, Uuid::new_v4()).await.unwrap();

        let stored = get_pipeline(&ledger, pipeline.id).await.unwrap();
        assert_eq!(stored.status, PipelineStatus::Canceled);
        assert!(stored.finished_at.is_some());
        assert!(stored.jobs.iter().all(|j| j.status == JobStatus::Canceled));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.payload, "canceled");
    }

    #[tokio::test]
    async fn test_push_hook_feeds_changed_paths_to_rules() {
        let repo = Uuid::new_v4();
        let definition = r#"
jobs:
  docs:
    rules:
      - if: '$CI_CHANGED_PATHS ~= "^docs/"'
  always: {}
"#;
        let source = MemorySource::new()
            .with_file(repo, "bbb", ".pm-ci.yml", definition)
            .with_diff(repo, "aaa", "bbb", &["docs/index.md", "src/main.rs"]);
        let ledger = MemoryLedger::new();

        let hook = PushHook {
            repository_id: repo,
            ref_name: "refs/heads/main".to_string(),
            before: "aaa".to_string(),
            after: "bbb".to_string(),
        };
        let pipeline = trigger_from_push(&ledger, &source, &Config::default(), hook.clone())
            .await
            .unwrap();

        assert_eq!(pipeline.ref_name, "main");
        assert_eq!(pipeline.source, PipelineSource::Push);
        assert_eq!(pipeline.jobs.len(), 2);
        assert_eq!(
            pipeline.jobs[0].env.value(CI_CHANGED_PATHS),
            "docs/index.md src/main.rs"
        );

        // New ref: nothing to diff, so the docs job is dropped
        let created = PushHook {
            before: "0".repeat(40),
            ..hook
        };
        let pipeline = trigger_from_push(&ledger, &source, &Config::default(), created)
            .await
            .unwrap();
        let names: Vec<_> = pipeline.jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["always"]);
    }

    #[tokio::test]
    async fn test_option_like_refs_are_rejected_before_creation() {
        let ledger = MemoryLedger::new();
        let source = MemorySource::new();
        let repo = Uuid::new_v4();

        for bad in ["--output=/tmp/x", "-p", "main:secret", "a..b", "feature/", "topic^"] {
            let mut req = request(repo, PipelineSource::Manual);
            req.ref_name = Some(bad.to_string());
            assert!(
                matches!(
                    trigger(&ledger, &source, &Config::default(), req).await,
                    Err(PipelineError::ValidationError(_))
                ),
                "ref {:?} accepted",
                bad
            );
        }
        assert!(ledger.list_pipelines(repo).await.unwrap().is_empty());

        let mut nested = request(repo, PipelineSource::Manual);
        nested.ref_name = Some("release/1.0".to_string());
        assert!(trigger(&ledger, &source, &Config::default(), nested).await.is_ok());
    }

    #[tokio::test]
    async fn test_push_hook_is_validated_before_diffing() {
        let repo = Uuid::new_v4();
        let ledger = MemoryLedger::new();
        // The diff would succeed if the hook reached it
        let source = MemorySource::new().with_diff(repo, "--output=/tmp/x", "bbb", &["a.rs"]);
        let hook = PushHook {
            repository_id: repo,
            ref_name: "refs/heads/main".to_string(),
            before: "--output=/tmp/x".to_string(),
            after: "bbb".to_string(),
        };

        let bad_hooks = [
            hook.clone(),
            PushHook {
                before: "aaa".to_string(),
                after: "--output=/tmp/x".to_string(),
                ..hook.clone()
            },
            PushHook {
                before: "aaa".to_string(),
                after: String::new(),
                ..hook.clone()
            },
            PushHook {
                before: "aaa".to_string(),
                ref_name: "refs/heads/-x".to_string(),
                ..hook.clone()
            },
        ];
        for bad in bad_hooks {
            assert!(matches!(
                trigger_from_push(&ledger, &source, &Config::default(), bad).await,
                Err(PipelineError::ValidationError(_))
            ));
        }
        assert!(ledger.list_pipelines(repo).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_paths_hide_masked_values() {
        let ledger = MemoryLedger::new();
        let repo = Uuid::new_v4();
        ledger
            .put_variable(&CiVariable {
                id: Uuid::new_v4(),
                repository_id: repo,
                key: "API_TOKEN".to_string(),
                value: "s3cr3t".to_string(),
                masked: true,
                protected: false,
                scope: None,
            })
            .await
            .unwrap();
        let source = MemorySource::new().with_file(repo, "main", ".pm-ci.yml", "jobs:\n  a: {}\n");

        let created = trigger(&ledger, &source, &Config::default(), request(repo, PipelineSource::Push))
            .await
            .unwrap();
        assert_eq!(created.jobs[0].env.value("API_TOKEN"), "[MASKED]");

        let shown = get_pipeline(&ledger, created.id).await.unwrap();
        let body = serde_json::to_string(&shown).unwrap();
        assert!(!body.contains("s3cr3t"));
        assert_eq!(shown.jobs[0].env.value("API_TOKEN"), "[MASKED]");

        // The stored job keeps the real value for the lease payload
        let stored = ledger.find_job(created.jobs[0].id).await.unwrap().unwrap();
        assert_eq!(stored.env.value("API_TOKEN"), "s3cr3t");
    }

    #[test]
    fn test_ref_and_sha_rules() {
        assert!(validate_ref_name("main").is_ok());
        assert!(validate_ref_name("refs/tags/v1.2").is_ok());
        assert!(validate_ref_name("-main").is_err());
        assert!(validate_ref_name("a b").is_err());
        assert!(validate_ref_name("x@{1}").is_err());

        assert!(validate_sha("0123abcdef").is_ok());
        assert!(validate_sha(&"0".repeat(40)).is_ok());
        assert!(validate_sha("").is_err());
        assert!(validate_sha("HEAD~1").is_err());
        assert!(validate_sha("--output=x").is_err());
    }

    #[test]
    fn test_branch_name() {
        assert_eq!(branch_name("refs/heads/release/1.0"), "release/1.0");
        assert_eq!(branch_name("main"), "main");
        assert_eq!(branch_name("refs/tags/v1"), "refs/tags/v1");
    }

    #[tokio::test]
    async fn test_get_unknown_pipeline() {
        let ledger = MemoryLedger::new();
        assert!(matches!(
            get_pipeline(&ledger, Uuid::new_v4()).await,
            Err(PipelineError::NotFound(_))
        ));
    }
}
