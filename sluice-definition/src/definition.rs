//! Pipeline definition model
//!
//! The structured form of a pipeline definition file. Produced by
//! [`crate::parser::parse_pipeline`] and consumed by pipeline expansion.

use sluice_core::JobEnv;

/// A parsed pipeline definition: global defaults plus ordered job templates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSpec {
    pub defaults: DefaultSpec,
    /// Job templates in declaration order
    pub jobs: Vec<JobSpec>,
}

impl PipelineSpec {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// The literal script a job runs: default pre-script lines, then the job's own
    pub fn script_for(&self, job: &JobSpec) -> String {
        self.defaults
            .before_script
            .iter()
            .chain(job.script.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Template override, falling back to the default image
    pub fn image_for(&self, job: &JobSpec) -> Option<String> {
        job.image.clone().or_else(|| self.defaults.image.clone())
    }
}

/// Settings shared by every job of the pipeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultSpec {
    pub image: Option<String>,
    pub variables: JobEnv,
    pub before_script: Vec<String>,
}

/// One named job template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobSpec {
    pub name: String,
    pub image: Option<String>,
    pub script: Vec<String>,
    /// Evaluated in order; first match wins
    pub rules: Vec<RuleSpec>,
    pub timeout_seconds: Option<u32>,
}

/// A conditional clause attached to a job template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSpec {
    /// Boolean expression; `None` always matches
    pub condition: Option<String>,
    /// When-keyword; `None` means on_success
    pub when: Option<String>,
    pub start_in_seconds: Option<u32>,
    pub allow_failure: Option<bool>,
}

impl RuleSpec {
    /// A rule matching when `condition` holds
    pub fn when(condition: &str, when: &str) -> Self {
        Self {
            condition: Some(condition.to_string()),
            when: Some(when.to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(before: &[&str], image: Option<&str>) -> PipelineSpec {
        PipelineSpec {
            defaults: DefaultSpec {
                image: image.map(String::from),
                variables: JobEnv::new(),
                before_script: before.iter().map(|s| s.to_string()).collect(),
            },
            jobs: vec![],
        }
    }

    fn job(script: &[&str], image: Option<&str>) -> JobSpec {
        JobSpec {
            name: "build".to_string(),
            image: image.map(String::from),
            script: script.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_script_prepends_before_script() {
        let spec = spec(&["echo A"], None);
        assert_eq!(spec.script_for(&job(&["echo B"], None)), "echo A\necho B");
    }

    #[test]
    fn test_script_without_before_script_has_no_leading_newline() {
        let spec = spec(&[], None);
        assert_eq!(
            spec.script_for(&job(&["make", "make test"], None)),
            "make\nmake test"
        );
    }

    #[test]
    fn test_image_override() {
        let spec = spec(&[], Some("alpine:3"));
        assert_eq!(spec.image_for(&job(&[], None)).as_deref(), Some("alpine:3"));
        assert_eq!(
            spec.image_for(&job(&[], Some("rust:1"))).as_deref(),
            Some("rust:1")
        );
        assert_eq!(PipelineSpec::default().image_for(&job(&[], None)), None);
    }
}
