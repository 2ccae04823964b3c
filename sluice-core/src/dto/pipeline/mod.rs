//! Pipeline DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pipeline::PipelineSource;

/// Request to trigger a new pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerPipeline {
    pub repository_id: Uuid,
    /// Defaults to the configured default branch
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub ref_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub source: PipelineSource,
    /// Pre-computed, space-separated changed paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_paths: Option<String>,
}

/// Notification from the git host that a ref moved from `before` to `after`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushHook {
    pub repository_id: Uuid,
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(default)]
    pub before: String,
    pub after: String,
}

impl PushHook {
    /// A push that created the ref has no previous commit to diff against
    pub fn creates_ref(&self) -> bool {
        let before = self.before.trim();
        before.is_empty() || before.chars().all(|c| c == '0')
    }
}
