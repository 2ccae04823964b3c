//! Job environment
//!
//! The flat string-to-string mapping every job carries. Expansion builds it,
//! the rule evaluator reads it, the lease broker hands it to runners and the
//! ledger stores it as a JSON object.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::variable::mask_secrets;

pub const CI_PIPELINE_SOURCE: &str = "CI_PIPELINE_SOURCE";
pub const CI_COMMIT_BRANCH: &str = "CI_COMMIT_BRANCH";
pub const CI_COMMIT_SHA: &str = "CI_COMMIT_SHA";
pub const CI_REPO_ID: &str = "CI_REPO_ID";
pub const CI_PIPELINE_ID: &str = "CI_PIPELINE_ID";
pub const CI_CHANGED_PATHS: &str = "CI_CHANGED_PATHS";

/// Names injected into every job; they override user-defined values
pub const RESERVED: [&str; 6] = [
    CI_PIPELINE_SOURCE,
    CI_COMMIT_BRANCH,
    CI_COMMIT_SHA,
    CI_REPO_ID,
    CI_PIPELINE_ID,
    CI_CHANGED_PATHS,
];

/// Ordered (by key) environment for a single job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobEnv(BTreeMap<String, String>);

impl JobEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value of `key`, or the empty string when unset
    pub fn value(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlay `other` on top of `self`; keys in `other` win
    pub fn merge(&mut self, other: &JobEnv) {
        for (key, value) in other.iter() {
            self.insert(key, value);
        }
    }

    /// Copy with every occurrence of a secret in a value replaced by [`MASK`](crate::domain::variable::MASK)
    pub fn masked(&self, secrets: &[String]) -> JobEnv {
        self.iter()
            .map(|(key, value)| (key, mask_secrets(value, secrets)))
            .collect()
    }

    /// Encode as a JSON object for storage
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }
        serde_json::from_str(raw)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for JobEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut env = JobEnv::new();
        for (key, value) in iter {
            env.insert(key, value);
        }
        env
    }
}

impl From<BTreeMap<String, String>> for JobEnv {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}
