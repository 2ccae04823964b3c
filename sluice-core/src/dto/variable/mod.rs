//! CI variable DTOs

use serde::{Deserialize, Serialize};

/// Create or replace a repository variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutVariable {
    pub value: String,
    #[serde(default)]
    pub masked: bool,
    #[serde(default)]
    pub protected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}
